//! promoter-notify: human-facing notifications.
//!
//! [`WebhookNotifier`] renders each message as an interactive chat card and
//! posts it to the webhook whose route token matches the subject's
//! `-`-delimited segments, falling back to a default webhook. Delivery
//! failures are logged and swallowed.

pub mod card;
pub mod webhook;

use std::sync::Arc;

use promoter_core::config::NotifyConfig;
use promoter_core::{LogNotifier, Notifier};

pub use card::{Card, render_card};
pub use webhook::{NotifyError, WebhookNotifier, WebhookRoutes};

/// Build the notifier described by `config`.
///
/// Without any webhook configured, notifications only go to the log.
/// Subjects no route or default covers are logged as well.
pub fn from_config(config: &NotifyConfig) -> Result<Arc<dyn Notifier>, regex::Error> {
    match &config.default_webhook {
        None if config.routes.is_empty() => Ok(Arc::new(LogNotifier)),
        _ => Ok(Arc::new(WebhookNotifier::from_config(config)?)),
    }
}
