//! Webhook delivery with per-workload routing.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use thiserror::Error;
use tracing::{debug, warn};

use promoter_core::config::NotifyConfig;
use promoter_core::{LogNotifier, Notifier, SegmentPattern, Severity};

use crate::card::render_card;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a card could not be delivered. Only ever logged.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webhook returned HTTP {0}")]
    Status(u16),
}

/// Picks the webhook for a subject: the first route whose token matches a
/// `-`-delimited segment, otherwise the default.
#[derive(Debug, Clone, Default)]
pub struct WebhookRoutes {
    routes: Vec<(SegmentPattern, String)>,
    default: Option<String>,
}

impl WebhookRoutes {
    pub fn new(default: Option<String>) -> Self {
        Self {
            routes: Vec::new(),
            default,
        }
    }

    pub fn route(mut self, token: &str, webhook: impl Into<String>) -> Result<Self, regex::Error> {
        self.routes.push((SegmentPattern::new(token)?, webhook.into()));
        Ok(self)
    }

    pub fn resolve(&self, subject: &str) -> Option<&str> {
        self.routes
            .iter()
            .find(|(pattern, _)| pattern.matches(subject))
            .map(|(_, url)| url.as_str())
            .or(self.default.as_deref())
    }
}

pub struct WebhookNotifier {
    http: reqwest::Client,
    routes: WebhookRoutes,
    title: String,
    /// Receives messages no webhook is routed for.
    fallback: Arc<dyn Notifier>,
}

impl WebhookNotifier {
    pub fn new(routes: WebhookRoutes, title: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "falling back to default webhook client");
                reqwest::Client::new()
            });
        Self {
            http,
            routes,
            title: title.into(),
            fallback: Arc::new(LogNotifier),
        }
    }

    /// Send unrouted messages to `fallback` instead of the log.
    pub fn with_fallback(mut self, fallback: Arc<dyn Notifier>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn from_config(config: &NotifyConfig) -> Result<Self, regex::Error> {
        let mut routes = WebhookRoutes::new(config.default_webhook.clone());
        for r in &config.routes {
            routes = routes.route(&r.token, r.webhook.clone())?;
        }
        Ok(Self::new(routes, config.title.clone()))
    }

    async fn post(&self, url: &str, message: &str, severity: Severity) -> Result<(), NotifyError> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let card = render_card(&self.title, message, severity, &timestamp);

        let resp = self
            .http
            .post(url)
            .json(&card)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str, subject: &str, severity: Severity) {
        let Some(url) = self.routes.resolve(subject) else {
            debug!(%subject, "no webhook for subject, using fallback");
            self.fallback.notify(message, subject, severity).await;
            return;
        };

        match self.post(url, message, severity).await {
            Ok(()) => debug!(%subject, ?severity, "notification delivered"),
            Err(e) => warn!(%subject, error = %e, "failed to deliver notification"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promoter_core::RecordingNotifier;

    #[test]
    fn routes_match_segments_then_fall_back() {
        let routes = WebhookRoutes::new(Some("http://default".to_string()))
            .route("crm", "http://crm")
            .unwrap();

        assert_eq!(routes.resolve("shop-crm-api"), Some("http://crm"));
        assert_eq!(routes.resolve("crmapi"), Some("http://default"));
        assert_eq!(routes.resolve("svcA"), Some("http://default"));
    }

    #[test]
    fn no_default_and_no_match_resolves_nothing() {
        let routes = WebhookRoutes::new(None).route("crm", "http://crm").unwrap();
        assert_eq!(routes.resolve("svcA"), None);
    }

    #[tokio::test]
    async fn posts_card_to_routed_webhook() {
        let mut server = mockito::Server::new_async().await;
        let crm = server
            .mock("POST", "/hook/crm")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"msg_type":"interactive","card":{"header":{"template":"green"}}}"#.to_string(),
            ))
            .with_status(200)
            .create_async()
            .await;
        let default = server.mock("POST", "/hook/default").expect(0).create_async().await;

        let routes = WebhookRoutes::new(Some(format!("{}/hook/default", server.url())))
            .route("crm", format!("{}/hook/crm", server.url()))
            .unwrap();
        let notifier = WebhookNotifier::new(routes, "Release notice");

        notifier.notify("crm-api updated", "crm-api", Severity::Info).await;

        crm.assert_async().await;
        default.assert_async().await;
    }

    #[tokio::test]
    async fn unrouted_subject_goes_to_fallback() {
        let mut server = mockito::Server::new_async().await;
        let crm = server.mock("POST", "/hook/crm").expect(0).create_async().await;
        let fallback = Arc::new(RecordingNotifier::new());

        let routes = WebhookRoutes::new(None)
            .route("crm", format!("{}/hook/crm", server.url()))
            .unwrap();
        let notifier = WebhookNotifier::new(routes, "Release notice").with_fallback(fallback.clone());

        notifier.notify("svcA timed out", "svcA", Severity::Error).await;

        crm.assert_async().await;
        let sent = fallback.sent_for("svcA");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message, "svcA timed out");
        assert_eq!(sent[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let mut server = mockito::Server::new_async().await;
        let hook = server
            .mock("POST", "/hook")
            .with_status(500)
            .create_async()
            .await;

        let notifier = WebhookNotifier::new(
            WebhookRoutes::new(Some(format!("{}/hook", server.url()))),
            "Release notice",
        );
        notifier.notify("boom", "svcA", Severity::Error).await;

        hook.assert_async().await;
    }
}
