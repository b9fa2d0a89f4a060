//! promoter.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duration::parse_duration;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for {field}: {value:?}")]
    Duration { field: &'static str, value: String },

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromoterConfig {
    pub approval: ApprovalConfig,
    pub cluster: ClusterConfig,
    pub rollout: RolloutConfig,
    pub convergence: ConvergenceConfig,
    pub scheduler: SchedulerConfig,
    pub state: StateConfig,
    pub notify: NotifyConfig,
    pub ci: Option<CiConfig>,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    pub base_url: String,
    pub approval_code: String,
    pub access_token: Option<String>,
    /// Form field holding the change descriptor.
    pub descriptor_field: String,
    pub expiry_grace: String,
    pub request_timeout: String,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://open.feishu.cn".to_string(),
            approval_code: String::new(),
            access_token: None,
            descriptor_field: "JobNameAndVersionNumber".to_string(),
            expiry_grace: "60s".to_string(),
            request_timeout: "10s".to_string(),
        }
    }
}

impl ApprovalConfig {
    pub fn expiry_grace(&self) -> Result<Duration, ConfigError> {
        duration_field("approval.expiry_grace", &self.expiry_grace)
    }

    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        duration_field("approval.request_timeout", &self.request_timeout)
    }

    pub fn access_token(&self) -> Result<&str, ConfigError> {
        self.access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::Missing("approval.access_token"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub namespace: String,
    /// Explicit kubeconfig; the ambient cluster config is used when absent.
    pub kubeconfig: Option<PathBuf>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            kubeconfig: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// Workload name tokens that opt out of automated rollout.
    pub excluded: Vec<String>,
    pub image_naming: ImageNamingConfig,
}

/// How the convergence watcher derives the image it waits for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ImageNamingConfig {
    /// Wait for exactly the image the executor wrote.
    #[default]
    Applied,
    /// Wait for `{registry}/{repository}/{name}:{version}`.
    Registry {
        registry: String,
        repository: String,
        /// Suffix stripped from the workload name, e.g. `-gray-level`.
        #[serde(default)]
        strip_suffix: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    pub interval: String,
    pub deadline: String,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            interval: "10s".to_string(),
            deadline: "2m".to_string(),
        }
    }
}

impl ConvergenceConfig {
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        duration_field("convergence.interval", &self.interval)
    }

    pub fn deadline(&self) -> Result<Duration, ConfigError> {
        duration_field("convergence.deadline", &self.deadline)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub period: String,
    pub shutdown_grace: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period: "30s".to_string(),
            shutdown_grace: "5s".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn period(&self) -> Result<Duration, ConfigError> {
        duration_field("scheduler.period", &self.period)
    }

    pub fn shutdown_grace(&self) -> Result<Duration, ConfigError> {
        duration_field("scheduler.shutdown_grace", &self.shutdown_grace)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/promoter/dedup.redb"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Webhook used when no route matches. No webhook means log-only.
    pub default_webhook: Option<String>,
    pub title: String,
    pub routes: Vec<NotifyRoute>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            default_webhook: None,
            title: "Release notice".to_string(),
            routes: Vec::new(),
        }
    }
}

/// Sends notifications for workloads containing `token` to `webhook`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyRoute {
    pub token: String,
    pub webhook: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiConfig {
    pub base_url: String,
    pub user: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl PromoterConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PromoterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every duration up front so bad values fail at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.approval.expiry_grace()?;
        self.approval.request_timeout()?;
        non_zero("convergence.interval", self.convergence.interval()?)?;
        self.convergence.deadline()?;
        non_zero("scheduler.period", self.scheduler.period()?)?;
        self.scheduler.shutdown_grace()?;
        Ok(())
    }
}

fn non_zero(field: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::Zero(field));
    }
    Ok(())
}

fn duration_field(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).ok_or_else(|| ConfigError::Duration {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = PromoterConfig::from_toml_str("").unwrap();
        assert_eq!(config.convergence.interval().unwrap(), Duration::from_secs(10));
        assert_eq!(config.convergence.deadline().unwrap(), Duration::from_secs(120));
        assert_eq!(config.scheduler.period().unwrap(), Duration::from_secs(30));
        assert_eq!(config.approval.descriptor_field, "JobNameAndVersionNumber");
        assert_eq!(config.rollout.image_naming, ImageNamingConfig::Applied);
        assert_eq!(config.server.port, 8080);
        assert!(config.ci.is_none());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[approval]
approval_code = "ABC-123"
access_token = "t-xyz"

[cluster]
namespace = "uat"

[rollout]
excluded = ["crm"]
image_naming = { strategy = "registry", registry = "registry.example.com", repository = "uat", strip_suffix = "-gray-level" }

[convergence]
interval = "500ms"
deadline = "30s"

[notify]
default_webhook = "https://hooks.example.com/default"
routes = [{ token = "crm", webhook = "https://hooks.example.com/crm" }]

[ci]
base_url = "http://jenkins:8080"
user = "bot"
token = "secret"
"#;
        let config = PromoterConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.cluster.namespace, "uat");
        assert_eq!(config.rollout.excluded, vec!["crm".to_string()]);
        assert_eq!(
            config.rollout.image_naming,
            ImageNamingConfig::Registry {
                registry: "registry.example.com".to_string(),
                repository: "uat".to_string(),
                strip_suffix: Some("-gray-level".to_string()),
            }
        );
        assert_eq!(config.convergence.interval().unwrap(), Duration::from_millis(500));
        assert_eq!(config.notify.routes.len(), 1);
        assert_eq!(config.ci.unwrap().user, "bot");
    }

    #[test]
    fn invalid_duration_is_rejected() {
        let err = PromoterConfig::from_toml_str("[convergence]\ndeadline = \"forever\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Duration { field: "convergence.deadline", .. }));
    }

    #[test]
    fn zero_period_and_poll_interval_are_rejected() {
        let err = PromoterConfig::from_toml_str("[scheduler]\nperiod = \"0s\"").unwrap_err();
        assert!(matches!(err, ConfigError::Zero("scheduler.period")));

        let err = PromoterConfig::from_toml_str("[convergence]\ninterval = \"0ms\"").unwrap_err();
        assert!(matches!(err, ConfigError::Zero("convergence.interval")));
    }

    #[test]
    fn access_token_is_required_when_asked() {
        let config = PromoterConfig::default();
        assert!(matches!(
            config.approval.access_token(),
            Err(ConfigError::Missing("approval.access_token"))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = PromoterConfig::from_file(Path::new("/nonexistent/promoter.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/promoter.toml"));
    }
}
