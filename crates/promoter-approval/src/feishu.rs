//! Feishu approval v4 client.
//!
//! Lists instance codes for one approval definition and fetches instance
//! detail. The detail's `form` is itself a JSON string of widgets; it is
//! decoded here into a name→value map so nothing downstream touches raw
//! JSON. Only the first page of a listing is read.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use promoter_core::{ApprovalDecision, DecisionStatus};
use promoter_core::config::ApprovalConfig;

use crate::error::ApprovalError;
use crate::source::{ApprovalSource, DecisionRef, TimeRange};

const PAGE_SIZE: &str = "100";

/// Response envelope shared by every Feishu open API.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InstanceList {
    #[serde(default)]
    instance_code_list: Vec<String>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct InstanceDetail {
    instance_code: String,
    status: String,
    #[serde(default)]
    form: String,
    #[serde(default)]
    end_time: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FormWidget {
    name: String,
    #[serde(default)]
    value: serde_json::Value,
}

pub struct FeishuClient {
    http: reqwest::Client,
    base_url: String,
    approval_code: String,
    access_token: String,
    descriptor_field: String,
}

impl FeishuClient {
    pub fn new(
        base_url: &str,
        approval_code: &str,
        access_token: &str,
        descriptor_field: &str,
        timeout: Duration,
    ) -> Result<Self, ApprovalError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("promoter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApprovalError::Config(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            approval_code: approval_code.to_string(),
            access_token: access_token.to_string(),
            descriptor_field: descriptor_field.to_string(),
        })
    }

    pub fn from_config(config: &ApprovalConfig, access_token: &str) -> Result<Self, ApprovalError> {
        let timeout = config
            .request_timeout()
            .map_err(|e| ApprovalError::Config(e.to_string()))?;
        Self::new(
            &config.base_url,
            &config.approval_code,
            access_token,
            &config.descriptor_field,
            timeout,
        )
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, ApprovalError> {
        let resp = req.bearer_auth(&self.access_token).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApprovalError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Envelope<T> = resp.json().await?;
        if envelope.code != 0 {
            return Err(ApprovalError::Api {
                code: envelope.code,
                msg: envelope.msg,
            });
        }
        envelope
            .data
            .ok_or_else(|| ApprovalError::Decode("response has no data".to_string()))
    }
}

#[async_trait::async_trait]
impl ApprovalSource for FeishuClient {
    async fn list_decisions(&self, range: TimeRange) -> Result<Vec<DecisionRef>, ApprovalError> {
        let url = format!("{}/open-apis/approval/v4/instances", self.base_url);
        let query = [
            ("approval_code", self.approval_code.clone()),
            ("start_time", range.start_ms.to_string()),
            ("end_time", range.end_ms.to_string()),
            ("page_size", PAGE_SIZE.to_string()),
        ];
        let list: InstanceList = self.send(self.http.get(&url).query(&query)).await?;

        if list.has_more {
            warn!(
                returned = list.instance_code_list.len(),
                "approval listing has more pages; only the first page is processed"
            );
        }
        debug!(count = list.instance_code_list.len(), "listed approval instances");

        Ok(list
            .instance_code_list
            .into_iter()
            .map(|id| DecisionRef { id })
            .collect())
    }

    async fn fetch_detail(&self, id: &str) -> Result<ApprovalDecision, ApprovalError> {
        let url = format!("{}/open-apis/approval/v4/instances/{}", self.base_url, id);
        let detail: InstanceDetail = self.send(self.http.get(&url)).await?;
        decode_detail(detail, &self.descriptor_field)
    }
}

fn decode_detail(detail: InstanceDetail, descriptor_field: &str) -> Result<ApprovalDecision, ApprovalError> {
    let fields = decode_form(&detail.form)?;
    let descriptor = fields.get(descriptor_field).cloned().unwrap_or_default();
    if descriptor.is_empty() {
        debug!(decision = %detail.instance_code, field = %descriptor_field, "decision has no descriptor");
    }

    Ok(ApprovalDecision {
        id: detail.instance_code,
        status: DecisionStatus::parse(&detail.status),
        descriptor,
        expiry_ms: detail.end_time.as_ref().and_then(parse_end_time),
        fields,
    })
}

/// Decode the `form` JSON string into a field-name → value map.
fn decode_form(form: &str) -> Result<BTreeMap<String, String>, ApprovalError> {
    if form.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let widgets: Vec<FormWidget> =
        serde_json::from_str(form).map_err(|e| ApprovalError::Decode(format!("form: {e}")))?;

    Ok(widgets
        .into_iter()
        .map(|w| {
            let value = match w.value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            (w.name, value)
        })
        .collect())
}

/// `end_time` as epoch milliseconds; zero means unset.
///
/// The service sends a millisecond string. A bare JSON number is a
/// second-resolution timestamp.
fn parse_end_time(value: &serde_json::Value) -> Option<u64> {
    let ms = match value {
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        serde_json::Value::Number(n) => n
            .as_f64()
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(|secs| (secs * 1000.0) as u64),
        _ => None,
    };
    ms.filter(|ms| *ms > 0)
}
