//! Response shapes of the Prometheus HTTP API (`/api/v1/query`,
//! `/api/v1/rules`).

use super::{Rule, RuleGroup};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
/// Common envelope: `{"status": "...", "data": ..., "errorType": ..., "error": ...}`.
pub struct ApiResponse<T> {
    pub status: String,
    pub data: Option<T>,
    #[serde(default, rename = "errorType")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Unwrap the payload of a successful response, or describe the failure.
    pub fn into_data(self) -> Result<T, String> {
        if self.status != "success" {
            return Err(match (self.error_type, self.error) {
                (Some(kind), Some(msg)) => format!("{}: {}", kind, msg),
                (None, Some(msg)) => msg,
                (Some(kind), None) => kind,
                (None, None) => format!("unexpected status '{}'", self.status),
            });
        }
        self.data
            .ok_or_else(|| "response contains no data".to_string())
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
/// Payload of an instant query.
pub struct QueryData {
    pub result_type: String,
    #[serde(default)]
    pub result: Vec<VectorSample>,
}

#[derive(Deserialize, Debug)]
/// One instant-vector sample: `[<unix seconds>, "<value>"]`.
pub struct VectorSample {
    pub value: (f64, String),
}

#[derive(Deserialize, Debug)]
/// Payload of the rules listing.
pub struct RulesData {
    #[serde(default)]
    pub groups: Vec<ApiRuleGroup>,
}

#[derive(Deserialize, Debug)]
pub struct ApiRuleGroup {
    pub name: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub rules: Vec<ApiRule>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ApiRule {
    Alerting { name: String, query: String },
    Recording { name: String, query: String },
}

impl From<ApiRuleGroup> for RuleGroup {
    fn from(g: ApiRuleGroup) -> Self {
        RuleGroup {
            name: g.name,
            file: g.file,
            rules: g
                .rules
                .into_iter()
                .map(|r| match r {
                    ApiRule::Alerting { name, query } | ApiRule::Recording { name, query } => {
                        Rule::new(name, query)
                    }
                })
                .collect(),
        }
    }
}
