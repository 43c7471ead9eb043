//! Live selector probes against a Prometheus-compatible backend.
//!
//! A probe runs the instant query `count(<selector>)` at the current time
//! and reports how many series matched. Successful probes are followed by
//! a fixed delay; the delay throttles each calling task only, so the
//! aggregate request rate still grows with the number of concurrently
//! checked rules.

use crate::error::{Error, Result};
use crate::models::api::{ApiResponse, QueryData};
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[async_trait]
/// Counts the series currently matched by a selector.
pub trait Prober: Send + Sync {
    async fn probe_selector(&self, selector: &str) -> Result<f64>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// HTTP basic auth credentials for the backend.
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    /// Credentials are only applied when both parts are set.
    pub fn from_parts(username: Option<&str>, password: Option<&str>) -> Option<Self> {
        match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some(Self {
                username: u.to_string(),
                password: p.to_string(),
            }),
            _ => None,
        }
    }

    pub(crate) fn apply(auth: Option<&Self>, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match auth {
            Some(a) => req.basic_auth(&a.username, Some(&a.password)),
            None => req,
        }
    }
}

/// Probe backed by the `/api/v1/query` endpoint.
pub struct PrometheusProbe {
    client: Client,
    base_url: String,
    auth: Option<BasicAuth>,
    delay: Duration,
}

impl PrometheusProbe {
    pub fn new(client: Client, base_url: &str, auth: Option<BasicAuth>, delay: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            delay,
        }
    }

    async fn probe(&self, selector: &str) -> Result<f64> {
        let query = format!("count({})", selector);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        let req = self
            .client
            .get(format!("{}/api/v1/query", self.base_url))
            .query(&[("query", query), ("time", format!("{:.3}", now))]);
        let resp = BasicAuth::apply(self.auth.as_ref(), req)
            .send()
            .await
            .map_err(|e| Error::Probe(e.to_string()))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Probe(e.to_string()))?;
        parse_query_response(status, &body)
    }
}

#[async_trait]
impl Prober for PrometheusProbe {
    async fn probe_selector(&self, selector: &str) -> Result<f64> {
        let value = self.probe(selector).await?;
        tokio::time::sleep(self.delay).await;
        Ok(value)
    }
}

/// Decode an instant query response into the matched series count.
///
/// An empty vector means zero and so does a `NaN` sample.
pub(crate) fn parse_query_response(status: reqwest::StatusCode, body: &str) -> Result<f64> {
    let parsed: ApiResponse<QueryData> = serde_json::from_str(body)
        .map_err(|e| Error::Probe(format!("HTTP {}: invalid response: {}", status, e)))?;
    let data = parsed
        .into_data()
        .map_err(|e| Error::Probe(format!("HTTP {}: {}", status, e)))?;
    if data.result_type != "vector" {
        return Err(Error::Probe(format!(
            "unexpected result type '{}'",
            data.result_type
        )));
    }
    let mut value = 0.0;
    for sample in &data.result {
        let v: f64 = sample
            .value
            .1
            .parse()
            .map_err(|_| Error::Probe(format!("invalid sample value '{}'", sample.value.1)))?;
        value = if v.is_nan() { 0.0 } else { v };
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, routing::get, Json, Router};
    use reqwest::StatusCode;
    use serde_json::json;
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_parse_count_sample() {
        let body = r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{},"value":[1700000000.123,"2"]}]}}"#;
        assert_eq!(parse_query_response(StatusCode::OK, body).unwrap(), 2.0);
    }

    #[test]
    fn test_parse_empty_vector_and_nan_are_zero() {
        let empty = r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#;
        assert_eq!(parse_query_response(StatusCode::OK, empty).unwrap(), 0.0);
        let nan = r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{},"value":[1,"NaN"]}]}}"#;
        assert_eq!(parse_query_response(StatusCode::OK, nan).unwrap(), 0.0);
    }

    #[test]
    fn test_parse_error_status_is_probe_error() {
        let body = r#"{"status":"error","errorType":"bad_data","error":"invalid parameter \"query\""}"#;
        let err = parse_query_response(StatusCode::BAD_REQUEST, body).unwrap_err();
        assert!(matches!(err, Error::Probe(ref m) if m.contains("bad_data")));
        let err = parse_query_response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, Error::Probe(ref m) if m.contains("502")));
    }

    #[tokio::test]
    async fn test_probe_queries_count_of_selector() {
        let router = Router::new().route(
            "/api/v1/query",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let count = if params.get("query").map(String::as_str) == Some(r#"count(up{job="x"})"#)
                    && params.contains_key("time")
                {
                    "2"
                } else {
                    "0"
                };
                Json(json!({
                    "status": "success",
                    "data": {"resultType": "vector", "result": [{"metric": {}, "value": [1, count]}]}
                }))
            }),
        );
        let url = serve(router).await;
        let probe = PrometheusProbe::new(Client::new(), &format!("{}/", url), None, Duration::ZERO);
        assert_eq!(probe.probe_selector(r#"up{job="x"}"#).await.unwrap(), 2.0);
        assert_eq!(probe.probe_selector("down").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_probe_network_failure_is_probe_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let probe = PrometheusProbe::new(Client::new(), &format!("http://{}", addr), None, Duration::ZERO);
        let err = probe.probe_selector("up").await.unwrap_err();
        assert!(matches!(err, Error::Probe(_)));
    }

    #[test]
    fn test_basic_auth_requires_both_parts() {
        assert!(BasicAuth::from_parts(Some("u"), None).is_none());
        assert!(BasicAuth::from_parts(Some(""), Some("p")).is_none());
        assert_eq!(
            BasicAuth::from_parts(Some("u"), Some("p")),
            Some(BasicAuth { username: "u".into(), password: "p".into() })
        );
    }
}
