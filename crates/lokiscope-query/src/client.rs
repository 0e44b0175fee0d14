use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

use lokiscope_types::{LogBatch, LogEntry, LogStreamLabels, Timestamp};

use crate::{LogQuery, LogSource, QueryError};

/// Default query window when no explicit lookback is configured
const DEFAULT_LOOKBACK: Duration = Duration::from_secs(60 * 60);

/// HTTP client for a Loki-compatible `query_range` API
#[derive(Clone)]
pub struct LokiClient {
    http: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
    org_id: Option<String>,
    lookback: Duration,
}

impl LokiClient {
    /// Create a client for the given base URL (e.g. `http://localhost:3100`)
    pub fn new(endpoint: &str) -> Result<Self, QueryError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| QueryError::InvalidEndpoint(e.to_string()))?;
        if endpoint.cannot_be_a_base() {
            return Err(QueryError::InvalidEndpoint(endpoint.to_string()));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("lokiscope/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint,
            token: None,
            org_id: None,
            lookback: DEFAULT_LOOKBACK,
        })
    }

    /// Send a bearer token with every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Tenant for multi-tenant deployments (`X-Scope-OrgID`)
    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    /// How far back from the page's end each query looks
    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn query_range_url(&self) -> Result<Url, QueryError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| QueryError::InvalidEndpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .extend(["loki", "api", "v1", "query_range"]);
        Ok(url)
    }

    /// Query parameters for one page, with `now` used when there is no cursor
    fn params(&self, query: &LogQuery, now: Timestamp) -> Vec<(&'static str, String)> {
        let end = query.start.unwrap_or(now);
        let lookback = i64::try_from(self.lookback.as_nanos()).unwrap_or(i64::MAX);
        let start = end.saturating_sub(lookback);

        vec![
            ("query", query.query.clone()),
            ("limit", query.limit.to_string()),
            ("direction", "backward".to_string()),
            ("start", start.to_string()),
            ("end", end.to_string()),
        ]
    }

    /// Run a `query_range` request and decode its streams
    pub async fn query_range(&self, query: &LogQuery) -> Result<Vec<LogBatch>, QueryError> {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let url = self.query_range_url()?;

        let mut request = self.http.get(url).query(&self.params(query, now));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(org_id) = &self.org_id {
            request = request.header("X-Scope-OrgID", org_id);
        }

        debug!(query = %query.query, limit = query.limit, start = ?query.start, "query_range");
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "log backend rejected query");
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        decode_streams(&body, query.start)
    }
}

impl LogSource for LokiClient {
    fn query(
        &self,
        query: &LogQuery,
    ) -> impl std::future::Future<Output = Result<Vec<LogBatch>, QueryError>> + Send {
        self.query_range(query)
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    data: QueryData,
}

#[derive(Deserialize)]
struct QueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: Vec<StreamResult>,
}

#[derive(Deserialize)]
struct StreamResult {
    #[serde(default)]
    stream: BTreeMap<String, String>,
    #[serde(default)]
    values: Vec<(String, String)>,
}

/// Decode a `query_range` body into batches.
///
/// Entries at or after `cursor` are dropped so the page boundary stays exclusive.
pub fn decode_streams(body: &str, cursor: Option<Timestamp>) -> Result<Vec<LogBatch>, QueryError> {
    let response: QueryResponse = serde_json::from_str(body)?;
    if response.data.result_type != "streams" {
        return Err(QueryError::UnsupportedResult(response.data.result_type));
    }

    response
        .data
        .result
        .into_iter()
        .map(|stream| -> Result<LogBatch, QueryError> {
            let mut entries = Vec::with_capacity(stream.values.len());
            for (ts, text) in stream.values {
                let timestamp: Timestamp = ts
                    .parse()
                    .map_err(|_| QueryError::InvalidTimestamp(ts.clone()))?;
                if cursor.is_some_and(|c| timestamp >= c) {
                    continue;
                }
                entries.push(LogEntry::new(timestamp, text));
            }
            Ok(LogBatch::new(LogStreamLabels::from(stream.stream), entries))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "status": "success",
        "data": {
            "resultType": "streams",
            "result": [
                {
                    "stream": {"namespace": "prod", "pod": "api-1"},
                    "values": [["300", "third"], ["200", "second"], ["100", "first"]]
                },
                {
                    "stream": {"namespace": "prod", "pod": "api-2"},
                    "values": [["250", "other"]]
                }
            ]
        }
    }"#;

    #[test]
    fn test_decode_streams() {
        let batches = decode_streams(BODY, None).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].labels.get("pod"), Some("api-1"));
        assert_eq!(batches[0].entries[0], LogEntry::new(300, "third"));
        assert_eq!(batches[0].len(), 3);
        assert_eq!(batches[1].oldest(), Some(250));
    }

    #[test]
    fn test_decode_drops_entries_at_or_after_cursor() {
        let batches = decode_streams(BODY, Some(250)).unwrap();
        let timestamps: Vec<_> = batches[0].entries.iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![200, 100]);
        assert!(batches[1].is_empty());
    }

    #[test]
    fn test_decode_rejects_matrix_results() {
        let body = r#"{"status":"success","data":{"resultType":"matrix","result":[]}}"#;
        assert!(matches!(
            decode_streams(body, None),
            Err(QueryError::UnsupportedResult(kind)) if kind == "matrix"
        ));
    }

    #[test]
    fn test_decode_rejects_bad_timestamp() {
        let body = r#"{"data":{"resultType":"streams","result":[{"stream":{},"values":[["soon","x"]]}]}}"#;
        assert!(matches!(
            decode_streams(body, None),
            Err(QueryError::InvalidTimestamp(ts)) if ts == "soon"
        ));
    }

    #[test]
    fn test_query_range_url_keeps_base_path() {
        let client = LokiClient::new("https://logs.example.com/gateway/").unwrap();
        assert_eq!(
            client.query_range_url().unwrap().as_str(),
            "https://logs.example.com/gateway/loki/api/v1/query_range"
        );
    }

    #[test]
    fn test_params_use_cursor_as_end() {
        let client = LokiClient::new("http://localhost:3100")
            .unwrap()
            .with_lookback(Duration::from_nanos(1_000));
        let query = LogQuery::before(r#"{namespace="prod"}"#, 50, 5_000);
        let params = client.params(&query, 9_999);

        assert!(params.contains(&("end", "5000".to_string())));
        assert!(params.contains(&("start", "4000".to_string())));
        assert!(params.contains(&("limit", "50".to_string())));
        assert!(params.contains(&("direction", "backward".to_string())));
    }

    #[test]
    fn test_params_without_cursor_end_now() {
        let client = LokiClient::new("http://localhost:3100").unwrap();
        let params = client.params(&LogQuery::latest("{}", 10), 42);
        assert!(params.contains(&("end", "42".to_string())));
    }
}
