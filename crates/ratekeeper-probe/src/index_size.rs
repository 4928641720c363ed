//! Index size measurement through the `_cat/indices` API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use ratekeeper_control::{CollaboratorError, MeasurementSource};
use ratekeeper_core::ControllerConfig;

use crate::client::{Endpoint, HttpClient};
use crate::error::{ProbeError, ProbeResult};

/// One row of `_cat/indices?format=json`.
#[derive(Debug, Deserialize)]
struct CatIndexRow {
    #[serde(rename = "store.size")]
    store_size: Option<SizeField>,
}

/// `bytes=b` renders sizes as strings, but some proxies hand back numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SizeField {
    Text(String),
    Number(u64),
}

#[derive(Debug, Clone)]
pub struct IndexSizeSource {
    client: HttpClient,
}

impl IndexSizeSource {
    pub fn new(endpoint: &str, timeout: Duration) -> ProbeResult<Self> {
        Ok(Self {
            client: HttpClient::new(Endpoint::parse(endpoint)?, timeout),
        })
    }

    pub fn from_config(config: &ControllerConfig) -> ProbeResult<Self> {
        Self::new(&config.connections.sample.endpoint, config.request_timeout())
    }

    /// Size in bytes of `index`, as reported by the primary and replica stores.
    pub async fn index_size(&self, index: &str) -> ProbeResult<u64> {
        let path = format!("_cat/indices/{index}?bytes=b&format=json");
        let body = self.client.get(&path).await?;
        let size = parse_store_size(&body)?;
        debug!(%index, size, "index size retrieved");
        Ok(size)
    }
}

/// Extract `store.size` from the first row of a `_cat/indices` response.
fn parse_store_size(body: &[u8]) -> ProbeResult<u64> {
    let rows: Vec<CatIndexRow> =
        serde_json::from_slice(body).map_err(|e| ProbeError::Decode(e.to_string()))?;
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| ProbeError::Decode("no index in response".to_string()))?;
    match row.store_size {
        Some(SizeField::Number(n)) => Ok(n),
        Some(SizeField::Text(text)) => text
            .trim()
            .parse::<u64>()
            .map_err(|_| ProbeError::Decode(format!("store.size {text:?} is not a byte count"))),
        None => Err(ProbeError::Decode("store.size missing".to_string())),
    }
}

#[async_trait]
impl MeasurementSource for IndexSizeSource {
    async fn size(&self, target_id: &str) -> Result<u64, CollaboratorError> {
        self.index_size(target_id)
            .await
            .map_err(|e| CollaboratorError::Measurement(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_server::FakeServer;

    #[test]
    fn parses_string_size() {
        let body = br#"[{"health":"green","index":"logs-2024.06.01","store.size":"123456"}]"#;
        assert_eq!(parse_store_size(body).unwrap(), 123_456);
    }

    #[test]
    fn parses_numeric_size() {
        assert_eq!(parse_store_size(br#"[{"store.size":42}]"#).unwrap(), 42);
    }

    #[test]
    fn rejects_unusable_responses() {
        for body in [
            &b"[]"[..],
            br#"[{"index":"x"}]"#,
            br#"[{"store.size":"12kb"}]"#,
            br#"{"error":"index_not_found_exception"}"#,
            b"not json",
        ] {
            let err = parse_store_size(body).unwrap_err();
            assert!(matches!(err, ProbeError::Decode(_)), "{err}");
        }
    }

    #[tokio::test]
    async fn measures_through_cat_indices() {
        let server = FakeServer::start(200, r#"[{"store.size":"7340032"}]"#).await;
        let source = IndexSizeSource::new(&server.endpoint().to_string(), Duration::from_secs(5))
            .unwrap();

        let size = source.size("logs-2024.06.01").await.unwrap();
        assert_eq!(size, 7_340_032);

        let request = server.request().await;
        assert!(
            request
                .head
                .starts_with("GET /_cat/indices/logs-2024.06.01?bytes=b&format=json HTTP/1.1"),
            "{}",
            request.head
        );
    }

    #[tokio::test]
    async fn missing_index_is_measurement_failure() {
        let server = FakeServer::start(404, r#"{"status":404}"#).await;
        let source = IndexSizeSource::new(&server.endpoint().to_string(), Duration::from_secs(5))
            .unwrap();

        let err = source.size("logs-2024.06.02").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Measurement(_)));
    }
}
