use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use culpa_core::config::ControllerConfig;
use culpa_core::error::{ConnectorError, ConnectorResult};
use culpa_core::sink::{CommitReceipt, ControllerStatus, SampleBatch, WatchpointSink};

use crate::wire::{
    BatchMetadata, CommitRequest, CommitResponse, EnqueueRequest, EnqueueResponse, COMMIT_PATH,
    ENQUEUE_PATH, STATUS_PATH,
};

/// Longest response body quoted in an error message.
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for the Data Culpa controller.
pub struct ValidatorClient {
    client: reqwest::Client,
    base_url: String,
    secret: Option<String>,
    batch_size: usize,
}

impl ValidatorClient {
    pub fn new(config: &ControllerConfig, secret: Option<String>) -> ConnectorResult<Self> {
        Self::with_base_url(config.base_url(), secret, config.timeout, config.batch_size)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        secret: Option<String>,
        timeout: Duration,
        batch_size: usize,
    ) -> ConnectorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mongo-dataculpa/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConnectorError::Connection(anyhow::anyhow!("HTTP client setup failed: {e}")))?;

        if secret.is_none() {
            tracing::warn!("No controller secret configured; requests will be unauthenticated");
        }

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret,
            batch_size: batch_size.max(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, format!("{}{path}", self.base_url));
        match &self.secret {
            Some(secret) => builder.bearer_auth(secret),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> ConnectorResult<T> {
        let response = builder.send().await.map_err(|e| {
            ConnectorError::Connection(anyhow::anyhow!(
                "Controller at {} unreachable: {e}",
                self.base_url
            ))
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ConnectorError::Authentication(format!(
                "controller rejected credentials (HTTP {}); check DC_CONTROLLER_SECRET",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !message.is_char_boundary(cut) {
                    cut -= 1;
                }
                message.truncate(cut);
            }
            return Err(ConnectorError::Controller {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ConnectorError::Serialization(format!("Unexpected controller response: {e}")))
    }
}

#[async_trait]
impl WatchpointSink for ValidatorClient {
    async fn ping(&self) -> ConnectorResult<ControllerStatus> {
        let status: ControllerStatus = self
            .send(self.request(reqwest::Method::GET, STATUS_PATH))
            .await?;
        tracing::debug!(status = %status.status, version = ?status.version, "Controller reachable");
        Ok(status)
    }

    async fn submit(&self, batch: SampleBatch) -> ConnectorResult<CommitReceipt> {
        let mut queue_id: Option<String> = None;

        for chunk in batch.records.chunks(self.batch_size) {
            let body = EnqueueRequest {
                watchpoint: &batch.watchpoint,
                queue_id: queue_id.as_deref(),
                records: chunk,
                metadata: BatchMetadata {
                    source: "mongodb",
                    database: &batch.database,
                    collection: &batch.collection,
                    sampled_at: batch.sampled_at,
                },
            };
            let response: EnqueueResponse = self
                .send(self.request(reqwest::Method::POST, ENQUEUE_PATH).json(&body))
                .await?;
            tracing::debug!(
                watchpoint = %batch.watchpoint,
                queue_id = %response.queue_id,
                queued = response.queued,
                "Enqueued records"
            );
            queue_id.get_or_insert(response.queue_id);
        }

        let queue_id = queue_id.ok_or_else(|| {
            ConnectorError::collection(&batch.collection, anyhow::anyhow!("nothing to commit"))
        })?;

        let committed: CommitResponse = self
            .send(
                self.request(reqwest::Method::POST, &format!("{COMMIT_PATH}/{queue_id}"))
                    .json(&CommitRequest {
                        watchpoint: &batch.watchpoint,
                    }),
            )
            .await?;

        tracing::info!(
            watchpoint = %batch.watchpoint,
            queue_id = %committed.queue_id,
            records = committed.record_count,
            "Committed batch"
        );

        Ok(CommitReceipt {
            queue_id: committed.queue_id,
            record_count: committed.record_count,
            server_result: committed.result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[derive(Debug, Clone)]
    struct Captured {
        method: String,
        path: String,
        authorization: Option<String>,
        body: serde_json::Value,
    }

    type Responder = fn(&str, &str) -> (u16, String);

    /// Serve one request per connection, answering with `respond(method, path)`.
    async fn serve(respond: Responder) -> (String, Arc<Mutex<Vec<Captured>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let captured = Arc::new(Mutex::new(Vec::new()));
        let log = captured.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                let header_end = loop {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break None;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        break Some(pos + 4);
                    }
                };
                let Some(header_end) = header_end else {
                    continue;
                };

                let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
                let mut lines = head.lines();
                let mut request_line = lines.next().unwrap_or_default().split_whitespace();
                let method = request_line.next().unwrap_or_default().to_string();
                let path = request_line.next().unwrap_or_default().to_string();
                let mut content_length = 0usize;
                let mut authorization = None;
                for line in lines {
                    if let Some((name, value)) = line.split_once(':') {
                        let value = value.trim();
                        match name.to_ascii_lowercase().as_str() {
                            "content-length" => content_length = value.parse().unwrap_or(0),
                            "authorization" => authorization = Some(value.to_string()),
                            _ => {}
                        }
                    }
                }
                while buf.len() < header_end + content_length {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let body = serde_json::from_slice(&buf[header_end..]).unwrap_or(serde_json::Value::Null);

                let (code, response_body) = respond(&method, &path);
                log.lock().unwrap().push(Captured {
                    method,
                    path,
                    authorization,
                    body,
                });
                let response = format!(
                    "HTTP/1.1 {code} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{response_body}",
                    response_body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (format!("http://{addr}"), captured)
    }

    fn controller(method: &str, path: &str) -> (u16, String) {
        match (method, path) {
            ("GET", "/api/status") => (200, r#"{"status":"ok","version":"2.1"}"#.into()),
            ("POST", "/api/queue/enqueue") => (200, r#"{"queue_id":"q-7","queued":2}"#.into()),
            ("POST", "/api/queue/commit/q-7") => (
                200,
                r#"{"queue_id":"q-7","record_count":5,"result":{"accepted":true}}"#.into(),
            ),
            _ => (404, "not found".into()),
        }
    }

    fn batch(n: usize) -> SampleBatch {
        SampleBatch {
            watchpoint: "shop-orders".into(),
            database: "shop".into(),
            collection: "orders".into(),
            sampled_at: chrono::Utc::now(),
            records: (0..n).map(|i| serde_json::json!({ "_id": i })).collect(),
        }
    }

    fn client(base_url: &str, secret: Option<&str>) -> ValidatorClient {
        ValidatorClient::with_base_url(
            base_url,
            secret.map(str::to_string),
            Duration::from_secs(5),
            2,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn submit_enqueues_in_chunks_then_commits() {
        let (url, captured) = serve(controller).await;
        let receipt = client(&url, Some("s3cret")).submit(batch(5)).await.unwrap();

        assert_eq!(receipt.queue_id, "q-7");
        assert_eq!(receipt.record_count, 5);
        assert_eq!(receipt.server_result["accepted"], serde_json::json!(true));

        let requests = captured.lock().unwrap().clone();
        assert_eq!(requests.len(), 4);
        for req in &requests {
            assert_eq!(req.method, "POST");
            assert_eq!(req.authorization.as_deref(), Some("Bearer s3cret"));
        }

        let sizes: Vec<usize> = requests[..3]
            .iter()
            .map(|r| r.body["records"].as_array().unwrap().len())
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(requests[0].body.get("queue_id").is_none());
        assert_eq!(requests[1].body["queue_id"], "q-7");
        assert_eq!(requests[0].body["metadata"]["collection"], "orders");
        assert_eq!(requests[3].path, "/api/queue/commit/q-7");
        assert_eq!(requests[3].body["watchpoint"], "shop-orders");
    }

    #[tokio::test]
    async fn ping_reports_controller_version() {
        let (url, captured) = serve(controller).await;
        let status = client(&url, None).ping().await.unwrap();
        assert_eq!(status.status, "ok");
        assert_eq!(status.version.as_deref(), Some("2.1"));
        assert!(captured.lock().unwrap()[0].authorization.is_none());
    }

    #[tokio::test]
    async fn rejected_secret_is_an_authentication_error() {
        let (url, _) = serve(|_, _| (401, r#"{"error":"bad secret"}"#.into())).await;
        let err = client(&url, Some("wrong")).ping().await.unwrap_err();
        assert!(err.is_authentication(), "{err}");
    }

    #[tokio::test]
    async fn server_errors_carry_status_and_body() {
        let (url, _) = serve(|_, _| (500, "queue full".into())).await;
        let err = client(&url, None).submit(batch(1)).await.unwrap_err();
        match err {
            ConnectorError::Controller { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "queue full");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unreachable_controller_is_a_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{addr}"), None).ping().await.unwrap_err();
        assert!(matches!(err, ConnectorError::Connection(_)), "{err}");
    }

    #[test]
    fn base_url_comes_from_config() {
        let config = ControllerConfig::default();
        let client = ValidatorClient::new(&config, None).unwrap();
        assert_eq!(client.base_url(), "http://dataculpa-api:7777");
    }
}
