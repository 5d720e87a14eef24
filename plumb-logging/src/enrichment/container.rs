//! Container platform (ECS/Fargate) task metadata

use super::{EnrichmentBlock, Enricher};
use crate::error::LoggerError;
use serde::Deserialize;
use serde_json::{json, Map, Value as JsonValue};
use std::time::Duration;

/// Environment variable holding the metadata endpoint base URL
pub const METADATA_URI_VAR: &str = "ECS_CONTAINER_METADATA_URI_V4";

pub const BLOCK_NAME: &str = "fargate";

/// Fetches JSON documents from the metadata endpoint
#[cfg_attr(test, mockall::automock)]
pub trait MetadataClient: Send + Sync {
    fn fetch(&self, url: &str) -> Result<JsonValue, LoggerError>;
}

/// Blocking HTTP metadata client.
///
/// Each fetch runs on its own short-lived thread which builds, uses and
/// drops the `reqwest` blocking client. The caller may therefore sit inside
/// an async runtime, where the blocking client must never be created,
/// used or dropped.
#[derive(Debug)]
pub struct HttpMetadataClient {
    timeout: Duration,
}

impl HttpMetadataClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

fn fetch_blocking(url: &str, timeout: Duration) -> Result<JsonValue, LoggerError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| {
            LoggerError::EnrichmentUnavailable(format!("Failed to build metadata HTTP client: {e}"))
        })?;

    let response = client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .map_err(|e| {
            LoggerError::EnrichmentUnavailable(format!(
                "Failed to read container metadata from {url}: {e}"
            ))
        })?;

    response.json::<JsonValue>().map_err(|e| LoggerError::EnrichmentShape {
        subject: "Container metadata response".to_string(),
        interface: "JSON",
        reason: e.to_string(),
    })
}

impl MetadataClient for HttpMetadataClient {
    fn fetch(&self, url: &str) -> Result<JsonValue, LoggerError> {
        tracing::debug!(%url, "Fetching container metadata");

        let owned_url = url.to_string();
        let timeout = self.timeout;
        let worker = std::thread::Builder::new()
            .name("plumb-metadata".to_string())
            .spawn(move || fetch_blocking(&owned_url, timeout))
            .map_err(|e| {
                LoggerError::EnrichmentUnavailable(format!("Failed to start metadata fetch: {e}"))
            })?;

        worker.join().unwrap_or_else(|_| {
            Err(LoggerError::EnrichmentUnavailable(format!(
                "Metadata fetch from {url} panicked"
            )))
        })
    }
}

#[derive(Debug, Deserialize)]
struct ContainerMetadata {
    #[serde(rename = "ImageID")]
    image_id: String,
    #[serde(rename = "StartedAt")]
    started_at: String,
    #[serde(rename = "Labels")]
    labels: ContainerLabels,
}

#[derive(Debug, Deserialize)]
struct ContainerLabels {
    #[serde(rename = "com.amazonaws.ecs.task-arn")]
    task_arn: String,
}

#[derive(Debug, Deserialize)]
struct TaskMetadata {
    #[serde(rename = "AvailabilityZone")]
    availability_zone: String,
}

/// Reads container then task metadata and extracts image id, task ARN,
/// start time and region.
pub struct ContainerMetadataEnricher<'a> {
    client: &'a dyn MetadataClient,
}

impl<'a> ContainerMetadataEnricher<'a> {
    pub fn new(client: &'a dyn MetadataClient) -> Self {
        Self { client }
    }

    fn base_url() -> Result<String, LoggerError> {
        std::env::var(METADATA_URI_VAR)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                LoggerError::EnrichmentUnavailable(format!(
                    "Failed to find metadata URL on environment ({METADATA_URI_VAR} is not set)"
                ))
            })
    }
}

fn parse<T: for<'de> Deserialize<'de>>(value: JsonValue, interface: &'static str) -> Result<T, LoggerError> {
    serde_json::from_value(value).map_err(|e| LoggerError::EnrichmentShape {
        subject: "Response".to_string(),
        interface,
        reason: e.to_string(),
    })
}

impl Enricher for ContainerMetadataEnricher<'_> {
    fn source_name(&self) -> &'static str {
        "Fargate container metadata"
    }

    fn extract(&self) -> Result<EnrichmentBlock, LoggerError> {
        let base_url = Self::base_url()?;

        let container: ContainerMetadata =
            parse(self.client.fetch(&base_url)?, "ContainerMetadataResponse")?;

        let task_url = format!("{}/task", base_url.trim_end_matches('/'));
        let task: TaskMetadata = parse(self.client.fetch(&task_url)?, "TaskMetadataResponse")?;

        // Region is the availability zone minus its trailing zone letter
        let mut region = task.availability_zone;
        region.pop();
        if region.is_empty() {
            return Err(LoggerError::EnrichmentShape {
                subject: "Response".to_string(),
                interface: "TaskMetadataResponse",
                reason: "AvailabilityZone is empty".to_string(),
            });
        }

        let mut fields = Map::new();
        fields.insert("image_id".to_string(), json!(container.image_id));
        fields.insert("task_arn".to_string(), json!(container.labels.task_arn));
        fields.insert(
            "container_started_at".to_string(),
            json!(container.started_at),
        );
        fields.insert("aws_region".to_string(), json!(region));
        tracing::debug!(%region, "Container metadata extracted");

        Ok(EnrichmentBlock::new(BLOCK_NAME, fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    const BASE: &str = "https://test-base-container-url";

    fn container_response() -> JsonValue {
        json!({
            "ImageID": "image12345",
            "StartedAt": "2023-07-21T15:45:44.954460255Z",
            "Labels": {
                "com.amazonaws.ecs.task-arn": "arn:aws:ecs:us-east-1:123456789012:task/testcluster/testarn"
            }
        })
    }

    #[test]
    fn test_extracts_expected_fields() {
        let mut client = MockMetadataClient::new();
        client
            .expect_fetch()
            .with(eq(BASE))
            .returning(|_| Ok(container_response()));
        client
            .expect_fetch()
            .with(eq("https://test-base-container-url/task"))
            .returning(|_| Ok(json!({"AvailabilityZone": "eu-test-1a"})));

        temp_env::with_var(METADATA_URI_VAR, Some(BASE), || {
            let block = ContainerMetadataEnricher::new(&client).extract().unwrap();

            assert_eq!(block.name(), "fargate");
            assert_eq!(block.fields()["image_id"], "image12345");
            assert_eq!(
                block.fields()["task_arn"],
                "arn:aws:ecs:us-east-1:123456789012:task/testcluster/testarn"
            );
            assert_eq!(
                block.fields()["container_started_at"],
                "2023-07-21T15:45:44.954460255Z"
            );
            assert_eq!(block.fields()["aws_region"], "eu-test-1");
        });
    }

    #[test]
    fn test_malformed_responses_are_shape_errors() {
        for response in [json!({"a_dummy_response": true}), JsonValue::Null, json!(0), json!("blah")] {
            let mut client = MockMetadataClient::new();
            client.expect_fetch().returning(move |_| Ok(response.clone()));

            temp_env::with_var(METADATA_URI_VAR, Some(BASE), || {
                let err = ContainerMetadataEnricher::new(&client).extract().unwrap_err();

                assert!(matches!(err, LoggerError::EnrichmentShape { .. }));
                assert!(err
                    .to_string()
                    .contains("Response doesn't conform to ContainerMetadataResponse"));
            });
        }
    }

    #[test]
    fn test_missing_url_is_unavailable() {
        let mut client = MockMetadataClient::new();
        client.expect_fetch().never();

        temp_env::with_var_unset(METADATA_URI_VAR, || {
            let err = ContainerMetadataEnricher::new(&client).extract().unwrap_err();

            assert!(matches!(err, LoggerError::EnrichmentUnavailable(_)));
            assert!(err.to_string().contains("Failed to find metadata URL on environment"));
        });
    }

    #[test]
    fn test_transport_failure_propagates() {
        let mut client = MockMetadataClient::new();
        client
            .expect_fetch()
            .returning(|_| Err(LoggerError::EnrichmentUnavailable("connection refused".to_string())));

        temp_env::with_var(METADATA_URI_VAR, Some(BASE), || {
            let err = ContainerMetadataEnricher::new(&client).extract().unwrap_err();
            assert_eq!(err.to_string(), "connection refused");
        });
    }

    // Port 9 (discard) refuses connections on loopback
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    #[test]
    fn test_http_client_reports_unreachable_endpoint() {
        let client = HttpMetadataClient::new(Duration::from_millis(500));

        let err = client.fetch(UNREACHABLE).unwrap_err();

        assert!(matches!(err, LoggerError::EnrichmentUnavailable(_)));
        assert!(err.to_string().contains("Failed to read container metadata from"));
    }

    #[tokio::test]
    async fn test_http_client_is_usable_inside_async_runtime() {
        let client = HttpMetadataClient::new(Duration::from_millis(500));

        let err = client.fetch(UNREACHABLE).unwrap_err();
        drop(client);

        assert!(matches!(err, LoggerError::EnrichmentUnavailable(_)));
    }
}
