//! # 📡 THE ELASTICSEARCH BACKEND
//!
//! 🎬 COLD OPEN — INT. SERVER ROOM — 3:47 AM
//!
//! The autocomplete box was slow. Somebody asked "what if every dataset had a
//! million distinct values in every column?" Nobody knew. So we decided to find out,
//! by throwing 15MB of fake column values at the cluster, again and again, until it
//! either answered or caught fire.
//!
//! This module is the HTTP end of that experiment. It:
//! - pings `/_cluster/health` on startup (is anyone home?)
//! - optionally destroys and recreates the sample index with the completion mapping
//! - POSTs NDJSON to `/_bulk`, optionally gzipped
//! - PUTs single documents to `/{index}/_doc/{id}` for the low-volume path
//!
//! It does not retry. It does not buffer. The batcher upstream owns the buffer, and
//! retries are not on the menu. 🦆

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::json;
use tracing::{debug, info, trace};

use crate::backends::{BulkOutcome, CommonSinkConfig, IndexBackend};
use crate::common::{BulkOperation, SampleDocument};

#[derive(Debug, Deserialize, Clone)]
pub struct ElasticsearchSinkConfig {
    /// 📡 Where to send the documents, e.g. `http://10.0.0.1:9200`
    pub url: String,
    /// 📦 The one index all samples land in.
    #[serde(default = "default_index")]
    pub index: String,
    /// 🔒 Username. The bouncer at the club.
    #[serde(default)]
    pub username: Option<String>,
    /// 🔒 Password. "password123" is not a password. It is a confession.
    #[serde(default)]
    pub password: Option<String>,
    /// 🔒 API key — the velvet rope variant of authentication. Wins over basic auth.
    #[serde(default)]
    pub api_key: Option<String>,
    /// ⚠️ DELETE + PUT the index on startup. Throwaway indices only.
    #[serde(default = "default_recreate_index")]
    pub recreate_index: bool,
    /// 🫁 gzip the bulk body. Costs CPU, saves wire.
    #[serde(default)]
    pub compress_requests: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(flatten, default)]
    pub common_config: CommonSinkConfig,
}

fn default_index() -> String {
    "spandex".to_string()
}

fn default_recreate_index() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    60
}

/// 🗺️ The sample index mapping: keyword ids, a long copy id, and `value` as a completion
/// field whose suggestions are scoped by a `composite_id` category context.
pub fn index_mapping() -> serde_json::Value {
    json!({
        "mappings": {
            "properties": {
                "dataset_id": { "type": "keyword" },
                "copy_id": { "type": "long" },
                "column_id": { "type": "keyword" },
                "composite_id": { "type": "keyword" },
                "value": {
                    "type": "completion",
                    "analyzer": "keyword",
                    "preserve_separators": true,
                    "preserve_position_increments": true,
                    "max_input_length": 50,
                    "contexts": [
                        { "name": "composite_id", "type": "category", "path": "composite_id" }
                    ]
                }
            }
        }
    })
}

/// 📬 Just the bits of a `_bulk` response we care about. `items` is counted, not parsed:
/// a 15MB batch comes back with a lot of items, and we only need to know how many.
#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<IgnoredAny>,
}

/// 📡 The sink side of the Elasticsearch backend — pure I/O, zero buffering.
#[derive(Debug)]
pub struct ElasticsearchSink {
    client: reqwest::Client,
    sink_config: ElasticsearchSinkConfig,
}

impl ElasticsearchSink {
    /// 🚀 Build the client, then knock on `/_cluster/health` so a dead cluster fails
    /// the run now instead of 15MB from now.
    pub async fn new(config: ElasticsearchSinkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. The TLS stack wept. The architect shrugged.")?;

        let sink = Self {
            client,
            sink_config: config,
        };

        let health_url = sink.url_for(&["_cluster", "health"])?;
        let response = sink
            .authorize(sink.client.get(health_url))
            .send()
            .await
            .context("💀 Knocked on /_cluster/health. Nobody answered. Is the cluster actually running?")?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!(
                "💀 /_cluster/health said {}. The body read: '{}'. Check credentials and the URL.",
                status,
                body
            );
        }
        info!("📡 cluster health: {}", body);

        Ok(sink)
    }

    /// 🔗 `{url}/seg/seg/...`, every segment percent-encoded by `Url` itself, so an id
    /// with a `/` or a space in it stays one segment.
    fn url_for(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.sink_config.url)
            .context(format!("💀 '{}' is not a URL", self.sink_config.url))?;
        url.path_segments_mut()
            .map_err(|_| {
                anyhow::anyhow!(
                    "💀 '{}' can't have path segments. Is that a mailto: link?",
                    self.sink_config.url
                )
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// 🔒 API key beats basic auth. This is not a democracy.
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref api_key) = self.sink_config.api_key {
            request.header("Authorization", format!("ApiKey {}", api_key))
        } else if let Some(ref username) = self.sink_config.username {
            request.basic_auth(username, self.sink_config.password.as_ref())
        } else {
            request
        }
    }

    /// 📝 Render operations into the `_bulk` NDJSON body: action line, source line, repeat,
    /// trailing newline included because ES will sulk without it.
    pub(crate) fn render_bulk_body(&self, operations: &[BulkOperation]) -> Result<String> {
        let estimated_size: usize = operations
            .iter()
            .map(|op| op.source.len() + op.id.len() + self.sink_config.index.len() + 40)
            .sum();
        let mut body = String::with_capacity(estimated_size);
        for operation in operations {
            let action = json!({
                "index": { "_index": self.sink_config.index, "_id": operation.id }
            });
            let action_line = serde_json::to_string(&action)
                .context("💀 The JSON that describes JSON has failed to become JSON.")?;
            body.push_str(&action_line);
            body.push('\n');
            body.push_str(&operation.source);
            body.push('\n');
        }
        Ok(body)
    }
}

fn gzip(body: &str) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 4), Compression::fast());
    encoder
        .write_all(body.as_bytes())
        .context("💀 gzip choked on the bulk body")?;
    encoder.finish().context("💀 gzip could not finish the bulk body")
}

#[async_trait]
impl IndexBackend for ElasticsearchSink {
    async fn recreate_index(&mut self) -> Result<()> {
        let index_url = self.url_for(&[self.sink_config.index.as_str()])?;

        // -- 🧨 DELETE first. 404 is fine: you can't delete what was never there.
        let response = self
            .authorize(self.client.delete(index_url.clone()))
            .send()
            .await
            .context("💀 DELETE on the index never made it to the cluster.")?;
        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "💀 Could not delete index '{}': {} '{}'",
                self.sink_config.index,
                status,
                body
            );
        }

        let response = self
            .authorize(self.client.put(index_url))
            .header("Content-Type", "application/json")
            .body(index_mapping().to_string())
            .send()
            .await
            .context("💀 PUT on the index never made it to the cluster.")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "💀 Could not create index '{}': {} '{}'. The mapping and the cluster disagree.",
                self.sink_config.index,
                status,
                body
            );
        }
        info!("🏗️ index '{}' recreated from scratch", self.sink_config.index);
        Ok(())
    }

    async fn bulk(&mut self, operations: &[BulkOperation]) -> Result<BulkOutcome> {
        let body = self.render_bulk_body(operations)?;
        debug!(
            "📡 Sending {} operations ({} bytes) to /_bulk",
            operations.len(),
            body.len()
        );

        let bulk_url = self.url_for(&["_bulk"])?;
        let mut request = self
            .authorize(self.client.post(bulk_url))
            .header("Content-Type", "application/x-ndjson");
        request = if self.sink_config.compress_requests {
            request
                .header("Content-Encoding", "gzip")
                .body(gzip(&body)?)
        } else {
            request.body(body)
        };

        let response = request
            .send()
            .await
            .context("💀 The bulk request never made it to Elasticsearch. Check connectivity, timeouts, and your feelings.")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("💀 The bulk response body evaporated mid-read.")?;
        if !status.is_success() {
            anyhow::bail!(
                "💀 The bulk request arrived, but Elasticsearch said '{}'. The body read: '{}'.",
                status,
                text
            );
        }

        let parsed: BulkResponse = serde_json::from_str(&text)
            .context("💀 /_bulk answered 2xx with something that isn't a bulk response.")?;
        trace!("🚀 Bulk request landed — took {}ms, errors={}", parsed.took, parsed.errors);
        Ok(BulkOutcome {
            took_ms: parsed.took,
            errors: parsed.errors,
            item_count: parsed.items.len(),
        })
    }

    async fn index(&mut self, id: &str, document: &SampleDocument) -> Result<()> {
        let doc_url = self.url_for(&[self.sink_config.index.as_str(), "_doc", id])?;
        let body = serde_json::to_string(document)
            .context("💀 A single document refused to serialize.")?;
        let response = self
            .authorize(self.client.put(doc_url))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .context("💀 The single-document write never made it to Elasticsearch.")?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("💀 Indexing '{}' failed with {}: '{}'", id, status, text);
        }
        trace!("📄 indexed {}", id);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        debug!("🗑️ Elasticsearch sink closing — no buffer to flush, just vibes to release");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Sample;
    use wiremock::matchers::{body_string_contains, header, method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> ElasticsearchSinkConfig {
        ElasticsearchSinkConfig {
            url: server.uri(),
            index: "samples".to_string(),
            username: Some("elastic".to_string()),
            password: Some("changeme".to_string()),
            api_key: None,
            recreate_index: true,
            compress_requests: false,
            timeout_secs: 5,
            common_config: CommonSinkConfig::default(),
        }
    }

    async fn healthy_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_cluster/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"green"}"#))
            .mount(&server)
            .await;
        server
    }

    fn operations() -> Result<Vec<BulkOperation>> {
        vec![
            Sample::new("abds-1", 1, "aaaa-bbbb", "alpha"),
            Sample::new("cdds-1", 1, "cccc-dddd", "beta"),
        ]
        .iter()
        .map(BulkOperation::from_sample)
        .collect()
    }

    #[tokio::test]
    async fn the_one_where_a_dead_cluster_fails_fast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_cluster/health"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        assert!(ElasticsearchSink::new(config_for(&server)).await.is_err());
    }

    #[tokio::test]
    async fn the_one_where_the_bulk_body_is_two_lines_per_doc() -> Result<()> {
        let server = healthy_server().await;
        let sink = ElasticsearchSink::new(config_for(&server)).await?;
        let ops = operations()?;

        let body = sink.render_bulk_body(&ops)?;
        assert!(body.ends_with('\n'));
        let lines: Vec<&str> = body.trim_end_matches('\n').split('\n').collect();
        assert_eq!(lines.len(), 4);

        let action: serde_json::Value = serde_json::from_str(lines[0])?;
        assert_eq!(action["index"]["_index"], "samples");
        assert_eq!(action["index"]["_id"], "abds-1|1|aaaa-bbbb");
        assert_eq!(lines[1], ops[0].source);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_bulk_reports_took_errors_and_items() -> Result<()> {
        let server = healthy_server().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .and(header("Content-Type", "application/x-ndjson"))
            .and(body_string_contains("abds-1|1|aaaa-bbbb"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"took":17,"errors":true,"items":[{"index":{"status":201}},{"index":{"status":400}}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let mut sink = ElasticsearchSink::new(config_for(&server)).await?;
        let outcome = sink.bulk(&operations()?).await?;
        assert_eq!(
            outcome,
            BulkOutcome {
                took_ms: 17,
                errors: true,
                item_count: 2
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_gzipped_bulk_says_so() -> Result<()> {
        let server = healthy_server().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .and(header("Content-Encoding", "gzip"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"took":1,"errors":false,"items":[]}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.compress_requests = true;
        let mut sink = ElasticsearchSink::new(config).await?;
        assert!(!sink.bulk(&operations()?).await?.errors);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_503_bulk_is_an_error() -> Result<()> {
        let server = healthy_server().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let mut sink = ElasticsearchSink::new(config_for(&server)).await?;
        assert!(sink.bulk(&operations()?).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_recreate_shrugs_off_a_missing_index() -> Result<()> {
        let server = healthy_server().await;
        Mock::given(method("DELETE"))
            .and(path("/samples"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/samples"))
            .and(body_string_contains("completion"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"acknowledged":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let mut sink = ElasticsearchSink::new(config_for(&server)).await?;
        sink.recreate_index().await
    }

    #[tokio::test]
    async fn the_one_where_a_single_write_lands_under_its_composite_id() -> Result<()> {
        let server = healthy_server().await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/samples/_doc/abds-1(\||%7C)1(\||%7C)aaaa-bbbb$"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let mut sink = ElasticsearchSink::new(config_for(&server)).await?;
        let sample = Sample::new("abds-1", 1, "aaaa-bbbb", "alpha");
        sink.index(&sample.composite_id(), &sample.document()).await
    }

    #[tokio::test]
    async fn the_one_where_segments_stay_segments() -> Result<()> {
        let server = healthy_server().await;
        let sink = ElasticsearchSink::new(config_for(&server)).await?;

        let url = sink.url_for(&["samples", "_doc", "a b/c"])?;
        assert_eq!(url.path(), "/samples/_doc/a%20b%2Fc");

        Mock::given(method("GET"))
            .and(path("/proxy/es/_cluster/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"green"}"#))
            .mount(&server)
            .await;
        let mut nested = config_for(&server);
        nested.url = format!("{}/proxy/es/", server.uri());
        let sink = ElasticsearchSink::new(nested).await?;
        assert_eq!(sink.url_for(&["_bulk"])?.path(), "/proxy/es/_bulk");
        Ok(())
    }

    #[test]
    fn the_one_where_the_mapping_scopes_completion_by_composite_id() {
        let mapping = index_mapping();
        let value = &mapping["mappings"]["properties"]["value"];
        assert_eq!(value["type"], "completion");
        assert_eq!(value["contexts"][0]["path"], "composite_id");
        assert_eq!(mapping["mappings"]["properties"]["copy_id"]["type"], "long");
    }
}
