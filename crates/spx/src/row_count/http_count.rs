use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::trace;

use super::RowCountOracle;

/// 📡 Where and how to ask for a count.
///
/// `endpoint_template` gets `{domain}` and `{dataset_uid}` substituted. The default
/// points at a SODA-style `count(*)` query. Credentials are sent verbatim: the
/// `basic_credential` is already base64, we just prepend `Basic `.
#[derive(Debug, Deserialize, Clone)]
pub struct HttpRowCountConfig {
    #[serde(default = "default_endpoint_template")]
    pub endpoint_template: String,
    /// 🚇 e.g. `http://proxy.internal:3128`. `None` = talk to the endpoint directly.
    #[serde(default)]
    pub proxy: Option<String>,
    /// 🔒 pre-encoded `user:password`, base64. The header is `Basic <this>`.
    #[serde(default)]
    pub basic_credential: Option<String>,
    /// 🔒 sent as `X-App-Token`
    #[serde(default)]
    pub app_token: Option<String>,
    /// ⚠️ skip TLS verification. Staging proxies with self-signed certs, we see you.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint_template() -> String {
    "https://{domain}/resource/{dataset_uid}.json?$select=count(*)".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for HttpRowCountConfig {
    fn default() -> Self {
        Self {
            endpoint_template: default_endpoint_template(),
            proxy: None,
            basic_credential: None,
            app_token: None,
            accept_invalid_certs: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HttpRowCountConfig {
    /// 🔗 Fill in the blanks. Mad Libs, but for URLs.
    pub fn count_url(&self, domain: &str, dataset_uid: &str) -> String {
        self.endpoint_template
            .replace("{domain}", domain)
            .replace("{dataset_uid}", dataset_uid)
    }
}

/// 🔮 The HTTP flavor of the oracle. One reusable client, one GET per dataset.
#[derive(Debug)]
pub struct HttpRowCountOracle {
    client: reqwest::Client,
    config: HttpRowCountConfig,
}

impl HttpRowCountOracle {
    pub fn new(config: HttpRowCountConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs);

        if let Some(ref proxy_url) = config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url).context(format!(
                "💀 The proxy URL '{}' is not a URL. It's a cry for help with a port number.",
                proxy_url
            ))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .context("💀 The row-count HTTP client refused to be born. The TLS stack wept.")?;
        Ok(Self { client, config })
    }
}

/// 🧮 Pull `count` out of `[{"count": "123"}]`. Socrata sends strings; we also take numbers,
/// because someone, someday, will send a number.
fn parse_count(body: &str) -> Result<u64> {
    let payload: serde_json::Value = serde_json::from_str(body)
        .context("💀 The count endpoint answered, but not in JSON. Poetry, maybe. Not JSON.")?;
    let count = payload
        .get(0)
        .and_then(|first| first.get("count"))
        .context("💀 The count payload has no `[0].count`. The shape is wrong. The vibes are wrong.")?;

    match count {
        serde_json::Value::String(text) => text
            .trim()
            .parse::<u64>()
            .context(format!("💀 count '{}' is not a non-negative integer", text)),
        serde_json::Value::Number(number) => number
            .as_u64()
            .context(format!("💀 count {} is not a non-negative integer", number)),
        other => anyhow::bail!("💀 count came back as {}, which is not a count", other),
    }
}

#[async_trait]
impl RowCountOracle for HttpRowCountOracle {
    async fn count(&self, domain: &str, dataset_uid: &str) -> Result<u64> {
        let url = self.config.count_url(domain, dataset_uid);
        trace!("📡 asking {} how many rows it has", url);

        let mut request = self.client.get(&url);
        if let Some(ref credential) = self.config.basic_credential {
            request = request.header("Authorization", format!("Basic {}", credential));
        }
        if let Some(ref token) = self.config.app_token {
            request = request.header("X-App-Token", token);
        }

        let response = request.send().await.context(format!(
            "💀 The count request to '{}' never came back. The proxy, the DNS, or the cosmos said no.",
            url
        ))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!(
                "💀 The count endpoint '{}' answered with {}. Not the answer we wanted.",
                url,
                status
            );
        }

        let body = response
            .text()
            .await
            .context("💀 Got a 2xx, then the body evaporated mid-read.")?;
        parse_count(&body).context(format!("💀 Could not read a row count from '{}'", url))
    }
}
