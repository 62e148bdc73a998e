//! reqwest-backed transport for a live cluster.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{ApiRequest, ClientError, Transport};

/// Connection settings for `HttpTransport`.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub fqdn: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Accept self-signed or otherwise invalid cluster certificates.
    pub insecure: bool,
    pub timeout: Duration,
}

/// Transport that issues HTTPS GETs with basic auth against `https://fqdn:port`.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(Self {
            client,
            base_url: format!("https://{}:{}", config.fqdn, config.port),
            username: config.username,
            password: config.password,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: &ApiRequest) -> Result<Value, ClientError> {
        let url = format!("{}{}", self.base_url, request.path());
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .query(request.params())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                path: request.path().to_string(),
                body: body.chars().take(256).collect(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ClientError::decode(request.path(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        let transport = HttpTransport::new(HttpTransportConfig {
            fqdn: "isilon.example.com".into(),
            port: 8080,
            username: "monitor".into(),
            password: "secret".into(),
            insecure: true,
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        assert_eq!(transport.base_url(), "https://isilon.example.com:8080");
    }
}
