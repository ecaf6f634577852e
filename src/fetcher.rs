//! Sources of new candidate proxies.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::header::USER_AGENT;
use reqwest::Client;
use url::Url;

use crate::config::KeeperConfig;
use crate::error::{Error, Result};
use crate::utils;

/// Query sent to the proxyscrape listing API.
const QUERY: &[(&str, &str)] = &[
    ("request", "getproxies"),
    ("proxytype", "http"),
    ("timeout", "3000"),
    ("country", "all"),
    ("ssl", "all"),
    ("anonymity", "all"),
];

/// Supplies batches of `host:port` addresses that have not been checked yet.
#[async_trait]
pub trait ProxySource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<String>>;
}

/// Client of the proxyscrape.com listing API.
#[derive(Debug, Clone)]
pub struct ProxyScrape {
    client: Client,
    endpoint: String,
}

impl ProxyScrape {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint))
    }

    /// Use a preconfigured client, e.g. one routed through an egress proxy.
    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(config: &KeeperConfig) -> Result<Self> {
        Self::new(config.provider_url.clone(), config.provider_timeout)
    }

    fn request_url(&self) -> Result<Url> {
        Ok(Url::parse_with_params(&self.endpoint, QUERY)?)
    }
}

#[async_trait]
impl ProxySource for ProxyScrape {
    async fn fetch(&self) -> Result<Vec<String>> {
        let url = self.request_url()?;
        info!("Running fetch new proxies from {}", url);

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, utils::random_user_agent())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Provider { status });
        }

        let content = response.text().await?;
        let proxies = utils::parse_proxy_list(&content);
        debug!("Provider returned {} entries", proxies.len());
        Ok(proxies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    fn direct(endpoint: String, timeout: Duration) -> ProxyScrape {
        let client = Client::builder().no_proxy().timeout(timeout).build().unwrap();
        ProxyScrape::with_client(client, endpoint)
    }

    /// Serves one response and hands back the raw request it received.
    async fn one_shot_server(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&buf[..n]).to_string());
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        (endpoint, rx)
    }

    #[test]
    fn request_url_carries_the_fixed_query() {
        let source = ProxyScrape::new("https://api.proxyscrape.com/", Duration::from_secs(1)).unwrap();
        let url = source.request_url().unwrap();

        assert_eq!(
            url.query(),
            Some("request=getproxies&proxytype=http&timeout=3000&country=all&ssl=all&anonymity=all")
        );
    }

    #[test]
    fn bad_endpoint_is_an_error() {
        let source = ProxyScrape::new("not a url", Duration::from_secs(1)).unwrap();
        assert!(matches!(source.request_url(), Err(Error::Url(_))));
    }

    #[tokio::test]
    async fn fetch_parses_the_listing() {
        let (endpoint, request) =
            one_shot_server("200 OK", "1.1.1.1:80\r\n2.2.2.2:8080\r\n\r\n 3.3.3.3:3128 \r\n").await;
        let source = direct(endpoint, Duration::from_secs(5));

        let proxies = source.fetch().await.unwrap();

        assert_eq!(proxies, vec!["1.1.1.1:80", "2.2.2.2:8080", "3.3.3.3:3128"]);
        let request = request.await.unwrap().to_lowercase();
        assert!(request.contains("proxytype=http"));
        assert!(request.contains("user-agent: mozilla/5.0"));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let (endpoint, _request) = one_shot_server("503 Service Unavailable", "").await;
        let source = direct(endpoint, Duration::from_secs(5));

        let err = source.fetch().await.unwrap_err();

        assert!(matches!(err, Error::Provider { status } if status.as_u16() == 503));
    }

    #[tokio::test]
    async fn unreachable_provider_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);
        let source = direct(endpoint, Duration::from_secs(2));

        assert!(matches!(source.fetch().await, Err(Error::Http(_))));
    }
}
