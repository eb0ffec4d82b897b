//! Confirms with the provider that a caller address belongs to it.

use std::net::SocketAddr;

use anyhow::Result;
use axum::http::HeaderMap;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::settings::SiteSettings;

/// Header consulted when the transport gives no peer address. Client
/// controlled, so spoofable; see DESIGN.md.
pub const FALLBACK_IP_HEADER: &str = "x-real-ip";

const AUTHENTICATE_PATH: &str = "plugins/Api/AuthenticateIP";

#[derive(Clone)]
pub struct IpAuthenticator {
    client: reqwest::Client,
    endpoint: Url,
}

impl IpAuthenticator {
    pub fn new(client: reqwest::Client, settings: &SiteSettings) -> Result<Self> {
        Ok(Self {
            client,
            endpoint: settings.provider_endpoint(AUTHENTICATE_PATH)?,
        })
    }

    /// GET `{server}/plugins/Api/AuthenticateIP?ip={ip}` and accept only a
    /// 200 whose JSON body has `result == 1`. Everything else, including a
    /// timeout, is a rejection.
    pub async fn authenticate(&self, ip: &str) -> bool {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("ip", ip);

        let resp = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(ip, error = %e, "AuthenticateIP call failed");
                return false;
            }
        };
        if resp.status() != reqwest::StatusCode::OK {
            warn!(ip, status = %resp.status(), "AuthenticateIP returned non-200");
            return false;
        }
        let body: Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                warn!(ip, error = %e, "AuthenticateIP body is not json");
                return false;
            }
        };

        let ok = is_one(body.get("result"));
        debug!(ip, ok, "AuthenticateIP answered");
        ok
    }
}

fn is_one(result: Option<&Value>) -> bool {
    match result {
        Some(Value::Number(n)) => n.as_f64() == Some(1.0),
        Some(Value::String(s)) => s.trim() == "1",
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

/// Address to present to the provider: the transport peer, or the fallback
/// header when the peer is unknown. Passed on as an opaque string.
pub fn caller_ip(peer: Option<SocketAddr>, headers: &HeaderMap) -> String {
    if let Some(addr) = peer {
        return addr.ip().to_string();
    }
    headers
        .get(FALLBACK_IP_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(sanitize)
        .unwrap_or_default()
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() && !c.is_whitespace() && *c != '<' && *c != '>')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn authenticator_answering(resp: ResponseTemplate) -> (MockServer, IpAuthenticator) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/plugins/Api/AuthenticateIP"))
            .and(query_param("ip", "203.0.113.9"))
            .respond_with(resp)
            .mount(&server)
            .await;
        let settings = SiteSettings::new("https://blog.example.com/", &server.uri()).unwrap();
        let auth = IpAuthenticator::new(crate::provider::http_client().unwrap(), &settings).unwrap();
        (server, auth)
    }

    #[tokio::test]
    async fn result_one_authenticates() {
        let (_server, auth) =
            authenticator_answering(ResponseTemplate::new(200).set_body_json(json!({"result": 1})))
                .await;
        assert!(auth.authenticate("203.0.113.9").await);
    }

    #[tokio::test]
    async fn result_zero_is_rejected() {
        let (_server, auth) =
            authenticator_answering(ResponseTemplate::new(200).set_body_json(json!({"result": 0})))
                .await;
        assert!(!auth.authenticate("203.0.113.9").await);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let (_server, auth) =
            authenticator_answering(ResponseTemplate::new(200).set_body_string("result=1")).await;
        assert!(!auth.authenticate("203.0.113.9").await);
    }

    #[tokio::test]
    async fn non_200_is_rejected() {
        let (_server, auth) = authenticator_answering(
            ResponseTemplate::new(503).set_body_json(json!({"result": 1})),
        )
        .await;
        assert!(!auth.authenticate("203.0.113.9").await);
    }

    #[tokio::test]
    async fn unmatched_ip_is_rejected() {
        let (_server, auth) =
            authenticator_answering(ResponseTemplate::new(200).set_body_json(json!({"result": 1})))
                .await;
        assert!(!auth.authenticate("198.51.100.1").await);
    }

    #[tokio::test]
    async fn slow_provider_fails_closed() {
        let (_server, auth) = authenticator_answering(
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": 1}))
                .set_delay(crate::provider::PROVIDER_TIMEOUT + std::time::Duration::from_secs(2)),
        )
        .await;
        assert!(!auth.authenticate("203.0.113.9").await);
    }

    #[tokio::test]
    async fn unreachable_provider_fails_closed() {
        let uri = {
            let server = MockServer::start().await;
            server.uri()
        };
        // The mock server is gone; its port refuses connections.
        let settings = SiteSettings::new("https://blog.example.com/", &uri).unwrap();
        let auth = IpAuthenticator::new(crate::provider::http_client().unwrap(), &settings).unwrap();
        assert!(!auth.authenticate("203.0.113.9").await);
    }

    #[test]
    fn peer_address_wins_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(FALLBACK_IP_HEADER, HeaderValue::from_static("198.51.100.7"));
        let peer: SocketAddr = "203.0.113.9:41000".parse().unwrap();
        assert_eq!(caller_ip(Some(peer), &headers), "203.0.113.9");
        assert_eq!(caller_ip(None, &headers), "198.51.100.7");
        assert_eq!(caller_ip(None, &HeaderMap::new()), "");
    }

    #[test]
    fn fallback_header_is_sanitized() {
        let mut headers = HeaderMap::new();
        headers.insert(FALLBACK_IP_HEADER, HeaderValue::from_static(" 10.0.0.1 <b>"));
        assert_eq!(caller_ip(None, &headers), "10.0.0.1b");
    }
}
