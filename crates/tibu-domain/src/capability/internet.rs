use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Refusal to contact a host outside the declared whitelist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("domain not allowed: {host} ({url})")]
pub struct DomainNotAllowed {
    pub host: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    DomainNotAllowed(#[from] DomainNotAllowed),

    /// DNS, TLS, timeout, reset, local file errors.
    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("download too large: {size} bytes (max {max})")]
    FileTooLarge { size: u64, max: u64 },
}

/// Hosts a plugin may reach. An entry matches itself and its subdomains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainWhitelist {
    entries: Vec<String>,
}

impl DomainWhitelist {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|e| e.into().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn allows_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.entries.iter().any(|entry| {
            host == *entry
                || (host.len() > entry.len()
                    && host.ends_with(entry.as_str())
                    && host.as_bytes()[host.len() - entry.len() - 1] == b'.')
        })
    }

    /// Parses `url` and checks scheme and host. Pure: never touches the
    /// network, so a refusal always happens before any socket is opened.
    pub fn check(&self, url: &str) -> Result<Url, BridgeError> {
        let parsed = Url::parse(url).map_err(|_| BridgeError::InvalidUrl(url.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| BridgeError::InvalidUrl(url.to_string()))?
            .to_string();

        let scheme_ok = matches!(parsed.scheme(), "http" | "https");
        if !scheme_ok || !self.allows_host(&host) {
            return Err(DomainNotAllowed {
                host,
                url: url.to_string(),
            }
            .into());
        }
        Ok(parsed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn cookies(mut self, cookies: &BTreeMap<String, String>) -> Self {
        self.cookies
            .extend(cookies.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn json_body<T: Serialize>(self, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_string(value)?;
        Ok(self.header("Content-Type", "application/json").body(body))
    }

    /// `Cookie` header value, `None` when no cookie is set.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub code: u16,
    pub message: String,
    pub method: String,
    /// Redirect target. Redirects are never followed automatically.
    pub location: Option<String>,
    pub protocol: String,
    /// Response text, or the local file path for downloads.
    pub body: String,
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.code) && self.location.is_some()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Mediated network access. Every call is checked against the plugin's
/// whitelist before anything leaves the host.
#[async_trait]
pub trait InternetProvider: Send + Sync {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, BridgeError>;

    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, BridgeError>;

    /// Streams the body to a host-chosen temporary file whose path is
    /// returned in `body`.
    async fn download_file(
        &self,
        request: HttpRequest,
        expected_content_type: Option<String>,
    ) -> Result<HttpResponse, BridgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whitelist() -> DomainWhitelist {
        DomainWhitelist::new(["bank.example", ".Api.Other.test"])
    }

    #[test]
    fn test_exact_host_and_subdomain() {
        let wl = whitelist();
        assert!(wl.allows_host("bank.example"));
        assert!(wl.allows_host("www.bank.example"));
        assert!(wl.allows_host("api.other.test"));
        assert!(wl.allows_host("BANK.EXAMPLE"));
    }

    #[test]
    fn test_suffix_without_dot_boundary_is_refused() {
        let wl = whitelist();
        assert!(!wl.allows_host("evilbank.example"));
        assert!(!wl.allows_host("other.test"));
        assert!(!wl.allows_host("example"));
    }

    #[test]
    fn test_check_refuses_outside_host() {
        let err = whitelist().check("https://evil.example/login").unwrap_err();
        match err {
            BridgeError::DomainNotAllowed(refusal) => assert_eq!(refusal.host, "evil.example"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_check_refuses_non_http_scheme() {
        assert!(matches!(
            whitelist().check("ftp://bank.example/file"),
            Err(BridgeError::DomainNotAllowed(_))
        ));
    }

    #[test]
    fn test_check_invalid_url() {
        assert!(matches!(
            whitelist().check("not a url"),
            Err(BridgeError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_empty_whitelist_allows_nothing() {
        let wl = DomainWhitelist::default();
        assert!(wl.check("https://bank.example").is_err());
    }

    #[test]
    fn test_request_builder_and_cookie_header() {
        let request = HttpRequest::new("https://bank.example/api")
            .header("Accept", "application/json")
            .cookie("sid", "abc")
            .cookie("lang", "fr")
            .body("{}");
        assert_eq!(request.cookie_header().unwrap(), "lang=fr; sid=abc");
        assert_eq!(request.headers["Accept"], "application/json");
        assert_eq!(request.body.as_deref(), Some("{}"));
        assert!(HttpRequest::new("https://x").cookie_header().is_none());
    }

    #[test]
    fn test_response_helpers() {
        let mut response = HttpResponse {
            code: 302,
            location: Some("https://bank.example/next".into()),
            ..Default::default()
        };
        assert!(response.is_redirect());
        assert!(!response.is_success());

        response.code = 200;
        response.body = r#"{"ok":true}"#.into();
        response.headers.insert("Content-Type".into(), "application/json".into());
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(response.header("content-type"), Some("application/json"));
    }
}
