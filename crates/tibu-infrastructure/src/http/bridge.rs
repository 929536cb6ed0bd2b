use async_trait::async_trait;
use reqwest::header::{self, HeaderName, HeaderValue};
use reqwest::{redirect, Client, Method, Proxy, Response};
use std::io::Write;
use std::time::Instant;
use tracing::{debug, info, warn};

use tibu_domain::capability::{
    BridgeError, DomainWhitelist, HttpRequest, HttpResponse, InternetProvider,
};
use tibu_domain::model::MAX_FILE_SIZE;

use super::cookies::{flatten_headers, response_cookies};
use crate::config::TimeoutConfig;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";

/// Network bridge backed by reqwest.
///
/// Cookies travel in an explicit `Cookie` header and come back parsed from
/// `Set-Cookie`; the client keeps no cookie store and follows no redirect.
pub struct ReqwestInternetProvider {
    client: Client,
    whitelist: DomainWhitelist,
    max_download: u64,
}

impl ReqwestInternetProvider {
    pub fn new(
        whitelist: DomainWhitelist,
        timeouts: &TimeoutConfig,
        proxy_url: Option<&str>,
    ) -> Result<Self, BridgeError> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::none())
            .timeout(timeouts.http_request);

        if let Some(proxy_url) = proxy_url {
            let proxy = Proxy::all(proxy_url)
                .map_err(|_| BridgeError::InvalidUrl(proxy_url.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| BridgeError::Io(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            whitelist,
            max_download: MAX_FILE_SIZE,
        })
    }

    /// Lowers the download cap, mostly for tests.
    pub fn with_max_download(mut self, max: u64) -> Self {
        self.max_download = max;
        self
    }

    pub fn whitelist(&self) -> &DomainWhitelist {
        &self.whitelist
    }

    async fn send(&self, method: Method, request: &HttpRequest) -> Result<Response, BridgeError> {
        // Refusal happens here, before reqwest is involved at all
        let url = self.whitelist.check(&request.url)?;
        let host = url.host_str().unwrap_or_default().to_string();

        let mut builder = self.client.request(method.clone(), url);
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| BridgeError::InvalidUrl(format!("bad header name {}", name)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| BridgeError::InvalidUrl(format!("bad header value for {}", name)))?;
            builder = builder.header(name, value);
        }
        if let Some(cookie) = request.cookie_header() {
            builder = builder.header(header::COOKIE, cookie);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let started = Instant::now();
        let result = builder.send().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(response) => {
                info!(
                    method = %method,
                    host = %host,
                    status = response.status().as_u16(),
                    elapsed_ms,
                    "HTTP request"
                );
                Ok(response)
            }
            Err(e) => {
                warn!(method = %method, host = %host, elapsed_ms, error = %e, "HTTP request failed");
                Err(BridgeError::Io(e.to_string()))
            }
        }
    }

    fn describe(method: &Method, response: &Response) -> HttpResponse {
        let status = response.status();
        HttpResponse {
            code: status.as_u16(),
            message: status.canonical_reason().unwrap_or_default().to_string(),
            method: method.to_string(),
            location: response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            protocol: format!("{:?}", response.version()),
            body: String::new(),
            headers: flatten_headers(response.headers()),
            cookies: response_cookies(response.headers()),
        }
    }

    async fn execute(&self, method: Method, request: HttpRequest) -> Result<HttpResponse, BridgeError> {
        let response = self.send(method.clone(), &request).await?;
        let mut described = Self::describe(&method, &response);
        described.body = response
            .text()
            .await
            .map_err(|e| BridgeError::Io(e.to_string()))?;
        Ok(described)
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type.split(';').next().unwrap_or_default().trim() {
        "application/pdf" => ".pdf",
        "image/png" => ".png",
        "image/jpeg" => ".jpg",
        "image/webp" => ".webp",
        "image/avif" => ".avif",
        "image/svg+xml" => ".svg",
        "text/plain" => ".txt",
        "application/zip" => ".zip",
        _ => ".bin",
    }
}

#[async_trait]
impl InternetProvider for ReqwestInternetProvider {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, BridgeError> {
        self.execute(Method::GET, request).await
    }

    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, BridgeError> {
        self.execute(Method::POST, request).await
    }

    async fn download_file(
        &self,
        request: HttpRequest,
        expected_content_type: Option<String>,
    ) -> Result<HttpResponse, BridgeError> {
        let mut response = self.send(Method::GET, &request).await?;
        let mut described = Self::describe(&Method::GET, &response);

        if let Some(length) = response.content_length() {
            if length > self.max_download {
                return Err(BridgeError::FileTooLarge {
                    size: length,
                    max: self.max_download,
                });
            }
        }

        let actual_type = described.header("content-type").unwrap_or_default().to_string();
        if let Some(expected) = &expected_content_type {
            if !actual_type.starts_with(expected.as_str()) {
                warn!(expected = %expected, actual = %actual_type, "Unexpected download content type");
            }
        }
        let suffix = extension_for(expected_content_type.as_deref().unwrap_or(&actual_type));

        // Dropped (and removed) on every early return below
        let mut file = tempfile::Builder::new()
            .prefix("tibu-download-")
            .suffix(suffix)
            .tempfile()
            .map_err(|e| BridgeError::Io(e.to_string()))?;

        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| BridgeError::Io(e.to_string()))?
        {
            written += chunk.len() as u64;
            if written > self.max_download {
                warn!(size = written, max = self.max_download, "Download aborted, too large");
                return Err(BridgeError::FileTooLarge {
                    size: written,
                    max: self.max_download,
                });
            }
            file.write_all(&chunk)
                .map_err(|e| BridgeError::Io(e.to_string()))?;
        }

        let (_, path) = file.keep().map_err(|e| BridgeError::Io(e.to_string()))?;
        debug!(path = %path.display(), size = written, "Download stored");
        described.body = path.to_string_lossy().to_string();
        Ok(described)
    }
}
