//! OpenID Connect / OAuth authorization-code flow driven by the host.
//!
//! The authorization URL is published on a channel; whoever holds the
//! receiver (CLI, UI) sends the user there and hands back the callback URI.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{info, warn};
use url::Url;

use tibu_domain::capability::{HttpRequest, InternetProvider, OpenIdAuthenticator};
use tibu_domain::plugin::CallbackParams;
use tibu_domain::CollectorError;

/// A published authorization URL waiting for its callback.
#[derive(Debug)]
pub struct AuthorizationPrompt {
    pub authorization_url: String,
    responder: oneshot::Sender<Option<String>>,
}

impl AuthorizationPrompt {
    pub fn complete(self, callback_uri: impl Into<String>) {
        let _ = self.responder.send(Some(callback_uri.into()));
    }

    pub fn cancel(self) {
        let _ = self.responder.send(None);
    }
}

pub struct CallbackOpenIdAuthenticator {
    internet: Arc<dyn InternetProvider>,
    prompts: mpsc::Sender<AuthorizationPrompt>,
    wait: Duration,
    configuration: Mutex<Option<Value>>,
    parameters: Mutex<BTreeMap<String, String>>,
}

fn config_str<'a>(configuration: &'a Value, key: &str) -> Option<&'a str> {
    configuration
        .get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
}

fn invalid_configuration(missing: &str) -> CollectorError {
    CollectorError::collect("openid.invalid_configuration", vec![Value::from(missing)])
}

/// Builds the authorization request URL for the code flow.
pub(crate) fn authorization_url(configuration: &Value, state: &str) -> Result<Url, CollectorError> {
    let endpoint = config_str(configuration, "authorization_endpoint")
        .ok_or_else(|| invalid_configuration("authorization_endpoint"))?;
    let client_id =
        config_str(configuration, "client_id").ok_or_else(|| invalid_configuration("client_id"))?;

    let mut url = Url::parse(endpoint).map_err(|_| invalid_configuration("authorization_endpoint"))?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", client_id);
        if let Some(redirect_uri) = config_str(configuration, "redirect_uri") {
            query.append_pair("redirect_uri", redirect_uri);
        }
        if let Some(scope) = config_str(configuration, "scope") {
            query.append_pair("scope", scope);
        }
        query.append_pair("state", state);
    }
    Ok(url)
}

fn flatten_token_response(body: &Value) -> BTreeMap<String, String> {
    let Some(object) = body.as_object() else {
        return BTreeMap::new();
    };
    object
        .iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k.clone(), s.clone())),
            Value::Number(n) => Some((k.clone(), n.to_string())),
            Value::Bool(b) => Some((k.clone(), b.to_string())),
            _ => None,
        })
        .collect()
}

impl CallbackOpenIdAuthenticator {
    pub fn new(
        internet: Arc<dyn InternetProvider>,
        prompts: mpsc::Sender<AuthorizationPrompt>,
        wait: Duration,
    ) -> Self {
        Self {
            internet,
            prompts,
            wait,
            configuration: Mutex::new(None),
            parameters: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn channel(
        internet: Arc<dyn InternetProvider>,
        wait: Duration,
    ) -> (Self, mpsc::Receiver<AuthorizationPrompt>) {
        let (tx, rx) = mpsc::channel(1);
        (Self::new(internet, tx, wait), rx)
    }

    async fn await_callback(&self, url: Url) -> Result<String, CollectorError> {
        let (responder, answer) = oneshot::channel();
        let prompt = AuthorizationPrompt {
            authorization_url: url.to_string(),
            responder,
        };
        if self.prompts.send(prompt).await.is_err() {
            warn!("Nobody is listening for authorization prompts");
            return Err(CollectorError::access_deny("openid.cancelled", vec![]));
        }

        match tokio::time::timeout(self.wait, answer).await {
            Ok(Ok(Some(uri))) => Ok(uri),
            Ok(Ok(None)) | Ok(Err(_)) => {
                Err(CollectorError::access_deny("openid.cancelled", vec![]))
            }
            Err(_) => {
                warn!(wait_secs = self.wait.as_secs(), "Authorization timed out");
                Err(CollectorError::access_deny("openid.timeout", vec![]))
            }
        }
    }

    async fn exchange_code(
        &self,
        configuration: &Value,
        token_endpoint: &str,
        code: &str,
    ) -> Result<BTreeMap<String, String>, CollectorError> {
        let form = {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            form.append_pair("grant_type", "authorization_code")
                .append_pair("code", code);
            for key in ["redirect_uri", "client_id", "client_secret"] {
                if let Some(value) = config_str(configuration, key) {
                    form.append_pair(key, value);
                }
            }
            form.finish()
        };

        let response = self
            .internet
            .post(
                HttpRequest::new(token_endpoint)
                    .header("Content-Type", "application/x-www-form-urlencoded")
                    .header("Accept", "application/json")
                    .body(form),
            )
            .await?;

        if !response.is_success() {
            warn!(status = response.code, "Token endpoint refused the code");
            return Err(CollectorError::access_deny(
                "openid.token_rejected",
                vec![Value::from(response.code)],
            ));
        }

        let body: Value = response
            .json()
            .map_err(|_| CollectorError::collect("openid.invalid_token_response", vec![]))?;
        Ok(flatten_token_response(&body))
    }
}

#[async_trait]
impl OpenIdAuthenticator for CallbackOpenIdAuthenticator {
    async fn set_configuration(&self, configuration: Value) {
        *self.configuration.lock().await = Some(configuration);
    }

    async fn configuration(&self) -> Option<Value> {
        self.configuration.lock().await.clone()
    }

    async fn authenticate(&self) -> Result<(), CollectorError> {
        let configuration = self
            .configuration()
            .await
            .ok_or_else(|| invalid_configuration("configuration"))?;

        let state = uuid::Uuid::new_v4().simple().to_string();
        let url = authorization_url(&configuration, &state)?;
        info!(host = url.host_str().unwrap_or_default(), "Starting authorization");

        let callback_uri = self.await_callback(url).await?;
        let params = CallbackParams::parse(&callback_uri).map_err(|e| match e {
            // the user or provider said no
            CollectorError::Parameter { messages, .. } => CollectorError::AccessDeny(messages),
            other => other,
        })?;
        params
            .verify_state(&state)
            .map_err(|e| CollectorError::AccessDeny(e.messages()))?;

        let mut parameters = BTreeMap::new();
        parameters.insert("state".to_string(), state);
        if let Some(token) = params.access_token {
            parameters.insert("access_token".to_string(), token);
        }
        if let Some(code) = params.code {
            if let Some(token_endpoint) = config_str(&configuration, "token_endpoint") {
                parameters.extend(self.exchange_code(&configuration, token_endpoint, &code).await?);
            }
            parameters.insert("code".to_string(), code);
        }

        info!(parameters = parameters.len(), "Authorization completed");
        *self.parameters.lock().await = parameters;
        Ok(())
    }

    async fn parameter(&self, key: &str) -> Option<String> {
        self.parameters.lock().await.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use serde_json::json;
    use tibu_domain::capability::{BridgeError, HttpResponse};
    use tibu_domain::ErrorKind;

    mock! {
        Internet {}

        #[async_trait]
        impl InternetProvider for Internet {
            async fn get(&self, request: HttpRequest) -> Result<HttpResponse, BridgeError>;
            async fn post(&self, request: HttpRequest) -> Result<HttpResponse, BridgeError>;
            async fn download_file(
                &self,
                request: HttpRequest,
                expected_content_type: Option<String>,
            ) -> Result<HttpResponse, BridgeError>;
        }
    }

    fn configuration() -> Value {
        json!({
            "authorization_endpoint": "https://auth.bank.example/authorize",
            "token_endpoint": "https://auth.bank.example/token",
            "client_id": "tibu",
            "redirect_uri": "tibu://callback",
            "scope": "accounts transactions"
        })
    }

    fn state_of(url: &str) -> String {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[test]
    fn test_authorization_url() {
        let url = authorization_url(&configuration(), "s1").unwrap();
        let pairs: BTreeMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "tibu");
        assert_eq!(pairs["redirect_uri"], "tibu://callback");
        assert_eq!(pairs["scope"], "accounts transactions");
        assert_eq!(pairs["state"], "s1");
    }

    #[test]
    fn test_authorization_url_requires_client_id() {
        let err = authorization_url(&json!({"authorization_endpoint": "https://a.example"}), "s")
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Collect));
    }

    #[tokio::test]
    async fn test_code_exchanged_for_token() {
        let mut internet = MockInternet::new();
        internet
            .expect_post()
            .withf(|r| {
                r.url == "https://auth.bank.example/token"
                    && r.body.as_deref().is_some_and(|b| b.contains("code=abc"))
            })
            .times(1)
            .returning(|_| {
                Ok(HttpResponse {
                    code: 200,
                    body: r#"{"access_token":"tok","expires_in":3600,"token_type":"Bearer"}"#.into(),
                    ..Default::default()
                })
            });

        let (auth, mut prompts) =
            CallbackOpenIdAuthenticator::channel(Arc::new(internet), Duration::from_secs(5));
        auth.set_configuration(configuration()).await;

        tokio::spawn(async move {
            let prompt = prompts.recv().await.unwrap();
            let state = state_of(&prompt.authorization_url);
            prompt.complete(format!("tibu://callback?code=abc&state={}", state));
        });

        auth.authenticate().await.unwrap();
        assert_eq!(auth.parameter("code").await.as_deref(), Some("abc"));
        assert_eq!(auth.parameter("access_token").await.as_deref(), Some("tok"));
        assert_eq!(auth.parameter("expires_in").await.as_deref(), Some("3600"));
    }

    #[tokio::test]
    async fn test_authenticate_on_worker_task() {
        let mut internet = MockInternet::new();
        internet
            .expect_post()
            .withf(|r| {
                r.body.as_deref().is_some_and(|b| {
                    b.contains("grant_type=authorization_code")
                        && b.contains("client_id=tibu")
                        && b.contains("redirect_uri=tibu%3A%2F%2Fcallback")
                })
            })
            .times(1)
            .returning(|_| {
                Ok(HttpResponse {
                    code: 200,
                    body: r#"{"access_token":"tok"}"#.into(),
                    ..Default::default()
                })
            });

        let (auth, mut prompts) =
            CallbackOpenIdAuthenticator::channel(Arc::new(internet), Duration::from_secs(5));
        auth.set_configuration(configuration()).await;
        let auth = Arc::new(auth);

        let worker = {
            let auth = auth.clone();
            tokio::spawn(async move { auth.authenticate().await })
        };
        let prompt = prompts.recv().await.unwrap();
        let state = state_of(&prompt.authorization_url);
        prompt.complete(format!("tibu://callback?code=xyz&state={}", state));

        worker.await.unwrap().unwrap();
        assert_eq!(auth.parameter("access_token").await.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_state_mismatch_is_denied() {
        let (auth, mut prompts) = CallbackOpenIdAuthenticator::channel(
            Arc::new(MockInternet::new()),
            Duration::from_secs(5),
        );
        auth.set_configuration(configuration()).await;

        tokio::spawn(async move {
            prompts
                .recv()
                .await
                .unwrap()
                .complete("tibu://callback?code=abc&state=forged");
        });

        let err = auth.authenticate().await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::AccessDeny));
        assert!(auth.parameter("code").await.is_none());
    }

    #[tokio::test]
    async fn test_provider_error_is_denied() {
        let (auth, mut prompts) = CallbackOpenIdAuthenticator::channel(
            Arc::new(MockInternet::new()),
            Duration::from_secs(5),
        );
        auth.set_configuration(configuration()).await;

        tokio::spawn(async move {
            prompts
                .recv()
                .await
                .unwrap()
                .complete("tibu://callback?error=access_denied");
        });

        let err = auth.authenticate().await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::AccessDeny));
        assert!(err.messages().has_key("callback.provider_error"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let (auth, mut prompts) = CallbackOpenIdAuthenticator::channel(
            Arc::new(MockInternet::new()),
            Duration::from_secs(600),
        );
        auth.set_configuration(configuration()).await;
        let holder = tokio::spawn(async move {
            let prompt = prompts.recv().await;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            drop(prompt);
        });

        let err = auth.authenticate().await.unwrap_err();
        assert!(err.messages().has_key("openid.timeout"));
        holder.abort();
    }
}
