use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;
use uuid::Uuid;

use tibu_domain::capability::counterparty::MetadataKeyError;
use tibu_domain::capability::{
    BridgeError, CounterpartyProvider, DomainWhitelist, HttpRequest, HttpResponse,
    InternetProvider, OtpProvider, OtpRequest, PdfToolsProvider, ProviderSet,
};
use tibu_domain::plugin::Capabilities;
use tibu_domain::repository::ConnectionStateRepository;
use tibu_domain::{CollectorError, ConnectionKey, ErrorKind, PluginId, PluginManifest};
use tibu_host::plugins::{self, json_bank};
use tibu_host::{
    CollectionDriver, HostError, PluginRegistry, ProviderFactory, RunOutcome, RunReport,
    RunRequest,
};
use tibu_infrastructure::config::{RetryConfig, TimeoutConfig};
use tibu_infrastructure::persistence::JsonFileStateRepository;

const PASSWORD: &str = "secret";
const OTP_CODE: &str = "123456";
const DEVICE_TOKEN: &str = "device-1";

#[derive(Debug, Clone)]
struct Logged {
    method: &'static str,
    url: Url,
    authorization: Option<String>,
    cookies: BTreeMap<String, String>,
}

/// In-process JSON bank speaking the API the plugin expects.
#[derive(Default)]
struct FakeBank {
    require_otp: bool,
    session: Mutex<String>,
    sessions_issued: AtomicUsize,
    /// Per account, oldest first.
    transactions: Mutex<BTreeMap<String, Vec<Value>>>,
    unavailable_left: AtomicUsize,
    log: Mutex<Vec<Logged>>,
}

fn reply(code: u16, body: Value) -> HttpResponse {
    HttpResponse {
        code,
        message: String::new(),
        body: body.to_string(),
        protocol: "HTTP/1.1".into(),
        ..HttpResponse::default()
    }
}

impl FakeBank {
    fn new(require_otp: bool) -> Arc<Self> {
        let bank = Self {
            require_otp,
            ..Self::default()
        };
        bank.transactions.lock().unwrap().insert(
            "A1".into(),
            vec![transaction("T1", -12.5, "CB BOULANGERIE"), transaction("T2", 1500.0, "SALAIRE")],
        );
        Arc::new(bank)
    }

    fn add_transaction(&self, account: &str, value: Value) {
        self.transactions
            .lock()
            .unwrap()
            .entry(account.into())
            .or_default()
            .push(value);
    }

    fn expire_session(&self) {
        *self.session.lock().unwrap() = "expired".into();
    }

    fn requests(&self) -> Vec<Logged> {
        self.log.lock().unwrap().clone()
    }

    fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.url.path() == path)
            .count()
    }

    fn issue_session(&self) -> String {
        let n = self.sessions_issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("tok-{}", n);
        *self.session.lock().unwrap() = token.clone();
        token
    }

    fn authorized(&self, request: &HttpRequest) -> bool {
        let expected = format!("Bearer {}", self.session.lock().unwrap());
        request.headers.get("Authorization") == Some(&expected)
    }

    fn handle(&self, method: &'static str, request: &HttpRequest) -> HttpResponse {
        let url = Url::parse(&request.url).unwrap();
        self.log.lock().unwrap().push(Logged {
            method,
            url: url.clone(),
            authorization: request.headers.get("Authorization").cloned(),
            cookies: request.cookies.clone(),
        });

        let body: Value = request
            .body
            .as_deref()
            .map(|b| serde_json::from_str(b).unwrap())
            .unwrap_or(Value::Null);

        match (method, url.path()) {
            ("POST", "/api/session") => {
                if body["password"] != PASSWORD {
                    return reply(401, json!({"error": "bad credentials"}));
                }
                let trusted = body["device_token"] == DEVICE_TOKEN;
                let mut response = if self.require_otp && !trusted {
                    *self.session.lock().unwrap() = "pending".into();
                    reply(
                        200,
                        json!({"token": "pending", "otp": {"channel": "SMS", "destination": "+33 6** ** ** 12"}}),
                    )
                } else {
                    reply(200, json!({"token": self.issue_session()}))
                };
                response.cookies.insert("bank_sid".into(), "s-1".into());
                response
            }
            ("POST", "/api/session/otp") => {
                if !self.authorized(request) || body["code"] != OTP_CODE {
                    return reply(401, json!({"error": "bad code"}));
                }
                reply(
                    200,
                    json!({"token": self.issue_session(), "device_token": DEVICE_TOKEN}),
                )
            }
            ("POST", "/oauth/token") => {
                if body["code"] != "abc" {
                    return reply(400, json!({"error": "invalid_grant"}));
                }
                reply(200, json!({"token": self.issue_session(), "holder": "Alice"}))
            }
            ("GET", "/api/accounts") => {
                if self
                    .unavailable_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
                {
                    return reply(503, json!({"error": "maintenance"}));
                }
                if !self.authorized(request) {
                    return reply(401, json!({"error": "session expired"}));
                }
                reply(
                    200,
                    json!({"accounts": [{"id": "A1", "name": "CHECKING 001", "kind": "checking", "balance": 1487.5, "updated_at": "2024-03-01T09:00:00Z"}]}),
                )
            }
            ("GET", "/api/accounts/A1/transactions") => {
                if !self.authorized(request) {
                    return reply(401, json!({"error": "session expired"}));
                }
                let after = url
                    .query_pairs()
                    .find(|(k, _)| k == "after")
                    .map(|(_, v)| v.into_owned());
                let all = self.transactions.lock().unwrap().get("A1").cloned().unwrap_or_default();
                let start = after
                    .and_then(|id| all.iter().position(|t| t["id"] == id.as_str()))
                    .map(|i| i + 1)
                    .unwrap_or(0);
                reply(200, json!({"transactions": all[start..].to_vec()}))
            }
            _ => reply(404, json!({"error": "not found"})),
        }
    }
}

fn transaction(id: &str, amount: f64, label: &str) -> Value {
    json!({
        "id": id,
        "date": "2024-03-01T10:00:00Z",
        "amount": amount,
        "currency": "EUR",
        "label": label,
    })
}

/// Network bridge over the fake bank, enforcing the whitelist first.
struct BankInternet {
    bank: Arc<FakeBank>,
    whitelist: DomainWhitelist,
}

#[async_trait]
impl InternetProvider for BankInternet {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, BridgeError> {
        self.whitelist.check(&request.url)?;
        Ok(self.bank.handle("GET", &request))
    }

    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, BridgeError> {
        self.whitelist.check(&request.url)?;
        Ok(self.bank.handle("POST", &request))
    }

    async fn download_file(
        &self,
        request: HttpRequest,
        _expected_content_type: Option<String>,
    ) -> Result<HttpResponse, BridgeError> {
        self.whitelist.check(&request.url)?;
        Err(BridgeError::Io("downloads not scripted".into()))
    }
}

/// Types the right code and counts how often it was asked.
#[derive(Default)]
struct TypingUser {
    asked: AtomicUsize,
}

#[async_trait]
impl OtpProvider for TypingUser {
    async fn request_code(&self, request: &OtpRequest) -> Result<String, CollectorError> {
        assert_eq!(request.destination.as_deref(), Some("+33 6** ** ** 12"));
        self.asked.fetch_add(1, Ordering::SeqCst);
        Ok(format!(" {} ", OTP_CODE))
    }
}

struct NoDirectory;

#[async_trait]
impl CounterpartyProvider for NoDirectory {
    async fn search(&self, _query: &str) -> Option<Uuid> {
        None
    }

    async fn find(&self, _key: &str, _value: &str) -> Result<Option<Uuid>, MetadataKeyError> {
        Ok(None)
    }

    async fn find_numeric(&self, _key: &str, _value: f64) -> Result<Option<Uuid>, MetadataKeyError> {
        Ok(None)
    }
}

#[async_trait]
impl PdfToolsProvider for NoDirectory {
    async fn extract_text(&self, _path: &Path) -> std::io::Result<String> {
        Ok(String::new())
    }
}

struct BankProviders {
    bank: Arc<FakeBank>,
    user: Arc<TypingUser>,
}

impl ProviderFactory for BankProviders {
    fn build(
        &self,
        manifest: &PluginManifest,
        _capabilities: Capabilities,
    ) -> Result<ProviderSet, HostError> {
        Ok(ProviderSet {
            internet: Arc::new(BankInternet {
                bank: self.bank.clone(),
                whitelist: manifest.allowed_domains.clone(),
            }),
            counterparty: Arc::new(NoDirectory),
            otp: self.user.clone(),
            pdf_tools: Arc::new(NoDirectory),
            open_id: None,
            human_simulator: None,
        })
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    bank: Arc<FakeBank>,
    user: Arc<TypingUser>,
    repository: Arc<JsonFileStateRepository>,
    driver: CollectionDriver,
}

fn harness(bank: Arc<FakeBank>) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let repository = Arc::new(JsonFileStateRepository::new(dir.path()));
    let user = Arc::new(TypingUser::default());

    let mut registry = PluginRegistry::new();
    plugins::register_builtin(&mut registry).expect("register");

    let driver = CollectionDriver::new(
        Arc::new(registry),
        Arc::new(BankProviders {
            bank: bank.clone(),
            user: user.clone(),
        }),
        repository.clone(),
    )
    .with_timeouts(TimeoutConfig::default())
    .with_retry(RetryConfig::default());

    Harness {
        _dir: dir,
        bank,
        user,
        repository,
        driver,
    }
}

fn key() -> ConnectionKey {
    ConnectionKey::new(PluginId::from_string(json_bank::PLUGIN_ID), "perso")
}

fn login_request() -> RunRequest {
    RunRequest::new(key())
        .field("username", "alice")
        .field("password", PASSWORD)
}

fn collected(report: &RunReport) -> &tibu_host::CollectSummary {
    match &report.outcome {
        RunOutcome::Collected(summary) => summary,
        other => panic!("unexpected outcome {other:?}"),
    }
}

fn failure(report: &RunReport) -> (ErrorKind, String) {
    match &report.outcome {
        RunOutcome::Failed { kind, messages } => (*kind, messages.all()[0].key.clone()),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn first_run_logs_in_with_otp_and_collects() {
    let h = harness(FakeBank::new(true));
    let report = h.driver.run_with_retry(&login_request()).await.expect("run");

    let summary = collected(&report);
    assert_eq!(summary.accounts.len(), 1);
    assert_eq!(summary.accounts[0].current_balance, 1487.5);
    assert_eq!(summary.new_transactions.len(), 2);
    assert!(summary.notices.has_key("json_bank.otp_every_login"));
    assert_eq!(h.user.asked.load(Ordering::SeqCst), 1);

    let state = h.repository.load(&key()).await.expect("load").expect("state");
    assert_eq!(state.settings.get("token").map(String::as_str), Some("tok-1"));
    assert_eq!(state.settings.get("username").map(String::as_str), Some("alice"));
    assert!(!state.settings.contains_key("password"));
    assert!(!state.settings.contains_key("device_token"));
    assert_eq!(state.cookies.get("bank_sid").map(String::as_str), Some("s-1"));
    assert_eq!(
        state.account("A1").and_then(|a| a.last_operation_provider_id.as_deref()),
        Some("T2")
    );
}

#[tokio::test]
async fn second_run_reuses_session_and_cursor() {
    let h = harness(FakeBank::new(true));
    h.driver.run(&login_request()).await.expect("first run");
    h.bank.add_transaction("A1", transaction("T3", -3.2, "CAFE"));

    let report = h.driver.run(&RunRequest::new(key())).await.expect("second run");
    let summary = collected(&report);
    assert!(summary.notices.has_key("json_bank.session_reused"));
    assert_eq!(summary.new_transactions.len(), 1);
    assert_eq!(summary.new_transactions[0].id, "T3");

    assert_eq!(h.bank.count("POST", "/api/session"), 1);
    assert_eq!(h.user.asked.load(Ordering::SeqCst), 1);
    let last = h.bank.requests().last().cloned().expect("request");
    assert_eq!(last.url.query(), Some("after=T2"));
    assert_eq!(last.authorization.as_deref(), Some("Bearer tok-1"));
    assert_eq!(last.cookies.get("bank_sid").map(String::as_str), Some("s-1"));
}

#[tokio::test]
async fn unchanged_provider_gives_same_results() {
    let h = harness(FakeBank::new(false));
    let first = h.driver.run(&login_request()).await.expect("first run");
    let second = h.driver.run(&RunRequest::new(key())).await.expect("second run");

    assert_eq!(collected(&first).accounts, collected(&second).accounts);
    assert!(collected(&second).new_transactions.is_empty());
    assert!(collected(&second).missing_accounts.is_empty());
}

#[tokio::test]
async fn expired_session_without_password_is_access_deny() {
    let h = harness(FakeBank::new(false));
    h.driver.run(&login_request()).await.expect("first run");
    h.bank.expire_session();

    let report = h
        .driver
        .run_with_retry(&RunRequest::new(key()))
        .await
        .expect("run");
    assert_eq!(
        failure(&report),
        (ErrorKind::AccessDeny, "json_bank.session_expired".to_string())
    );
    assert_eq!(report.attempts, 1);

    let state = h.repository.load(&key()).await.expect("load").expect("state");
    assert!(!state.settings.contains_key("token"));
    assert_eq!(state.accounts.len(), 1);
}

#[tokio::test]
async fn expired_session_logs_in_again_with_credentials() {
    let h = harness(FakeBank::new(false));
    h.driver.run(&login_request()).await.expect("first run");
    h.bank.expire_session();

    let report = h.driver.run(&login_request()).await.expect("run");
    assert!(report.outcome.is_success());
    assert_eq!(h.bank.count("POST", "/api/session"), 2);
    let state = h.repository.load(&key()).await.expect("load").expect("state");
    assert_eq!(state.settings.get("token").map(String::as_str), Some("tok-2"));
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let h = harness(FakeBank::new(false));
    let request = RunRequest::new(key())
        .field("username", "alice")
        .field("password", "nope");
    let report = h.driver.run_with_retry(&request).await.expect("run");
    assert_eq!(
        failure(&report),
        (ErrorKind::AccessDeny, "json_bank.credentials_rejected".to_string())
    );
    assert_eq!(report.attempts, 1);
}

#[tokio::test]
async fn remembered_device_skips_second_factor() {
    let h = harness(FakeBank::new(true));
    let request = login_request()
        .field("remember_device", "true")
        .field("device_name", "laptop");
    h.driver.run(&request).await.expect("first run");
    let state = h.repository.load(&key()).await.expect("load").expect("state");
    assert_eq!(
        state.settings.get("device_token").map(String::as_str),
        Some(DEVICE_TOKEN)
    );

    h.bank.expire_session();
    let report = h.driver.run(&request).await.expect("second run");
    assert!(report.outcome.is_success());
    assert_eq!(h.user.asked.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn device_name_required_when_remembering() {
    let h = harness(FakeBank::new(false));
    let report = h
        .driver
        .run(&login_request().field("remember_device", "yes"))
        .await
        .expect("run");
    match report.outcome {
        RunOutcome::ValidationFailed { messages } => {
            assert_eq!(messages.fields(), vec!["device_name"]);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(h.bank.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn maintenance_is_retried() {
    let bank = FakeBank::new(false);
    bank.unavailable_left.store(1, Ordering::SeqCst);
    let h = harness(bank);

    let report = h.driver.run_with_retry(&login_request()).await.expect("run");
    assert_eq!(report.attempts, 2);
    assert!(report.outcome.is_success());
}

#[tokio::test]
async fn base_url_outside_whitelist_is_fatal() {
    let h = harness(FakeBank::new(false));
    let request = login_request().field("base_url", "https://evil.example");

    let err = h.driver.run_with_retry(&request).await.unwrap_err();
    match err {
        HostError::DomainNotAllowed(refusal) => assert_eq!(refusal.host, "evil.example"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(h.bank.requests().is_empty());
}

#[tokio::test]
async fn redirect_flow_labels_connection() {
    let h = harness(FakeBank::new(true));
    let request = RunRequest::new(key()).callback("tibu://callback?code=abc&state=s");

    let report = h.driver.run_with_retry(&request).await.expect("run");
    let summary = collected(&report);
    assert_eq!(summary.connection_label.as_deref(), Some("JSON Bank - Alice"));
    assert_eq!(h.user.asked.load(Ordering::SeqCst), 0);

    let state = h.repository.load(&key()).await.expect("load").expect("state");
    assert_eq!(state.connection_label.as_deref(), Some("JSON Bank - Alice"));
}

#[tokio::test]
async fn rejected_authorization_code_fails_once() {
    let h = harness(FakeBank::new(false));
    let request = RunRequest::new(key()).callback("tibu://callback?code=stale");

    let report = h.driver.run_with_retry(&request).await.expect("run");
    assert_eq!(failure(&report).0, ErrorKind::Collect);
    assert_eq!(report.attempts, 1);
}

#[tokio::test]
async fn renamed_account_keeps_user_title() {
    let h = harness(FakeBank::new(false));
    h.driver.run(&login_request()).await.expect("first run");
    h.driver
        .rename_account(&key(), "A1", "My Checking")
        .await
        .expect("rename");

    let report = h.driver.run(&RunRequest::new(key())).await.expect("second run");
    assert_eq!(collected(&report).accounts[0].title, "My Checking");
}
