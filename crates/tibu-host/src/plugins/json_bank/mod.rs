//! Reference collector for banks exposing a small JSON API.
//!
//! ```text
//! POST /api/session                    {username, password, device_token?, device_name?}
//! POST /api/session/otp                {code}            (bearer: pending token)
//! GET  /api/accounts
//! GET  /api/accounts/{id}/transactions?after={cursor}
//! POST /oauth/token                    {code}            (redirect flow)
//! ```

mod api;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use tibu_domain::capability::{
    DomainWhitelist, HttpRequest, HttpResponse, InternetProvider, OtpRequest, ProviderSet,
};
use tibu_domain::model::{Account, Transaction};
use tibu_domain::plugin::{
    CallbackParams, Capabilities, CollectorState, ContractVersion, FieldDescriptor, FieldValue,
    FormLayout, Progress,
};
use tibu_domain::{
    CollectorError, CollectorPlugin, InitContext, Message, MessageSet, PluginId, PluginManifest,
};

use api::{
    check_status, parse, AccountList, CodeExchangeRequest, LoginRequest, LoginResponse,
    OtpVerifyRequest, SessionResponse, TransactionPage,
};

pub const PLUGIN_ID: &str = "json-bank";
pub const PROVIDER_NAME: &str = "JSON Bank";
pub const DEFAULT_BASE_URL: &str = "https://api.json-bank.example";

const BASE_URL: &str = "base_url";
const USERNAME: &str = "username";
const PASSWORD: &str = "password";
const REMEMBER_DEVICE: &str = "remember_device";
const DEVICE_NAME: &str = "device_name";
const DEVICE_FIELDSET: &str = "device";

// settings keys
const TOKEN_KEY: &str = "token";
const DEVICE_TOKEN_KEY: &str = "device_token";
const USERNAME_KEY: &str = "username";
const BASE_URL_KEY: &str = "base_url";

pub fn manifest() -> PluginManifest {
    PluginManifest {
        id: PluginId::from_string(PLUGIN_ID),
        name: PROVIDER_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        contract_version: ContractVersion::CURRENT,
        allowed_domains: DomainWhitelist::new(["json-bank.example"]),
    }
}

fn descriptors() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::text(BASE_URL)
            .optional()
            .with_label("json_bank.field.base_url")
            .with_maxlen(255)
            .with_order(0),
        FieldDescriptor::text(USERNAME)
            .with_label("json_bank.field.username")
            .with_maxlen(64)
            .with_size(20)
            .with_order(1),
        FieldDescriptor::password(PASSWORD)
            .with_label("json_bank.field.password")
            .with_order(2),
        FieldDescriptor::toggle(REMEMBER_DEVICE)
            .with_label("json_bank.field.remember_device")
            .shows(DEVICE_FIELDSET)
            .with_order(3),
        FieldDescriptor::text(DEVICE_NAME)
            .with_label("json_bank.field.device_name")
            .in_fieldset(DEVICE_FIELDSET)
            .with_maxlen(32)
            .with_order(4),
    ]
}

#[derive(Default)]
pub struct JsonBankPlugin {
    values: BTreeMap<String, FieldValue>,
    state: CollectorState,
    providers: Option<ProviderSet>,
}

impl JsonBankPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn providers(&self) -> Result<&ProviderSet, CollectorError> {
        self.providers
            .as_ref()
            .ok_or_else(|| CollectorError::collect("json_bank.not_initialized", vec![]))
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(FieldValue::as_text)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn remember_device(&self) -> bool {
        self.values
            .get(REMEMBER_DEVICE)
            .and_then(FieldValue::as_bool)
            .unwrap_or(false)
    }

    fn base_url(&self) -> String {
        self.text(BASE_URL)
            .or_else(|| self.state.setting(BASE_URL_KEY))
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string()
    }

    /// A different user must not inherit the previous user's session.
    fn forget_session_if_user_changed(&mut self) {
        let entered = self.text(USERNAME).map(str::to_string);
        let stored = self.state.setting(USERNAME_KEY).map(str::to_string);
        if let (Some(entered), Some(stored)) = (entered, stored) {
            if entered != stored {
                info!("Username changed, dropping stored session");
                self.state.set_setting(TOKEN_KEY, None);
                self.state.set_setting(DEVICE_TOKEN_KEY, None);
                self.state.cookies_mut().clear();
            }
        }
    }

    async fn get(
        &mut self,
        internet: &dyn InternetProvider,
        url: String,
        token: &str,
    ) -> Result<HttpResponse, CollectorError> {
        let request = HttpRequest::new(url)
            .header("Accept", "application/json")
            .header("Authorization", format!("Bearer {}", token))
            .cookies(&self.state.cookies().to_request_cookies());
        let response = internet.get(request).await?;
        self.state.cookies_mut().apply(&response);
        Ok(response)
    }

    async fn post<T: Serialize + Sync>(
        &mut self,
        internet: &dyn InternetProvider,
        url: String,
        token: Option<&str>,
        body: &T,
    ) -> Result<HttpResponse, CollectorError> {
        let mut request = HttpRequest::new(url)
            .header("Accept", "application/json")
            .cookies(&self.state.cookies().to_request_cookies())
            .json_body(body)
            .map_err(|e| {
                CollectorError::collect("json_bank.encode_failed", vec![e.to_string().into()])
            })?;
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        let response = internet.post(request).await?;
        self.state.cookies_mut().apply(&response);
        Ok(response)
    }

    /// Password login, with an OTP step-up when the bank asks for one.
    async fn login(
        &mut self,
        internet: &dyn InternetProvider,
        base: &str,
    ) -> Result<String, CollectorError> {
        let (Some(username), Some(password)) = (
            self.text(USERNAME).map(str::to_string),
            self.text(PASSWORD).map(str::to_string),
        ) else {
            return Err(CollectorError::access_deny("json_bank.session_expired", vec![]));
        };
        let remember = self.remember_device();
        let device_name = self.text(DEVICE_NAME).map(str::to_string);
        let device_token = self.state.setting(DEVICE_TOKEN_KEY).map(str::to_string);

        let body = LoginRequest {
            username: &username,
            password: &password,
            device_token: device_token.as_deref(),
            device_name: if remember { device_name.as_deref() } else { None },
        };
        let response = self
            .post(internet, format!("{}/api/session", base), None, &body)
            .await?;
        check_status(&response, "login")?;
        let login: LoginResponse = parse(&response, "login")?;

        let session = match login.otp {
            None => SessionResponse {
                token: login.token,
                device_token: login.device_token,
                holder: None,
            },
            Some(challenge) => {
                debug!(channel = ?challenge.channel, "Second factor requested");
                let mut request = OtpRequest::new(challenge.channel, "json_bank.otp_label");
                if let Some(destination) = challenge.destination {
                    request = request.with_destination(destination);
                }
                let otp = self.providers()?.otp.clone();
                let code = otp.request_code(&request).await?;

                let response = self
                    .post(
                        internet,
                        format!("{}/api/session/otp", base),
                        Some(&login.token),
                        &OtpVerifyRequest { code: code.trim() },
                    )
                    .await?;
                if matches!(response.code, 401 | 403) {
                    return Err(CollectorError::access_deny("json_bank.otp_rejected", vec![]));
                }
                check_status(&response, "otp")?;
                parse(&response, "otp")?
            }
        };

        if remember {
            if let Some(device_token) = session.device_token {
                self.state.set_setting(DEVICE_TOKEN_KEY, Some(device_token));
            }
        }
        self.state.set_setting(TOKEN_KEY, Some(session.token.clone()));
        self.state.set_setting(USERNAME_KEY, Some(username));
        self.state.set_setting(BASE_URL_KEY, Some(base.to_string()));
        info!("Logged in");
        Ok(session.token)
    }

    async fn fetch_accounts(
        &mut self,
        internet: &dyn InternetProvider,
        base: &str,
        token: &str,
    ) -> Result<AccountList, CollectorError> {
        let response = self
            .get(internet, format!("{}/api/accounts", base), token)
            .await?;
        check_status(&response, "accounts")?;
        parse(&response, "accounts")
    }

    /// Reuses the stored session when it still works.
    async fn open_session(
        &mut self,
        internet: &dyn InternetProvider,
        base: &str,
    ) -> Result<(String, AccountList), CollectorError> {
        if let Some(token) = self.state.setting(TOKEN_KEY).map(str::to_string) {
            match self.fetch_accounts(internet, base, &token).await {
                Ok(accounts) => {
                    debug!("Stored session reused");
                    return Ok((token, accounts));
                }
                Err(CollectorError::AccessDeny(_)) => {
                    info!("Stored session expired");
                    self.state.set_setting(TOKEN_KEY, None);
                }
                Err(e) => return Err(e),
            }
        }
        let token = self.login(internet, base).await?;
        let accounts = self.fetch_accounts(internet, base, &token).await?;
        Ok((token, accounts))
    }

    /// Pulls operations newer than the account's cursor.
    async fn fetch_transactions(
        &mut self,
        internet: &dyn InternetProvider,
        base: &str,
        token: &str,
        account_id: &str,
    ) -> Result<usize, CollectorError> {
        let mut url = format!("{}/api/accounts/{}/transactions", base, encode(account_id));
        if let Some(cursor) = self.state.cursor(account_id) {
            url.push_str("?after=");
            url.push_str(&encode(cursor));
        }
        let response = self.get(internet, url, token).await?;
        check_status(&response, "transactions")?;
        let page: TransactionPage = parse(&response, "transactions")?;

        let count = page.transactions.len();
        let mut newest = None;
        for dto in page.transactions {
            newest = Some(dto.id.clone());
            self.state.push_transaction(dto.into_transaction(account_id));
        }
        if let Some(newest) = newest {
            self.state.advance_cursor(account_id, newest);
        }
        Ok(count)
    }

    async fn collect_pass(&mut self) -> Result<(), CollectorError> {
        let internet: Arc<dyn InternetProvider> = self.providers()?.internet.clone();
        let progress = self.state.progress();
        let base = self.base_url();
        self.forget_session_if_user_changed();

        let (token, list) = self.open_session(&*internet, &base).await?;
        progress.set(20);

        let now = Utc::now();
        let total = list.accounts.len();
        for (done, dto) in list.accounts.into_iter().enumerate() {
            let account = dto.into_account(now);
            let account_id = account.id.clone();
            self.state.adopt_account(account);
            let count = self
                .fetch_transactions(&*internet, &base, &token, &account_id)
                .await?;
            debug!(account_id = %account_id, count, "Transactions fetched");
            progress.step(20, 95, done + 1, total);
        }
        Ok(())
    }
}

fn encode(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

#[async_trait]
impl CollectorPlugin for JsonBankPlugin {
    fn init(&mut self, context: InitContext) {
        self.state = CollectorState::new(
            context.settings,
            context.cookies,
            context.previous_accounts,
        );
        self.providers = Some(context.providers);
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            redirect_flow: true,
            otp: true,
            ..Capabilities::default()
        }
    }

    /// Exchanges the authorization code of an OAuth redirect for a session.
    async fn init_connection(
        &mut self,
        callback_uri: &str,
    ) -> Result<Option<String>, CollectorError> {
        let params = CallbackParams::parse(callback_uri)?;
        let internet = self.providers()?.internet.clone();
        let base = self.base_url();

        let session = match (params.access_token, params.code) {
            (Some(token), _) => SessionResponse {
                token,
                device_token: None,
                holder: None,
            },
            (None, Some(code)) => {
                let response = self
                    .post(
                        &*internet,
                        format!("{}/oauth/token", base),
                        None,
                        &CodeExchangeRequest { code: &code },
                    )
                    .await?;
                check_status(&response, "oauth")?;
                parse(&response, "oauth")?
            }
            (None, None) => {
                return Err(CollectorError::collect("json_bank.oauth_without_code", vec![]))
            }
        };

        self.state.set_setting(TOKEN_KEY, Some(session.token));
        self.state.set_setting(BASE_URL_KEY, Some(base));
        info!(holder = session.holder.is_some(), "Connection authorized");
        Ok(session.holder.map(|h| format!("{} - {}", PROVIDER_NAME, h)))
    }

    fn fields(&self) -> Vec<FieldDescriptor> {
        descriptors()
    }

    fn field_value(&self, name: &str) -> Option<FieldValue> {
        self.values.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), CollectorError> {
        let descriptor = descriptors()
            .into_iter()
            .find(|d| d.name == name)
            .ok_or_else(|| CollectorError::parameter(name, "field.unknown", vec![]))?;
        descriptor.check(Some(&value))?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    fn validate(&self) -> MessageSet {
        if self.values.is_empty() && self.state.setting(TOKEN_KEY).is_some() {
            return MessageSet::single(Message::info("json_bank.session_reused"));
        }

        let mut messages = match FormLayout::new(descriptors()) {
            Ok(layout) => layout.check_all(&self.values),
            Err(e) => MessageSet::single(
                Message::error("json_bank.form_invalid").with_arg(e.to_string()),
            ),
        };
        if let Some(url) = self.text(BASE_URL) {
            if !url.starts_with("https://") {
                messages.push(Message::error("json_bank.base_url_https").for_field(BASE_URL));
            }
        }
        if !self.remember_device() {
            messages.push(Message::info("json_bank.otp_every_login"));
        }
        messages
    }

    async fn collect(&mut self) -> Result<(), CollectorError> {
        let result = self.collect_pass().await;
        match &result {
            Ok(()) => self.state.finish(),
            Err(_) => self.state.discard(),
        }
        result
    }

    fn settings(&self) -> BTreeMap<String, String> {
        self.state.settings().clone()
    }

    fn cookies(&self) -> BTreeMap<String, String> {
        self.state.cookies().to_request_cookies()
    }

    fn accounts(&self) -> Vec<Account> {
        self.state.accounts().to_vec()
    }

    fn transactions(&self) -> Vec<Transaction> {
        self.state.transactions().to_vec()
    }

    fn progress(&self) -> Progress {
        self.state.progress()
    }
}
