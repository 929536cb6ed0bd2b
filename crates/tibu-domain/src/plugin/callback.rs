use serde_json::Value;
use url::Url;

use crate::error::CollectorError;

pub const CALLBACK_FIELD: &str = "callback_uri";

/// Parameters of a redirect-flow callback URI. Values may come from the
/// query string or the fragment; the query wins when both carry a key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub access_token: Option<String>,
}

impl CallbackParams {
    pub fn parse(uri: &str) -> Result<Self, CollectorError> {
        let url = Url::parse(uri.trim()).map_err(|_| {
            CollectorError::parameter(CALLBACK_FIELD, "callback.malformed", vec![])
        })?;

        let mut params = CallbackParams::default();
        let query = url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned()));
        let fragment = url
            .fragment()
            .map(|f| {
                url::form_urlencoded::parse(f.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        for (key, value) in query.chain(fragment) {
            if value.is_empty() {
                continue;
            }
            let slot = match key.as_str() {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                "access_token" | "token" => &mut params.access_token,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }

        if let Some(error) = &params.error {
            let mut args = vec![Value::from(error.clone())];
            if let Some(description) = &params.error_description {
                args.push(Value::from(description.clone()));
            }
            return Err(CollectorError::parameter(
                CALLBACK_FIELD,
                "callback.provider_error",
                args,
            ));
        }

        if params.code.is_none() && params.access_token.is_none() {
            return Err(CollectorError::parameter(
                CALLBACK_FIELD,
                "callback.missing_code",
                vec![],
            ));
        }

        Ok(params)
    }

    pub fn verify_state(&self, expected: &str) -> Result<(), CollectorError> {
        match &self.state {
            Some(state) if state == expected => Ok(()),
            _ => Err(CollectorError::parameter(
                CALLBACK_FIELD,
                "callback.state_mismatch",
                vec![],
            )),
        }
    }
}
