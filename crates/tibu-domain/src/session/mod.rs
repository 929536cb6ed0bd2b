mod token_extractor;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::capability::internet::HttpResponse;

pub use token_extractor::SessionTokenExtractor;

/// Plugin-side cookie store, persisted by the host between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(cookies: BTreeMap<String, String>) -> Self {
        Self { cookies }
    }

    /// Merges the cookies a response set. An empty value deletes the cookie.
    pub fn apply(&mut self, response: &HttpResponse) {
        for (name, value) in &response.cookies {
            if value.is_empty() {
                self.cookies.remove(name);
            } else {
                self.cookies.insert(name.clone(), value.clone());
            }
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.cookies.remove(name)
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn to_request_cookies(&self) -> BTreeMap<String, String> {
        self.cookies.clone()
    }

    pub fn session_token(&self) -> Option<String> {
        SessionTokenExtractor::extract(&self.cookies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_merges_and_deletes() {
        let mut jar = CookieJar::new();
        jar.set("sid", "old");
        jar.set("tracking", "1");

        let mut response = HttpResponse::default();
        response.cookies.insert("sid".into(), "new".into());
        response.cookies.insert("tracking".into(), String::new());
        response.cookies.insert("lang".into(), "fr".into());
        jar.apply(&response);

        assert_eq!(jar.get("sid"), Some("new"));
        assert_eq!(jar.get("lang"), Some("fr"));
        assert_eq!(jar.get("tracking"), None);
        assert_eq!(jar.to_request_cookies().len(), 2);
    }

    #[test]
    fn test_session_token_from_jar() {
        let mut jar = CookieJar::new();
        assert!(jar.session_token().is_none());
        jar.set("JSESSIONID", "abc");
        assert_eq!(jar.session_token().as_deref(), Some("abc"));
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut jar = CookieJar::new();
        jar.set("a", "1");
        assert_eq!(serde_json::to_string(&jar).unwrap(), r#"{"a":"1"}"#);
    }
}
