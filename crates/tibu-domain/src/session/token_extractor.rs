use std::collections::BTreeMap;

/// Picks the cookie most likely to carry the authenticated session.
pub struct SessionTokenExtractor;

impl SessionTokenExtractor {
    /// Well-known session cookie names, highest priority first.
    const SESSION_KEYS: &'static [&'static str] = &[
        "session",
        "session_id",
        "sessionid",
        "token",
        "access_token",
        "auth",
        "authorization",
        "jwt",
        "connect.sid",
        "PHPSESSID",
        "JSESSIONID",
    ];

    /// Known names first (case-insensitive), then the longest non-empty value.
    pub fn extract(cookies: &BTreeMap<String, String>) -> Option<String> {
        for &key in Self::SESSION_KEYS {
            let hit = cookies
                .iter()
                .find(|(name, value)| name.eq_ignore_ascii_case(key) && !value.is_empty());
            if let Some((_, value)) = hit {
                return Some(value.clone());
            }
        }

        cookies
            .values()
            .filter(|v| !v.is_empty())
            .max_by_key(|v| v.len())
            .cloned()
    }
}
