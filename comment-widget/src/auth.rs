//! Session identity helpers.
//!
//! The bearer token lives in local storage. Its payload is decoded here
//! WITHOUT verification, purely so the widget can tell "is this my message"
//! when rendering. That value never gates anything — authorization is
//! enforced server-side on every call.

use crate::interop::local_storage_get;

pub const DEFAULT_TOKEN_KEY: &str = "crit-token";

pub fn load_token(storage_key: &str) -> Option<String> {
    local_storage_get(storage_key).filter(|token| !token.is_empty())
}

/// User id decoded from the token payload. Display-only: never treat this
/// as authoritative for a security decision.
pub fn display_user_id(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let decoded = web_sys::window()?
        .atob(&base64url_to_base64(payload))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_str(&decoded).ok()?;
    user_id_from_claims(&claims)
}

/// JWT payloads are base64url without padding; `atob` wants standard
/// base64.
fn base64url_to_base64(payload: &str) -> String {
    let mut out = payload.replace('-', "+").replace('_', "/");
    while out.len() % 4 != 0 {
        out.push('=');
    }
    out
}

fn user_id_from_claims(claims: &serde_json::Value) -> Option<String> {
    for key in ["sub", "user_id", "uid"] {
        match claims.get(key) {
            Some(serde_json::Value::String(id)) if !id.is_empty() => return Some(id.clone()),
            Some(serde_json::Value::Number(id)) => return Some(id.to_string()),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64url_to_base64() {
        assert_eq!(base64url_to_base64("a-b_c"), "a+b/c===");
        assert_eq!(base64url_to_base64("abcd"), "abcd");
    }

    #[test]
    fn test_user_id_from_claims() {
        let claims = serde_json::json!({"sub": "user-7", "name": "Ana"});
        assert_eq!(user_id_from_claims(&claims), Some("user-7".to_string()));

        let numeric = serde_json::json!({"user_id": 42});
        assert_eq!(user_id_from_claims(&numeric), Some("42".to_string()));

        let empty = serde_json::json!({"name": "Ana"});
        assert_eq!(user_id_from_claims(&empty), None);
    }
}
