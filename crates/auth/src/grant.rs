//! Token endpoint plumbing shared by every grant.
//!
//! All grants are a form-encoded POST answered with the standard OAuth token
//! JSON. A non-200 answer is turned into [`ConsoleError::AuthServer`] carrying
//! the server's own `message` (or OAuth `error_description` / `error`).

use consolectl_types::{ConsoleError, Result, Token};
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde_json::Value;

/// Lifetime assumed when the server omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// HTTP Basic client authentication for the token request.
pub(crate) struct BasicAuth<'a> {
    pub user: &'a str,
    pub password: &'a str,
}

/// POST `form` to `url` and parse the token response.
pub(crate) async fn request_token(
    http: &reqwest::Client,
    url: &str,
    form: &[(&str, &str)],
    basic: Option<BasicAuth<'_>>,
) -> Result<Token> {
    let mut req = http
        .post(url)
        .header(ACCEPT, "application/json")
        .form(form);
    if let Some(basic) = basic {
        req = req.basic_auth(basic.user, Some(basic.password));
    }

    let resp = req.send().await?;
    let status = resp.status();
    let body = resp.text().await?;

    if status != StatusCode::OK {
        return Err(server_error(status, &body));
    }

    let json: Value = serde_json::from_str(&body)
        .map_err(|e| ConsoleError::Auth(format!("failed to parse token response: {e}")))?;
    parse_token_response(&json)
}

fn server_error(status: StatusCode, body: &str) -> ConsoleError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            ["message", "error_description", "error"]
                .into_iter()
                .find_map(|key| json.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected response from token endpoint")
                .to_string()
        });
    ConsoleError::AuthServer {
        status: status.as_u16(),
        message,
    }
}

/// Build a [`Token`] from a token endpoint JSON body.
///
/// # Errors
///
/// Returns [`ConsoleError::Auth`] if `access_token` is missing or empty.
pub fn parse_token_response(json: &Value) -> Result<Token> {
    let access_token = json
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ConsoleError::Auth("missing access_token".into()))?;

    let mut token = Token::new(access_token);
    if let Some(kind) = json.get("token_type").and_then(Value::as_str) {
        token = token.with_type(kind);
    }
    if let Some(refresh) = json.get("refresh_token").and_then(Value::as_str) {
        token = token.with_refresh(refresh);
    }
    Ok(token.with_expiry(expires_in(json).unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)))
}

/// `expires_in` as an integer, a float, or a numeric string. Negative
/// lifetimes clamp to zero so the token is already expired.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn expires_in(json: &Value) -> Option<u64> {
    let secs = match json.get("expires_in")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !secs.is_finite() {
        return None;
    }
    Some(secs.max(0.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use consolectl_types::now_secs;
    use serde_json::json;

    #[test]
    fn test_parse_full_response() {
        let t = parse_token_response(&json!({
            "access_token": "at",
            "refresh_token": "rt",
            "token_type": "Bearer",
            "expires_in": 600
        }))
        .unwrap();
        assert_eq!(t.access_token, "at");
        assert_eq!(t.refresh_token.as_deref(), Some("rt"));
        assert_eq!(t.token_type, "Bearer");
        assert!(t.expires_at >= now_secs() + 590);
        assert!(t.valid());
    }

    #[test]
    fn test_parse_minimal_response_gets_default_lifetime() {
        let t = parse_token_response(&json!({"access_token": "at"})).unwrap();
        assert_eq!(t.token_type, "Bearer");
        assert!(t.refresh_token.is_none());
        assert!(t.expires_at >= now_secs() + DEFAULT_TOKEN_LIFETIME_SECS - 5);
    }

    #[test]
    fn test_parse_expires_in_variants() {
        let t = parse_token_response(&json!({"access_token": "a", "expires_in": "120"})).unwrap();
        assert!(t.expires_at >= now_secs() + 110 && t.expires_at <= now_secs() + 121);
        let t = parse_token_response(&json!({"access_token": "a", "expires_in": 120.7})).unwrap();
        assert!(t.expires_at <= now_secs() + 121);
    }

    #[test]
    fn test_negative_expires_in_is_already_expired() {
        for expires in [json!(-30), json!(-0.5), json!("-30")] {
            let t = parse_token_response(&json!({"access_token": "a", "expires_in": expires}))
                .unwrap();
            assert!(t.expires_at <= now_secs());
            assert!(!t.valid());
        }
    }

    #[test]
    fn test_non_numeric_expires_in_gets_default_lifetime() {
        let t = parse_token_response(&json!({"access_token": "a", "expires_in": "soon"})).unwrap();
        assert!(t.expires_at >= now_secs() + DEFAULT_TOKEN_LIFETIME_SECS - 5);
    }

    #[test]
    fn test_parse_missing_access_token() {
        assert!(parse_token_response(&json!({"token_type": "Bearer"})).is_err());
        assert!(parse_token_response(&json!({"access_token": ""})).is_err());
    }

    #[test]
    fn test_server_error_prefers_message() {
        let err = server_error(
            StatusCode::UNAUTHORIZED,
            r#"{"message":"invalid client","error":"invalid_client"}"#,
        );
        match err {
            ConsoleError::AuthServer { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid client");
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_server_error_falls_back_to_oauth_fields() {
        let err = server_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"refresh token revoked"}"#,
        );
        assert!(err.to_string().contains("refresh token revoked"));
    }

    #[test]
    fn test_server_error_non_json_body() {
        let err = server_error(StatusCode::BAD_GATEWAY, "<html>oops</html>");
        assert_eq!(
            err.to_string(),
            "authorization server returned 502: Bad Gateway"
        );
    }
}
