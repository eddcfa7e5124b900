use std::time::Duration;

use axum::http::{header, HeaderMap};
use time::{macros::format_description, OffsetDateTime, UtcOffset};

use crate::config::CookieConfig;

const EPOCH_HTTP_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

fn http_date(at: OffsetDateTime) -> Option<String> {
    let fmt = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    at.to_offset(UtcOffset::UTC).format(fmt).ok()
}

fn attributes(cfg: &CookieConfig) -> String {
    let mut attrs = format!("HttpOnly; SameSite=Strict; Path={}", cfg.path);
    if cfg.secure {
        attrs.push_str("; Secure");
    }
    attrs
}

/// `Set-Cookie` value carrying a freshly issued session token.
pub fn session_cookie(cfg: &CookieConfig, token: &str, ttl: Duration) -> String {
    let max_age = ttl.as_secs();
    let mut cookie = format!("{}={}; {}; Max-Age={}", cfg.name, token, attributes(cfg), max_age);
    let expires = OffsetDateTime::now_utc() + time::Duration::seconds(max_age as i64);
    if let Some(date) = http_date(expires) {
        cookie.push_str("; Expires=");
        cookie.push_str(&date);
    }
    cookie
}

/// `Set-Cookie` value that makes the client drop the session immediately.
pub fn cleared_cookie(cfg: &CookieConfig) -> String {
    format!(
        "{}=; {}; Max-Age=0; Expires={}",
        cfg.name,
        attributes(cfg),
        EPOCH_HTTP_DATE
    )
}

/// Reads the named cookie from every `Cookie` header. Empty values count as absent.
pub fn extract_token(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name && !value.is_empty()).then(|| value.to_string())
        })
}
