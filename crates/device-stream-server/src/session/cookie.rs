//! Session cookie reading and writing.

use axum::http::{header, HeaderMap, HeaderValue, Uri};

/// Value of the cookie named `name`, if the request carries one.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Whether the client reached us over TLS, directly or through a proxy.
pub fn is_encrypted(uri: &Uri, headers: &HeaderMap) -> bool {
    if uri.scheme_str() == Some("https") {
        return true;
    }
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

/// `Set-Cookie` value for a session: HttpOnly, strict same-site, site-wide.
pub fn session_cookie(
    name: &str,
    session_id: &str,
    max_age_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Strict",
        name, session_id, max_age_seconds
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; anonymous_session=abc-123_x; other=1"),
        );
        assert_eq!(read_cookie(&headers, "anonymous_session").as_deref(), Some("abc-123_x"));
        assert_eq!(read_cookie(&headers, "theme").as_deref(), Some("dark"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_read_cookie_across_headers_and_empty_values() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("anonymous_session="));
        assert_eq!(read_cookie(&headers, "anonymous_session"), None);

        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        assert_eq!(read_cookie(&headers, "a").as_deref(), Some("1"));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let value = session_cookie("anonymous_session", "xyz", 259200, false).unwrap();
        let text = value.to_str().unwrap();
        assert!(text.starts_with("anonymous_session=xyz;"));
        assert!(text.contains("Path=/"));
        assert!(text.contains("Max-Age=259200"));
        assert!(text.contains("HttpOnly"));
        assert!(text.contains("SameSite=Strict"));
        assert!(!text.contains("Secure"));

        let secure = session_cookie("anonymous_session", "xyz", 10, true).unwrap();
        assert!(secure.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn test_is_encrypted() {
        let plain: Uri = "/user-preferences".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert!(!is_encrypted(&plain, &headers));

        headers.insert("x-forwarded-proto", HeaderValue::from_static("HTTPS"));
        assert!(is_encrypted(&plain, &headers));

        let tls: Uri = "https://example.com/user-preferences".parse().unwrap();
        assert!(is_encrypted(&tls, &HeaderMap::new()));
    }
}
