use axum::http::{HeaderMap, StatusCode};

/// Header carrying the admin token on read-only admin endpoints / 管理令牌请求头
pub const SEARCH_TOKEN_HEADER: &str = "x-search-token";

// 比较令牌（恒定时间）
pub fn verify_token(expected: &str, provided: &str) -> bool {
    if expected.is_empty() || expected.len() != provided.len() {
        return false;
    }
    expected
        .bytes()
        .zip(provided.bytes())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

// 从请求头中提取令牌
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SEARCH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

// 验证管理令牌
pub fn require_token(expected: &str, provided: Option<&str>) -> Result<(), (StatusCode, String)> {
    match provided {
        Some(token) if verify_token(expected, token) => Ok(()),
        _ => Err((StatusCode::UNAUTHORIZED, "Invalid security token".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_verify_token() {
        assert!(verify_token("secret", "secret"));
        assert!(!verify_token("secret", "secreT"));
        assert!(!verify_token("secret", "secret2"));
        assert!(!verify_token("", ""));
    }

    #[test]
    fn test_require_token_from_header() {
        let mut headers = HeaderMap::new();
        assert!(require_token("abc", extract_token(&headers)).is_err());

        headers.insert(SEARCH_TOKEN_HEADER, HeaderValue::from_static(" abc "));
        assert!(require_token("abc", extract_token(&headers)).is_ok());
    }
}
