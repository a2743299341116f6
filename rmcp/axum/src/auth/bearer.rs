//! Bearer token authentication plugin.
//!
//! Extracts a Bearer token from the `Authorization` header and delegates
//! validation to a [`Validator`](super::Validator).

use crate::auth::{Authenticator, Validator};

/// Bearer token authenticator.
///
/// Extracts the token from `Authorization: Bearer <token>` and passes it
/// to the inner [`Validator`]. The scheme name is matched
/// case-insensitively (RFC 6750 §2.1).
#[derive(Clone)]
pub struct BearerAuth<V> {
    validator: V,
}

impl<V> BearerAuth<V> {
    pub fn new(validator: V) -> Self {
        Self { validator }
    }
}

impl<V> Authenticator for BearerAuth<V>
where
    V: Validator,
{
    type Claims = V::Claims;
    type Error = String;

    async fn authenticate(
        &self,
        parts: &http::request::Parts,
    ) -> Result<Self::Claims, Self::Error> {
        let token = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| "missing or malformed Authorization header".to_string())?;

        self.validator
            .validate(token)
            .await
            .map_err(|e| e.to_string())
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::bearer_token;

    #[test]
    fn extracts_token() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("Bearer   "), None);
        assert_eq!(bearer_token("Bearer"), None);
    }
}
