use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{SyncError, SyncResult};

/// The signed-in user as far as the chat client cares: who am I, and what
/// name do my typing frames carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<i64>,
    pub username: String,
}

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    user_id: Option<Value>,
    username: String,
}

impl Identity {
    pub fn new(user_id: Option<i64>, username: impl Into<String>) -> Self {
        Identity {
            user_id,
            username: username.into(),
        }
    }

    /// Reads the claims segment of a JWT bearer token. The signature is the
    /// server's concern and is not checked here.
    pub fn from_token(token: &str) -> SyncResult<Self> {
        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_)) => payload,
            _ => {
                return Err(SyncError::InvalidToken(
                    "expected three dot-separated segments".to_string(),
                ))
            }
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| SyncError::InvalidToken(e.to_string()))?;
        let claims: Claims =
            serde_json::from_slice(&bytes).map_err(|e| SyncError::InvalidToken(e.to_string()))?;

        let user_id = match claims.user_id {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };

        Ok(Identity {
            user_id,
            username: claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with(claims: &str) -> String {
        format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(claims)
        )
    }

    #[test]
    fn reads_username_and_numeric_user_id() {
        let token = token_with(r#"{"user_id": 17, "username": "alice", "exp": 1700000000}"#);
        let identity = Identity::from_token(&token).unwrap();
        assert_eq!(identity, Identity::new(Some(17), "alice"));
    }

    #[test]
    fn accepts_string_user_id() {
        let token = token_with(r#"{"user_id": "23", "username": "bob"}"#);
        assert_eq!(Identity::from_token(&token).unwrap().user_id, Some(23));
    }

    #[test]
    fn user_id_is_optional() {
        let token = token_with(r#"{"username": "carol"}"#);
        let identity = Identity::from_token(&token).unwrap();
        assert_eq!(identity.user_id, None);
        assert_eq!(identity.username, "carol");
    }

    #[test]
    fn rejects_opaque_tokens() {
        assert!(matches!(
            Identity::from_token("not-a-jwt"),
            Err(SyncError::InvalidToken(_))
        ));
    }

    #[test]
    fn rejects_claims_without_username() {
        let token = token_with(r#"{"user_id": 1}"#);
        assert!(matches!(
            Identity::from_token(&token),
            Err(SyncError::InvalidToken(_))
        ));
    }
}
