use chrono::Duration;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::schema::{User, Uuid};
use crate::error::{Error, ErrorKind};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    pub email: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Uuid, email: String, lifetime: Duration) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: id,
            email,
            iat,
            exp,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}

/// The authenticated caller, resolved against the user store.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: Uuid,
    pub email: String,
    pub is_staff: bool,
}

impl From<&User> for SessionData {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.to_owned(),
            is_staff: user.is_staff,
        }
    }
}

/// HMAC-SHA256 signing key and lifetime of issued session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    key: Hmac<Sha256>,
    lifetime: Duration,
}

impl SessionKeys {
    pub fn new(secret: &[u8], lifetime_hours: i64) -> Result<Self, Error> {
        if secret.is_empty() {
            return Err(ErrorKind::Internal.new("Session secret must not be empty"));
        }
        let key: Hmac<Sha256> = Hmac::new_from_slice(secret)
            .map_err(|_| ErrorKind::Internal.new("Invalid session secret"))?;

        Ok(Self {
            key,
            lifetime: Duration::hours(lifetime_hours),
        })
    }

    pub fn generate_jwt_session(&self, user: &User) -> Result<String, Error> {
        let claims = JwtSessionData::new(user.id, user.email.to_owned(), self.lifetime);
        self.sign(&claims)
    }

    fn sign(&self, claims: &JwtSessionData) -> Result<String, Error> {
        claims.sign_with_key(&self.key).map_err(|e| {
            log::error!("Failed to sign session token: {e}");
            ErrorKind::Internal.new("Failed to sign session token")
        })
    }

    pub fn verify_jwt_session(&self, token: &str) -> Result<JwtSessionData, Error> {
        let session: JwtSessionData = token
            .verify_with_key(&self.key)
            .map_err(|_| ErrorKind::Unauthenticated.new("Invalid session; Invalid token"))?;

        if session.is_expired() {
            return Err(ErrorKind::Unauthenticated.new("Invalid session; Token expired"));
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 42,
            email: "test@example.com".into(),
            password: String::new(),
            name: "Test".into(),
            is_active: true,
            is_staff: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issued_token_verifies() {
        let keys = SessionKeys::new(b"test-secret", 1).unwrap();
        let token = keys.generate_jwt_session(&user()).unwrap();

        let session = keys.verify_jwt_session(&token).unwrap();

        assert_eq!(session.user_id, 42);
        assert_eq!(session.email, "test@example.com");
    }

    #[test]
    fn token_from_other_key_is_rejected() {
        let token = SessionKeys::new(b"first", 1)
            .unwrap()
            .generate_jwt_session(&user())
            .unwrap();

        let error = SessionKeys::new(b"second", 1)
            .unwrap()
            .verify_jwt_session(&token)
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::Unauthenticated);
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = SessionKeys::new(b"test-secret", 1).unwrap();
        let claims = JwtSessionData::new(42, "test@example.com".into(), Duration::hours(-1));
        let token = keys.sign(&claims).unwrap();

        let error = keys.verify_jwt_session(&token).unwrap_err();

        assert_eq!(error.kind, ErrorKind::Unauthenticated);
        assert_eq!(error.info.as_deref(), Some("Invalid session; Token expired"));
    }

    #[test]
    fn garbage_is_rejected() {
        let keys = SessionKeys::new(b"test-secret", 1).unwrap();

        assert!(keys.verify_jwt_session("not.a.token").is_err());
        assert!(keys.verify_jwt_session("").is_err());
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(SessionKeys::new(b"", 1).is_err());
    }
}
