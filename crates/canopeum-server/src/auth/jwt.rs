use canopeum::Role;
use jiff::{SignedDuration, Timestamp};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: i64,
    pub role: Role,
    pub kind: TokenKind,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn expires_at(&self) -> Result<Timestamp, TokenError> {
        Timestamp::from_second(self.exp).map_err(|_| TokenError::BadExpiry(self.exp))
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("expected a {expected:?} token")]
    WrongKind { expected: TokenKind },

    #[error("expiry {0} is out of range")]
    BadExpiry(i64),
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues and verifies HS256 bearer tokens.
pub struct Tokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: SignedDuration,
    refresh_ttl: SignedDuration,
}

impl Tokens {
    pub fn new(secret: &str, access_ttl_minutes: i64, refresh_ttl_days: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Tokens {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl: SignedDuration::from_mins(access_ttl_minutes),
            refresh_ttl: SignedDuration::from_hours(refresh_ttl_days * 24),
        }
    }

    pub fn issue(&self, user_id: i64, role: Role, now: Timestamp) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.access(user_id, role, now)?,
            refresh: self.sign(user_id, role, TokenKind::Refresh, now)?,
        })
    }

    pub fn access(&self, user_id: i64, role: Role, now: Timestamp) -> Result<String, TokenError> {
        self.sign(user_id, role, TokenKind::Access, now)
    }

    fn sign(&self, user_id: i64, role: Role, kind: TokenKind, now: Timestamp) -> Result<String, TokenError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user_id,
            role,
            kind,
            jti: uuid::Uuid::new_v4().simple().to_string(),
            exp: now.as_second() + ttl.as_secs(),
            iat: now.as_second(),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }

    /// Check signature, expiry and kind.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)?.claims;
        if claims.kind != kind {
            return Err(TokenError::WrongKind { expected: kind });
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    fn tokens() -> Tokens {
        Tokens::new("test-secret", 60, 7)
    }

    #[test]
    fn access_token_round_trips() {
        let now = Timestamp::now();
        let pair = tokens().issue(42, Role::ForestSteward, now).unwrap();
        let claims = tokens().verify(&pair.access, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::ForestSteward);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let pair = tokens().issue(1, Role::User, Timestamp::now()).unwrap();
        assert!(matches!(
            tokens().verify(&pair.refresh, TokenKind::Access),
            Err(TokenError::WrongKind {
                expected: TokenKind::Access
            })
        ));
        let refresh = tokens().verify(&pair.refresh, TokenKind::Refresh).unwrap();
        assert_eq!(refresh.exp - refresh.iat, 7 * 24 * 3600);
    }

    #[test]
    fn each_token_gets_its_own_jti() {
        let now = Timestamp::now();
        let a = tokens().issue(1, Role::User, now).unwrap();
        let b = tokens().issue(1, Role::User, now).unwrap();
        let a = tokens().verify(&a.refresh, TokenKind::Refresh).unwrap();
        let b = tokens().verify(&b.refresh, TokenKind::Refresh).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn expired_token_is_rejected() {
        let issued = Timestamp::now() - SignedDuration::from_hours(2);
        let pair = tokens().issue(1, Role::User, issued).unwrap();
        assert!(matches!(
            tokens().verify(&pair.access, TokenKind::Access),
            Err(TokenError::Jwt(_))
        ));
    }

    #[test]
    fn other_secret_is_rejected() {
        let pair = tokens().issue(1, Role::MegaAdmin, Timestamp::now()).unwrap();
        let other = Tokens::new("another-secret", 60, 7);
        assert!(other.verify(&pair.access, TokenKind::Access).is_err());
    }
}
