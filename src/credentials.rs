//! Password hashing and session tokens.
//!
//! Passwords are hashed with bcrypt (random salt, configurable cost). Tokens are HS256
//! JWTs carrying `{id, email, role}`; the signing key comes from [`AuthConfig`] and is
//! fixed for the lifetime of a [`Credentials`] value.

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::model::{Id, Role, User, UserProfile};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Id,
    pub email: String,
    pub role: Role,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Identity {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

impl From<&UserProfile> for Identity {
    fn from(user: &UserProfile) -> Self {
        Identity {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    id: Id,
    email: String,
    role: Role,
    iat: i64,
    exp: i64,
}

#[derive(Clone)]
pub struct Credentials {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    cost: u32,
}

impl Credentials {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Credentials {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl: Duration::seconds(config.token_ttl_secs as i64),
            cost: config.bcrypt_cost,
        }
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        Ok(bcrypt::hash(password, self.cost)?)
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        Ok(bcrypt::verify(password, hash)?)
    }

    pub fn issue_token(&self, identity: &Identity) -> Result<String> {
        self.issue_token_with_ttl(identity, self.ttl)
    }

    pub fn issue_token_with_ttl(&self, identity: &Identity, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            id: identity.id,
            email: identity.email.clone(),
            role: identity.role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| Error::internal(format_args!("Token signing failed: {}", err)))
    }

    /// Fails with `ExpiredToken` past the expiry, `InvalidToken` for malformed or forged
    /// tokens and `AuthenticationFailed` for anything else the decoder rejects.
    pub fn verify_token(&self, token: &str) -> Result<Identity> {
        match jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Ok(Identity {
                id: data.claims.id,
                email: data.claims.email,
                role: data.claims.role,
            }),
            Err(err) => {
                debug!("token rejected: {}", err);
                Err(match err.kind() {
                    JwtErrorKind::ExpiredSignature => Error::ExpiredToken,
                    JwtErrorKind::InvalidToken
                    | JwtErrorKind::InvalidSignature
                    | JwtErrorKind::InvalidAlgorithm
                    | JwtErrorKind::Base64(_)
                    | JwtErrorKind::Json(_)
                    | JwtErrorKind::Utf8(_) => Error::InvalidToken,
                    _ => Error::AuthenticationFailed,
                })
            }
        }
    }
}
