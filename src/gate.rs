use crate::credentials::{Credentials, Identity};
use crate::error::{Error, Result};
use crate::model::Role;
use log::{info, warn};

/// Resolves presented tokens to identities.
#[derive(Clone)]
pub struct AccessGate {
    credentials: Credentials,
}

impl AccessGate {
    pub fn new(credentials: Credentials) -> Self {
        AccessGate { credentials }
    }

    /// Accepts a bare token or an `Authorization` header value (`Bearer <token>`).
    ///
    /// Every failure is reported as `AuthenticationFailed`; whether the token was expired
    /// or invalid only shows up in the log.
    pub fn authenticate(&self, token: &str) -> Result<Identity> {
        let token = token.trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        if token.is_empty() {
            info!("no token provided");
            return Err(Error::AuthenticationFailed);
        }
        self.credentials.verify_token(token).map_err(|err| {
            match err {
                Error::ExpiredToken => info!("rejected expired token"),
                Error::InvalidToken => warn!("rejected invalid token"),
                ref other => warn!("token verification failed: {}", other),
            }
            Error::AuthenticationFailed
        })
    }
}

pub fn require_role(identity: &Identity, role: Role) -> bool {
    identity.role == role
}

/// `Forbidden` unless `identity` has `role`.
pub(crate) fn ensure_role(identity: &Identity, role: Role) -> Result<()> {
    if require_role(identity, role) {
        Ok(())
    } else {
        warn!(
            "user {} ({:?}) denied, {:?} required",
            identity.id, identity.role, role
        );
        Err(Error::Forbidden)
    }
}
