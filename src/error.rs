use crate::database;
use crate::model::{Id, UnknownStatus};
use std::fmt;
use thiserror::Error;

/// Coarse classification of [`Error`], for callers that only need to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Authentication,
    Authorization,
    Internal,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} is required")]
    MissingRequiredField(&'static str),

    #[error("At least one genre is required")]
    GenreRequired,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Movie not found")]
    MovieNotFound(Id),

    #[error("Watchlist item not found")]
    ItemNotFound(Id),

    #[error("Movie not in watchlist")]
    NotInWatchlist(Id),

    #[error("User not found")]
    UserNotFound(Id),

    #[error("Movie already in watchlist")]
    AlreadyInWatchlist(Id),

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingRequiredField(_) | Error::GenreRequired | Error::InvalidInput(_) => {
                ErrorKind::Validation
            }
            Error::MovieNotFound(_)
            | Error::ItemNotFound(_)
            | Error::NotInWatchlist(_)
            | Error::UserNotFound(_) => ErrorKind::NotFound,
            Error::AlreadyInWatchlist(_) | Error::EmailTaken => ErrorKind::Conflict,
            Error::InvalidToken
            | Error::ExpiredToken
            | Error::AuthenticationFailed
            | Error::InvalidCredentials => ErrorKind::Authentication,
            Error::Unauthorized | Error::Forbidden => ErrorKind::Authorization,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to show to the caller. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal server error".to_owned(),
            _ => self.to_string(),
        }
    }

    pub fn invalid<T: fmt::Display>(msg: T) -> Self {
        Error::InvalidInput(msg.to_string())
    }

    pub fn internal<T: fmt::Display>(msg: T) -> Self {
        log::error!("{}", msg);
        Error::Internal(msg.to_string())
    }
}

impl From<database::Error> for Error {
    fn from(err: database::Error) -> Self {
        Error::internal(format_args!("Database error: {}", err))
    }
}

impl From<bcrypt::BcryptError> for Error {
    fn from(err: bcrypt::BcryptError) -> Self {
        Error::internal(format_args!("Hashing error: {}", err))
    }
}

impl From<UnknownStatus> for Error {
    fn from(err: UnknownStatus) -> Self {
        Error::InvalidInput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_details() {
        let err = Error::from(database::Error::Corrupt("movies"));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.public_message(), "Internal server error");
        assert!(err.to_string().contains("movies"));
    }

    #[test]
    fn expired_and_invalid_are_both_authentication() {
        assert_eq!(Error::ExpiredToken.kind(), ErrorKind::Authentication);
        assert_eq!(Error::InvalidToken.kind(), ErrorKind::Authentication);
        assert_ne!(
            Error::ExpiredToken.public_message(),
            Error::InvalidToken.public_message()
        );
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        let err: Error = "PAUSED".parse::<crate::model::WatchStatus>().unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.public_message().contains("PAUSED"));
    }

    #[test]
    fn missing_field_names_the_field() {
        let err = Error::MissingRequiredField("director");
        assert_eq!(err.public_message(), "director is required");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn forbidden_is_not_an_authentication_failure() {
        assert_eq!(Error::Forbidden.kind(), ErrorKind::Authorization);
        assert_eq!(Error::Unauthorized.kind(), ErrorKind::Authorization);
    }
}
