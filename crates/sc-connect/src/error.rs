//! Connection Store Error Types

use mongodb::error::{ErrorKind, WriteFailure};
use sc_common::ConnectionKey;
use thiserror::Error;

/// Server error code MongoDB reports for a unique index violation
pub const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Error, Debug)]
pub enum ConnectError {
    /// A record with the same (userId, providerId, providerUserId) already exists
    #[error("Duplicate connection for user {user_id}: {provider_id}/{provider_user_id}")]
    Duplicate {
        user_id: String,
        provider_id: String,
        provider_user_id: String,
    },

    #[error("Connection already exists: {0}")]
    DuplicateConnection(ConnectionKey),

    #[error("No such connection: {0}")]
    NoSuchConnection(ConnectionKey),

    #[error("Not connected to provider: {0}")]
    NotConnected(String),

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Unique index {index} could not be created: {reason}")]
    MissingUniqueIndex { index: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] bson::de::Error),
}

impl ConnectError {
    pub fn duplicate(
        user_id: impl Into<String>,
        provider_id: impl Into<String>,
        provider_user_id: impl Into<String>,
    ) -> Self {
        Self::Duplicate {
            user_id: user_id.into(),
            provider_id: provider_id.into(),
            provider_user_id: provider_user_id.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    /// True for the store-level uniqueness conflict, whichever backend raised it
    pub fn is_duplicate(&self) -> bool {
        match self {
            ConnectError::Duplicate { .. } => true,
            ConnectError::Database(e) => is_uniqueness_violation(e),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConnectError>;

/// Classify a driver error as a duplicate-key (unique index) violation.
///
/// Single-document writes report it as a write error, commands such as
/// `findAndModify` as a command error, and `insert_many` inside its list of
/// per-document write errors.
pub fn is_uniqueness_violation(error: &mongodb::error::Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        ErrorKind::InsertMany(insert_many) => insert_many
            .write_errors
            .as_ref()
            .is_some_and(|errors| errors.iter().any(|e| e.code == DUPLICATE_KEY_CODE)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use mongodb::error::{CommandError, WriteError};

    #[test]
    fn test_duplicate_classification() {
        let err = ConnectError::duplicate("joey", "twitter", "@joey_ramones");
        assert!(err.is_duplicate());
        assert_eq!(
            err.to_string(),
            "Duplicate connection for user joey: twitter/@joey_ramones"
        );

        let err = ConnectError::DuplicateConnection(ConnectionKey::new("twitter", "@a"));
        assert!(!err.is_duplicate());

        let err = ConnectError::invalid_argument("no providerUsers provided");
        assert!(!err.is_duplicate());
    }

    fn write_error(code: i32) -> mongodb::error::Error {
        let write_error: WriteError = bson::from_document(doc! {
            "code": code,
            "codeName": "DuplicateKey",
            "errmsg": "E11000 duplicate key error collection: socialconnect.userConnections",
        })
        .unwrap();
        mongodb::error::Error::from(ErrorKind::Write(WriteFailure::WriteError(write_error)))
    }

    fn command_error(code: i32) -> mongodb::error::Error {
        let command_error: CommandError = bson::from_document(doc! {
            "code": code,
            "codeName": "DuplicateKey",
            "errmsg": "E11000 duplicate key error collection: socialconnect.userConnections",
        })
        .unwrap();
        mongodb::error::Error::from(ErrorKind::Command(command_error))
    }

    #[test]
    fn test_duplicate_key_write_error_is_detected() {
        let err = write_error(DUPLICATE_KEY_CODE);
        assert!(is_uniqueness_violation(&err));
        assert!(ConnectError::from(err).is_duplicate());

        assert!(!is_uniqueness_violation(&write_error(121)));
    }

    #[test]
    fn test_duplicate_key_command_error_is_detected() {
        let err = command_error(DUPLICATE_KEY_CODE);
        assert!(is_uniqueness_violation(&err));
        assert!(ConnectError::from(err).is_duplicate());

        assert!(!is_uniqueness_violation(&command_error(50)));
    }

    #[test]
    fn test_non_write_driver_error_is_not_duplicate() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = mongodb::error::Error::from(io);
        assert!(!is_uniqueness_violation(&err));
    }
}
