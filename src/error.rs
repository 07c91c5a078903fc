// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy for login and credential reconciliation.
//!
//! ## Classes
//!
//! | Variant | Meaning | Caller action |
//! |---------|---------|---------------|
//! | `Protocol` | Crypto transcript or handshake inconsistency | Abort |
//! | `Operation` | Remote service reported a non-zero status | Inspect code |
//! | `IncorrectVerificationCode` | Wrong two-factor code (`-21669`) | Re-prompt |
//! | `UserCancelled` | User declined an interactive step | Abort |
//! | `FailedSecondaryAuth` | Second two-factor challenge after restart | Abort |
//! | `Reconciliation` | Local precondition violated | Fix input |
//! | `Aggregate` | Two or more sibling tasks failed | Inspect each |
//! | `Cancelled` | Cooperative cancellation observed | None |
//! | `Transport` / `HttpStatus` | Network or HTTP failure | Retry |
//!
//! Nothing in this crate retries on its own. Reconciliation steps are
//! idempotent, so re-running a failed reconciliation converges.

use std::fmt;
use std::path::PathBuf;

use crate::storage::StorageError;

/// Malformed or inconsistent handshake data. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("server public value is zero modulo N")]
    InvalidServerValue,

    #[error("SRP challenge computation failed")]
    ChallengeFailed,

    #[error("server evidence or negotiated-protocol proof did not verify")]
    InvalidSession,

    #[error("session cipher used before the challenge was processed")]
    NotReady,

    #[error("server selected unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("response is missing field `{0}`")]
    MissingField(&'static str),

    #[error("login finished with status {status} ({url})")]
    UnexpectedStatus { status: i64, url: String },

    #[error("reply does not match the `{0}` request")]
    UnexpectedResponse(&'static str),
}

/// Failure reported by the remote service inside a successful HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("remote operation failed ({code}): {message}")]
pub struct OperationError {
    pub code: i64,
    pub message: String,
}

impl OperationError {
    /// Status code returned when a two-factor code does not match.
    pub const INCORRECT_VERIFICATION_CODE: i64 = -21669;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A local precondition for reconciliation does not hold.
#[derive(Debug, thiserror::Error)]
pub enum ReconciliationError {
    #[error("invalid app bundle: {}", .0.display())]
    InvalidApp(PathBuf),

    #[error("entitlements could not be parsed: {0}")]
    InvalidEntitlements(String),

    #[error("no app ID registered for {0}")]
    BundleIdNotFound(String),

    #[error("more than one app ID matches {0}")]
    TooManyMatchingBundleIds(String),

    #[error("provisioning profile content is invalid")]
    InvalidProfileData,

    #[error("certificate signing request was rejected")]
    CsrFailed,

    #[error("team {0} could not be found")]
    TeamNotFound(String),

    #[error("login did not yield a developer services token")]
    MissingLoginToken,
}

/// Failures of two or more sibling tasks from one parallel group.
#[derive(Debug)]
pub struct AggregateError {
    errors: Vec<Error>,
}

impl AggregateError {
    pub fn new(errors: Vec<Error>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tasks failed", self.errors.len())?;
        for (index, error) in self.errors.iter().enumerate() {
            write!(f, "; [{index}] {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error("incorrect verification code")]
    IncorrectVerificationCode,

    #[error("the operation was cancelled by the user")]
    UserCancelled,

    #[error("two-factor verification was requested again after it succeeded")]
    FailedSecondaryAuth,

    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("the operation was cancelled")]
    Cancelled,

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus { status: u16, url: String, body: String },

    #[error("could not decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("crypto error: {0}")]
    Crypto(String),
}

impl Error {
    pub fn decode(what: &'static str, reason: impl fmt::Display) -> Self {
        Error::Decode {
            what,
            reason: reason.to_string(),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Protocol(_) => "protocol_error",
            Error::Operation(_) => "operation_error",
            Error::IncorrectVerificationCode => "incorrect_verification_code",
            Error::UserCancelled => "user_cancelled",
            Error::FailedSecondaryAuth => "failed_secondary_auth",
            Error::Reconciliation(_) => "reconciliation_error",
            Error::Aggregate(_) => "aggregate_error",
            Error::Cancelled => "cancelled",
            Error::Transport(_) => "transport_error",
            Error::HttpStatus { .. } => "http_status",
            Error::Decode { .. } => "decode_error",
            Error::Storage(_) => "storage_error",
            Error::Crypto(_) => "crypto_error",
        }
    }

    /// Whether the caller can act on this error and try again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::IncorrectVerificationCode | Error::Transport(_) | Error::HttpStatus { .. }
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<plist::Error> for Error {
    fn from(e: plist::Error) -> Self {
        Error::decode("property list", e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::decode("JSON", e)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
