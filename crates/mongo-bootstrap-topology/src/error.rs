//! Error types for replica set initialization.

use mongodb::error::ErrorKind;
use mongo_bootstrap_core::CoreError;

/// Result type for topology operations.
pub type Result<T> = std::result::Result<T, TopologyError>;

/// Server error codes that mean "not ready yet" rather than "will never work".
///
/// Host lookup and network failures, an uninitialized set, shutdown or step-down in
/// progress, and members that are not yet primary or secondary.
pub const TRANSIENT_CODES: &[i32] = &[
    6,     // HostUnreachable
    7,     // HostNotFound
    89,    // NetworkTimeout
    91,    // ShutdownInProgress
    94,    // NotYetInitialized
    189,   // PrimarySteppedDown
    9001,  // SocketException
    10107, // NotWritablePrimary
    11600, // InterruptedAtShutdown
    13435, // NotPrimaryNoSecondaryOk
    13436, // NotPrimaryOrSecondary
];

/// Whether a failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The cluster is unreachable or still electing; try again later.
    Transient,
    /// Retrying will not help (bad config, auth failure, ...).
    Permanent,
}

/// Errors that can occur while initiating or polling a replica set.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    /// The membership descriptor is invalid.
    #[error(transparent)]
    InvalidConfig(#[from] CoreError),

    /// The server answered a command with an error.
    #[error("{command} failed with code {code} ({code_name}): {message}")]
    Command {
        /// The administrative command.
        command: String,
        /// Server error code.
        code: i32,
        /// Symbolic name of the code.
        code_name: String,
        /// Server message.
        message: String,
    },

    /// Connection, server selection or other driver failure.
    #[error("driver error: {0}")]
    Driver(mongodb::error::Error),
}

impl TopologyError {
    /// Wrap a driver error raised by `command`, lifting server command errors out.
    #[must_use]
    pub fn from_driver(command: &str, err: mongodb::error::Error) -> Self {
        if let ErrorKind::Command(ref failure) = *err.kind {
            return Self::Command {
                command: command.to_string(),
                code: failure.code,
                code_name: failure.code_name.clone(),
                message: failure.message.clone(),
            };
        }
        Self::Driver(err)
    }

    /// Classify the failure for the readiness poll.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidConfig(_) => ErrorClass::Permanent,
            Self::Command { code, .. } => classify_code(*code),
            Self::Driver(err) => match *err.kind {
                ErrorKind::Io(_)
                | ErrorKind::ServerSelection { .. }
                | ErrorKind::ConnectionPoolCleared { .. } => ErrorClass::Transient,
                ErrorKind::Command(ref failure) => classify_code(failure.code),
                _ => ErrorClass::Permanent,
            },
        }
    }

    /// Shorthand for `class() == ErrorClass::Transient`.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

impl From<mongodb::error::Error> for TopologyError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Driver(err)
    }
}

/// Classify a server error code.
#[must_use]
pub fn classify_code(code: i32) -> ErrorClass {
    if TRANSIENT_CODES.contains(&code) {
        ErrorClass::Transient
    } else {
        ErrorClass::Permanent
    }
}
