// src/error.rs

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// A step of the publish-once sequence.
///
/// Carried by bus errors and timeouts so callers can tell a refused
/// connection from a failed send without parsing the description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    OpenLibrary,
    Connect,
    CreatePublisher,
    CreateMessage,
    SetField,
    Send,
    DestroyMessage,
    ClosePublisher,
    CloseRealm,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        let name = match self {
            Step::OpenLibrary => "open library",
            Step::Connect => "connect",
            Step::CreatePublisher => "create publisher",
            Step::CreateMessage => "create message",
            Step::SetField => "set field",
            Step::Send => "send",
            Step::DestroyMessage => "destroy message",
            Step::ClosePublisher => "close publisher",
            Step::CloseRealm => "close realm",
        };
        f.write_str(name)
    }
}

/// Error codes reported by the message bus.
///
/// Numeric values match the codes used by realm servers on the wire, so a
/// `refused` frame can be mapped back without a lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum ErrorCode {
    InvalidArgument,
    Timeout,
    NotInitialized,
    OsError,
    NotPermitted,
    NotFound,
    IllegalState,
    NotSupported,
    VersionMismatch,
    InvalidValue,
    InvalidType,
    InvalidFormat,
    ClientShutdown,
    ResourceUnavailable,
    LimitReached,
}

impl ErrorCode {
    /// Numeric wire value of this code.
    pub fn as_i32(self) -> i32 {
        // ---
        match self {
            ErrorCode::InvalidArgument => 1,
            ErrorCode::Timeout => 4,
            ErrorCode::NotInitialized => 5,
            ErrorCode::OsError => 6,
            ErrorCode::NotPermitted => 8,
            ErrorCode::NotFound => 9,
            ErrorCode::IllegalState => 10,
            ErrorCode::NotSupported => 11,
            ErrorCode::VersionMismatch => 13,
            ErrorCode::InvalidValue => 16,
            ErrorCode::InvalidType => 17,
            ErrorCode::InvalidFormat => 19,
            ErrorCode::ClientShutdown => 20,
            ErrorCode::ResourceUnavailable => 21,
            ErrorCode::LimitReached => 22,
        }
    }

    /// Whether a failure with this code may succeed if attempted again.
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorCode::Timeout | ErrorCode::ResourceUnavailable)
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.as_i32()
    }
}

impl TryFrom<i32> for ErrorCode {
    type Error = String;

    fn try_from(value: i32) -> std::result::Result<Self, Self::Error> {
        // ---
        let code = match value {
            1 => ErrorCode::InvalidArgument,
            4 => ErrorCode::Timeout,
            5 => ErrorCode::NotInitialized,
            6 => ErrorCode::OsError,
            8 => ErrorCode::NotPermitted,
            9 => ErrorCode::NotFound,
            10 => ErrorCode::IllegalState,
            11 => ErrorCode::NotSupported,
            13 => ErrorCode::VersionMismatch,
            16 => ErrorCode::InvalidValue,
            17 => ErrorCode::InvalidType,
            19 => ErrorCode::InvalidFormat,
            20 => ErrorCode::ClientShutdown,
            21 => ErrorCode::ResourceUnavailable,
            22 => ErrorCode::LimitReached,
            other => return Err(format!("unknown bus error code {other}")),
        };
        Ok(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?} ({})", self.as_i32())
    }
}

/// Errors that can occur while publishing or evaluating an activity.
#[derive(Error, Debug)]
pub enum PublishError {
    /// Activity input absent or not a string.
    #[error("missing or wrong-type input: {0}")]
    MissingOrWrongTypeInput(String),

    /// Endpoint string could not be interpreted.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Field name or value rejected before reaching the bus.
    #[error("invalid field {name:?}: {reason}")]
    InvalidField { name: String, reason: String },

    /// Required configuration missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    /// The message bus reported a failure.
    #[error("{step} failed: {code}: {description}")]
    Bus {
        step: Step,
        code: ErrorCode,
        description: String,
    },

    /// A bounded step did not complete in time.
    #[error("{step} timed out after {after:?}")]
    Timeout { step: Step, after: Duration },

    /// A blocking entry point was called from inside an async runtime.
    #[error("cannot block on an activity from within an async runtime")]
    BlockingInRuntime,

    /// Local I/O failure outside the bus protocol.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PublishError {
    /// Shorthand for a bus failure at `step`.
    pub fn bus(step: Step, code: ErrorCode, description: impl Into<String>) -> Self {
        // ---
        PublishError::Bus {
            step,
            code,
            description: description.into(),
        }
    }

    /// True for failures raised by the message bus or its transport.
    pub fn is_bus_error(&self) -> bool {
        matches!(self, PublishError::Bus { .. } | PublishError::Timeout { .. })
    }

    /// True for failures caused by the activity inputs.
    pub fn is_input_error(&self) -> bool {
        matches!(self, PublishError::MissingOrWrongTypeInput(_))
    }

    /// True when retrying the failed connect may succeed.
    pub fn is_retryable(&self) -> bool {
        // ---
        match self {
            PublishError::Bus {
                step: Step::Connect,
                code,
                ..
            } => code.is_transient(),
            PublishError::Timeout {
                step: Step::Connect,
                ..
            } => true,
            _ => false,
        }
    }

    /// Step at which a bus failure occurred, if any.
    pub fn step(&self) -> Option<Step> {
        // ---
        match self {
            PublishError::Bus { step, .. } | PublishError::Timeout { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Result type alias for publish operations
pub type Result<T> = std::result::Result<T, PublishError>;
