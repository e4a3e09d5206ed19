//! The structured failure value and total conversion from arbitrary errors

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::time::Duration;
use thiserror::Error;

use super::codes::ErrorCode;
use super::serialized::SerializedFailure;
use super::types::{ErrorCategory, ErrorContext, ErrorSeverity, FailureKind};

/// Result alias used throughout the crate
pub type BitChatResult<T> = std::result::Result<T, BitChatError>;

/// Structured failure carrying a code, category, severity and context
///
/// Construction never panics. A failure always has a non-empty diagnostic
/// `message` and a separate `user_message` that is safe to show to people.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(into = "SerializedFailure", from = "SerializedFailure")]
#[error("{message}")]
pub struct BitChatError {
    pub(crate) kind: FailureKind,
    pub(crate) message: String,
    pub(crate) code: ErrorCode,
    pub(crate) category: ErrorCategory,
    pub(crate) severity: ErrorSeverity,
    pub(crate) recoverable: bool,
    pub(crate) user_message: String,
    #[source]
    pub(crate) cause: Option<Box<ErrorCause>>,
    pub(crate) context: ErrorContext,
}

/// What a failure wraps
#[derive(Debug, Clone, Error)]
pub enum ErrorCause {
    #[error(transparent)]
    Failure(BitChatError),
    #[error(transparent)]
    Foreign(ForeignError),
}

/// Snapshot of an error that is not part of the taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ForeignError {
    /// Short type name of the original error
    pub name: String,
    /// The original error's message
    pub message: String,
}

impl ForeignError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    fn from_error(name: &str, error: &(dyn std::error::Error + 'static)) -> Self {
        Self::new(name, error.to_string())
    }
}

/// Any failure shape that can reach the dispatcher
///
/// Conversion into [`BitChatError`] via [`BitChatError::from_raw`] is total.
#[derive(Debug)]
pub enum RawError {
    /// Already part of the taxonomy
    Failure(BitChatError),
    /// A regular Rust error
    Native {
        name: &'static str,
        error: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    /// A bare message
    Message(String),
    /// An arbitrary structured value
    Value(serde_json::Value),
    /// The payload of a caught panic
    Panic(String),
}

impl RawError {
    /// Wrap any error type, remembering its short type name
    pub fn native<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RawError::Native {
            name: short_type_name::<E>(),
            error: Box::new(error),
        }
    }

    /// Convert a panic payload as returned by `catch_unwind` or a `JoinError`
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "Unknown panic".to_string()
        };
        RawError::Panic(message)
    }

    /// Code carried by the value, if any
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            RawError::Failure(failure) => Some(failure.code),
            RawError::Native { error, .. } => error
                .downcast_ref::<BitChatError>()
                .map(|f| f.code)
                .or_else(|| error.downcast_ref::<std::io::Error>().map(io_error_code)),
            RawError::Value(value) => value
                .get("code")
                .and_then(|c| c.as_u64())
                .and_then(|c| u16::try_from(c).ok())
                .and_then(ErrorCode::from_u16),
            RawError::Message(_) | RawError::Panic(_) => None,
        }
    }

    /// The taxonomy value, if this is one
    pub fn as_failure(&self) -> Option<&BitChatError> {
        match self {
            RawError::Failure(failure) => Some(failure),
            RawError::Native { error, .. } => error.downcast_ref::<BitChatError>(),
            _ => None,
        }
    }
}

impl From<BitChatError> for RawError {
    fn from(failure: BitChatError) -> Self {
        RawError::Failure(failure)
    }
}

impl From<String> for RawError {
    fn from(message: String) -> Self {
        RawError::Message(message)
    }
}

impl From<&str> for RawError {
    fn from(message: &str) -> Self {
        RawError::Message(message.to_string())
    }
}

impl From<serde_json::Value> for RawError {
    fn from(value: serde_json::Value) -> Self {
        RawError::Value(value)
    }
}

impl From<std::io::Error> for RawError {
    fn from(error: std::io::Error) -> Self {
        RawError::native(error)
    }
}

impl From<serde_json::Error> for RawError {
    fn from(error: serde_json::Error) -> Self {
        RawError::native(error)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync + 'static>> for RawError {
    fn from(error: Box<dyn std::error::Error + Send + Sync + 'static>) -> Self {
        RawError::Native {
            name: "Error",
            error,
        }
    }
}

/// Overrides applied when wrapping a foreign error
#[derive(Debug, Clone, Default)]
pub struct WrapOptions {
    pub code: Option<ErrorCode>,
    pub category: Option<ErrorCategory>,
    pub severity: Option<ErrorSeverity>,
    pub recoverable: Option<bool>,
    pub user_message: Option<String>,
    pub context: Option<ErrorContext>,
}

impl WrapOptions {
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = Some(recoverable);
        self
    }

    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.user_message = Some(message.into());
        self
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }
}

impl BitChatError {
    /// Create a base failure with defaults derived from `code`
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_kind(FailureKind::Base, code, message, ErrorSeverity::Error, false)
    }

    pub(crate) fn with_kind(
        kind: FailureKind,
        code: ErrorCode,
        message: impl Into<String>,
        severity: ErrorSeverity,
        recoverable: bool,
    ) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = code.default_user_message().to_string();
        }

        Self {
            kind,
            message,
            code,
            category: code.category(),
            severity,
            recoverable,
            user_message: code.default_user_message().to_string(),
            cause: None,
            context: ErrorContext::new().capture_stack(),
        }
    }

    /// Wrap any raw failure; taxonomy values pass through unchanged
    pub fn from_raw(raw: impl Into<RawError>) -> Self {
        Self::from_error(raw, WrapOptions::default())
    }

    /// Wrap any raw failure, applying `options` to foreign values
    ///
    /// Taxonomy values are returned unchanged. Foreign values keep their
    /// message and are preserved as the cause.
    pub fn from_error(raw: impl Into<RawError>, options: WrapOptions) -> Self {
        match raw.into() {
            RawError::Failure(failure) => failure,
            RawError::Native { name, error } => match error.downcast::<BitChatError>() {
                Ok(failure) => *failure,
                Err(error) => {
                    let inferred = error
                        .downcast_ref::<std::io::Error>()
                        .map(io_error_code)
                        .unwrap_or(ErrorCode::Unknown);
                    let cause = ForeignError::from_error(name, error.as_ref());
                    Self::wrap_foreign(error.to_string(), Some(cause), inferred, options)
                }
            },
            RawError::Message(message) => {
                let cause = ForeignError::new("String", message.clone());
                Self::wrap_foreign(message, Some(cause), ErrorCode::Unknown, options)
            }
            RawError::Value(value) => {
                let message = value
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string());
                let inferred = RawError::Value(value.clone()).code().unwrap_or(ErrorCode::Unknown);
                let cause = ForeignError::new("Object", value.to_string());
                Self::wrap_foreign(message, Some(cause), inferred, options)
            }
            RawError::Panic(message) => {
                let cause = ForeignError::new("Panic", message.clone());
                Self::wrap_foreign(message, Some(cause), ErrorCode::Unknown, options)
            }
        }
    }

    fn wrap_foreign(
        message: String,
        cause: Option<ForeignError>,
        inferred: ErrorCode,
        options: WrapOptions,
    ) -> Self {
        let code = options.code.unwrap_or(inferred);
        let mut failure = Self::new(code, message);
        if let Some(category) = options.category {
            failure.category = category;
        }
        if let Some(severity) = options.severity {
            failure.severity = severity;
        }
        failure.recoverable = options.recoverable.unwrap_or_else(|| code.is_transient());
        if let Some(user_message) = options.user_message {
            failure = failure.with_user_message(user_message);
        }
        if let Some(context) = options.context {
            failure.context = failure.context.merge(context);
        }
        failure.cause = cause.map(|c| Box::new(ErrorCause::Foreign(c)));
        failure
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Serialized type name, e.g. `NetworkError`
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_deref()
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Enrich the context in place
    pub fn enrich_context(&mut self, context: ErrorContext) {
        let current = std::mem::take(&mut self.context);
        self.context = current.merge(context);
    }

    pub(crate) fn context_mut(&mut self) -> &mut ErrorContext {
        &mut self.context
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.enrich_context(context);
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.context.component = Some(component.into());
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context = std::mem::take(&mut self.context).with_data(key, value);
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.context.session_id = Some(session_id.into());
        self
    }

    /// Replace the user-facing message; empty strings keep the default
    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        if !message.trim().is_empty() {
            self.user_message = message;
        }
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }

    /// Wrap another failure as the cause
    pub fn with_cause(mut self, cause: BitChatError) -> Self {
        self.cause = Some(Box::new(ErrorCause::Failure(cause)));
        self
    }

    /// Wrap a foreign error as the cause
    pub fn with_foreign_cause<E>(mut self, cause: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        self.cause = Some(Box::new(ErrorCause::Foreign(ForeignError::from_error(
            short_type_name::<E>(),
            cause,
        ))));
        self
    }

    /// The innermost taxonomy failure in the cause chain, or `self`
    pub fn root_cause(&self) -> &BitChatError {
        let mut current = self;
        while let Some(ErrorCause::Failure(inner)) = current.cause.as_deref() {
            current = inner;
        }
        current
    }

    /// One-line description used by the console transport
    pub fn log_line(&self) -> String {
        let mut line = format!(
            "[{}] [{}/{}] {}",
            self.severity, self.category, self.code, self.message
        );
        if let Some(component) = &self.context.component {
            line.push_str(&format!(" in {}", component));
        }
        if let Some(operation) = &self.context.operation {
            line.push_str(&format!(" during {}", operation));
        }
        line
    }

    /// Retry-after hint stored by rate-limit constructors
    pub fn retry_after(&self) -> Option<Duration> {
        self.context
            .data_value("retryAfterMs")
            .and_then(|v| v.as_u64())
            .map(Duration::from_millis)
    }
}

impl PartialEq for BitChatError {
    fn eq(&self, other: &Self) -> bool {
        SerializedFailure::from(self) == SerializedFailure::from(other)
    }
}

impl From<std::io::Error> for BitChatError {
    fn from(error: std::io::Error) -> Self {
        BitChatError::from_raw(error)
    }
}

impl From<serde_json::Error> for BitChatError {
    fn from(error: serde_json::Error) -> Self {
        BitChatError::from_error(
            error,
            WrapOptions::default().with_code(ErrorCode::DecodeFailed),
        )
    }
}

fn io_error_code(error: &std::io::Error) -> ErrorCode {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::TimedOut => ErrorCode::ConnectionTimeout,
        ErrorKind::ConnectionRefused => ErrorCode::ConnectionRefused,
        ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected
        | ErrorKind::BrokenPipe => ErrorCode::ConnectionFailed,
        ErrorKind::AddrNotAvailable => ErrorCode::NetworkOffline,
        ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
        ErrorKind::NotFound => ErrorCode::ReadFailed,
        ErrorKind::WouldBlock => ErrorCode::StorageLocked,
        ErrorKind::InvalidInput => ErrorCode::InvalidArgument,
        ErrorKind::InvalidData | ErrorKind::UnexpectedEof => ErrorCode::DecodeFailed,
        ErrorKind::Unsupported => ErrorCode::NotSupported,
        _ => ErrorCode::Unknown,
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}
