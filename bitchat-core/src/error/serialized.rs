//! JSON-safe projection of [`BitChatError`] used for logs and export

use serde::{Deserialize, Serialize};

use super::codes::ErrorCode;
use super::failure::{BitChatError, BitChatResult, ErrorCause, ForeignError};
use super::types::{ErrorCategory, ErrorContext, ErrorSeverity, FailureKind};

/// Plain data form of a failure; the cause chain is serialized recursively
///
/// Call frames are not part of the projection and are lost on a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedFailure {
    pub name: String,
    pub message: String,
    pub code: ErrorCode,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub context: ErrorContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<SerializedFailure>>,
    pub recoverable: bool,
    pub user_message: String,
}

impl SerializedFailure {
    fn from_foreign(foreign: &ForeignError, context: &ErrorContext) -> Self {
        Self {
            name: foreign.name.clone(),
            message: foreign.message.clone(),
            code: ErrorCode::Unknown,
            category: ErrorCategory::Generic,
            severity: ErrorSeverity::Error,
            context: ErrorContext {
                stack: Vec::new(),
                ..context.clone()
            },
            cause: None,
            recoverable: false,
            user_message: ErrorCode::Unknown.default_user_message().to_string(),
        }
    }

    /// Whether this entry describes a taxonomy value rather than a foreign error
    pub fn is_taxonomy(&self) -> bool {
        is_taxonomy_name(&self.name)
    }
}

fn is_taxonomy_name(name: &str) -> bool {
    FailureKind::from_name(name) != FailureKind::Base || name == FailureKind::Base.name()
}

impl From<&BitChatError> for SerializedFailure {
    fn from(failure: &BitChatError) -> Self {
        let cause = failure.cause.as_deref().map(|cause| {
            Box::new(match cause {
                ErrorCause::Failure(inner) => SerializedFailure::from(inner),
                ErrorCause::Foreign(foreign) => {
                    SerializedFailure::from_foreign(foreign, &failure.context)
                }
            })
        });

        Self {
            name: failure.kind.name().to_string(),
            message: failure.message.clone(),
            code: failure.code,
            category: failure.category,
            severity: failure.severity,
            context: ErrorContext {
                stack: Vec::new(),
                ..failure.context.clone()
            },
            cause,
            recoverable: failure.recoverable,
            user_message: failure.user_message.clone(),
        }
    }
}

impl From<BitChatError> for SerializedFailure {
    fn from(failure: BitChatError) -> Self {
        SerializedFailure::from(&failure)
    }
}

impl From<SerializedFailure> for BitChatError {
    fn from(serialized: SerializedFailure) -> Self {
        let cause = serialized.cause.map(|cause| {
            let cause = *cause;
            Box::new(if cause.is_taxonomy() {
                ErrorCause::Failure(BitChatError::from(cause))
            } else {
                ErrorCause::Foreign(ForeignError::new(cause.name, cause.message))
            })
        });

        let message = if serialized.message.trim().is_empty() {
            serialized.code.default_user_message().to_string()
        } else {
            serialized.message
        };
        let user_message = if serialized.user_message.trim().is_empty() {
            serialized.code.default_user_message().to_string()
        } else {
            serialized.user_message
        };

        BitChatError {
            kind: FailureKind::from_name(&serialized.name),
            message,
            code: serialized.code,
            category: serialized.category,
            severity: serialized.severity,
            recoverable: serialized.recoverable,
            user_message,
            cause,
            context: serialized.context,
        }
    }
}

impl BitChatError {
    /// Project into the plain serialized form
    pub fn to_serialized(&self) -> SerializedFailure {
        SerializedFailure::from(self)
    }

    /// Rebuild a failure from its serialized form
    pub fn from_serialized(serialized: SerializedFailure) -> Self {
        BitChatError::from(serialized)
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> BitChatResult<String> {
        Ok(serde_json::to_string(&self.to_serialized())?)
    }

    /// Parse a failure previously produced by [`BitChatError::to_json`]
    pub fn from_json(json: &str) -> BitChatResult<Self> {
        let serialized: SerializedFailure = serde_json::from_str(json)?;
        Ok(BitChatError::from_serialized(serialized))
    }
}
