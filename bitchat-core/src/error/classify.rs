//! Side-effect free predicates over raw failures

use super::failure::{BitChatError, RawError};
use super::types::FailureKind;

/// Shown when nothing better is known about a failure
pub const GENERIC_USER_MESSAGE: &str = "An unexpected error occurred. Please try again.";

impl BitChatError {
    pub fn is_network_error(&self) -> bool {
        self.kind == FailureKind::Network
    }

    pub fn is_crypto_error(&self) -> bool {
        self.kind == FailureKind::Crypto
    }

    pub fn is_storage_error(&self) -> bool {
        self.kind == FailureKind::Storage
    }
}

/// Whether the value is already part of the taxonomy
pub fn is_bitchat_error(raw: &RawError) -> bool {
    raw.as_failure().is_some()
}

pub fn is_network_error(raw: &RawError) -> bool {
    raw.as_failure().is_some_and(BitChatError::is_network_error)
}

pub fn is_crypto_error(raw: &RawError) -> bool {
    raw.as_failure().is_some_and(BitChatError::is_crypto_error)
}

pub fn is_storage_error(raw: &RawError) -> bool {
    raw.as_failure().is_some_and(BitChatError::is_storage_error)
}

/// Only taxonomy values flagged recoverable count
pub fn is_recoverable_error(raw: &RawError) -> bool {
    raw.as_failure().is_some_and(BitChatError::is_recoverable)
}

/// Message that is safe to show to a person; never empty
pub fn get_user_message(raw: &RawError) -> String {
    let message = match raw {
        RawError::Failure(failure) => failure.user_message().to_string(),
        RawError::Native { error, .. } => match error.downcast_ref::<BitChatError>() {
            Some(failure) => failure.user_message().to_string(),
            None => error.to_string(),
        },
        RawError::Message(_) | RawError::Value(_) | RawError::Panic(_) => String::new(),
    };

    if message.trim().is_empty() {
        GENERIC_USER_MESSAGE.to_string()
    } else {
        message
    }
}
