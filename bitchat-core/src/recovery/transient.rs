//! Transient failure classification and backoff hints
//!
//! The hints are independent of the retry module's own backoff math; they
//! are meant for callers building their own retry policies.

use std::time::Duration;

use crate::config::defaults::{
    CONNECTION_BACKOFF_MS, DEFAULT_BACKOFF_MS, RATE_LIMIT_BACKOFF_MS, TIMEOUT_BACKOFF_MS,
};
use crate::error::{BitChatError, ErrorCategory, ErrorCode, RawError};

/// Whether the failure is expected to clear up on its own
pub fn is_transient_error(raw: &RawError) -> bool {
    if raw.code().is_some_and(|code| code.is_transient()) {
        return true;
    }
    raw.as_failure().is_some_and(|failure| {
        matches!(
            failure.category(),
            ErrorCategory::Network | ErrorCategory::Sync
        )
    })
}

/// Only rate limiting asks callers to back off explicitly
pub fn should_backoff(raw: &RawError) -> bool {
    raw.code() == Some(ErrorCode::RateLimited)
}

/// Suggested wait before trying again
pub fn get_backoff_time(raw: &RawError) -> Duration {
    backoff_hint(raw.code().unwrap_or(ErrorCode::Unknown))
}

/// Suggested wait for a code
pub fn backoff_hint(code: ErrorCode) -> Duration {
    let millis = match code {
        ErrorCode::RateLimited => RATE_LIMIT_BACKOFF_MS,
        ErrorCode::Timeout | ErrorCode::ConnectionTimeout | ErrorCode::SyncTimeout => {
            TIMEOUT_BACKOFF_MS
        }
        ErrorCode::ConnectionFailed
        | ErrorCode::ConnectionRefused
        | ErrorCode::RelayUnavailable
        | ErrorCode::PeerUnreachable
        | ErrorCode::NetworkOffline => CONNECTION_BACKOFF_MS,
        _ => DEFAULT_BACKOFF_MS,
    };
    Duration::from_millis(millis)
}

impl BitChatError {
    /// See [`is_transient_error`]
    pub fn is_transient(&self) -> bool {
        self.code().is_transient()
            || matches!(self.category(), ErrorCategory::Network | ErrorCategory::Sync)
    }

    /// See [`get_backoff_time`]
    pub fn backoff_time(&self) -> Duration {
        backoff_hint(self.code())
    }
}
