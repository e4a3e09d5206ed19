//! Structured failures for BitChat
//!
//! Every failure that crosses a component boundary is a [`BitChatError`]:
//! a diagnostic message plus a numeric [`ErrorCode`], an [`ErrorCategory`]
//! derived from it, an [`ErrorSeverity`], a recoverable flag and a separate
//! user-facing message.
//!
//! ## Codes
//!
//! ```text
//! 1xxx generic    2xxx network    3xxx crypto
//! 4xxx storage    5xxx identity   6xxx protocol
//! 7xxx sync       8xxx channel    9xxx platform
//! ```
//!
//! ## Wrapping
//!
//! Anything that can go wrong is first lifted into a [`RawError`] and then
//! converted with [`BitChatError::from_raw`]. The conversion is total and
//! idempotent: taxonomy values come back unchanged, everything else keeps
//! its message and is preserved as a [`ForeignError`] cause.
//!
//! ```
//! use bitchat_core::error::{BitChatError, ErrorCategory, ErrorCode};
//!
//! let err = BitChatError::connection_failed("wss://relay.example")
//!     .with_component("relay")
//!     .with_operation("connect");
//!
//! assert_eq!(err.code(), ErrorCode::ConnectionFailed);
//! assert_eq!(err.category(), ErrorCategory::Network);
//! assert!(err.is_recoverable());
//! ```

pub mod classify;
pub mod codes;
pub mod constructors;
pub mod failure;
pub mod serialized;
pub mod types;

pub use classify::{
    get_user_message, is_bitchat_error, is_crypto_error, is_network_error, is_recoverable_error,
    is_storage_error, GENERIC_USER_MESSAGE,
};
pub use codes::{ErrorCode, TRANSIENT_CODES};
pub use failure::{BitChatError, BitChatResult, ErrorCause, ForeignError, RawError, WrapOptions};
pub use serialized::SerializedFailure;
pub use types::{
    host_user_agent, ErrorCategory, ErrorContext, ErrorSeverity, FailureKind, MAX_STACK_FRAMES,
};
