//! BitChat failure handling
//!
//! - [`error`]: the failure taxonomy and conversions into it
//! - [`dispatcher`]: records failures and routes them to handlers and listeners
//! - [`recovery`]: retry, circuit breaking, fallbacks and error rate limiting
//! - [`config`]: settings for all of the above, from TOML or the environment

pub mod cancel;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod recovery;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use config::BitchatConfig;
pub use dispatcher::{Dispatcher, HandleOptions};
pub use error::{
    BitChatError, BitChatResult, ErrorCategory, ErrorCode, ErrorContext, ErrorSeverity, RawError,
};
