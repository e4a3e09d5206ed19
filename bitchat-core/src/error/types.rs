//! Categories, severities and the structured context attached to failures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Maximum number of call frames kept in an [`ErrorContext`]
pub const MAX_STACK_FRAMES: usize = 10;

/// Coarse grouping of error codes used for routing and statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Generic,
    Network,
    Crypto,
    Storage,
    Identity,
    Protocol,
    Sync,
    Channel,
    Platform,
}

impl ErrorCategory {
    /// Every category, in declaration order
    pub const ALL: [ErrorCategory; 9] = [
        ErrorCategory::Generic,
        ErrorCategory::Network,
        ErrorCategory::Crypto,
        ErrorCategory::Storage,
        ErrorCategory::Identity,
        ErrorCategory::Protocol,
        ErrorCategory::Sync,
        ErrorCategory::Channel,
        ErrorCategory::Platform,
    ];

    /// Get the display name for the category
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCategory::Generic => "generic",
            ErrorCategory::Network => "network",
            ErrorCategory::Crypto => "crypto",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Identity => "identity",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Sync => "sync",
            ErrorCategory::Channel => "channel",
            ErrorCategory::Platform => "platform",
        }
    }

    /// Parse a category from its display name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Severity of a failure; ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Informational, nothing is broken
    Info,
    /// Degraded but the operation can continue
    Warning,
    /// The operation failed
    Error,
    /// The failure blocks the user
    Critical,
}

impl ErrorSeverity {
    /// Every severity, least severe first
    pub const ALL: [ErrorSeverity; 4] = [
        ErrorSeverity::Info,
        ErrorSeverity::Warning,
        ErrorSeverity::Error,
        ErrorSeverity::Critical,
    ];

    /// Lowercase name used as a statistics key
    pub fn name(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "info",
            ErrorSeverity::Warning => "warning",
            ErrorSeverity::Error => "error",
            ErrorSeverity::Critical => "critical",
        }
    }

    /// Whether a failure of this severity blocks the user
    pub fn is_blocking(&self) -> bool {
        *self == ErrorSeverity::Critical
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Which constructor family produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    Base,
    Network,
    Crypto,
    Storage,
    Identity,
    Protocol,
    Sync,
    Channel,
    PlatformIntegration,
}

impl FailureKind {
    /// Name recorded in serialized failures
    pub fn name(&self) -> &'static str {
        match self {
            FailureKind::Base => "BitChatError",
            FailureKind::Network => "NetworkError",
            FailureKind::Crypto => "CryptoError",
            FailureKind::Storage => "StorageError",
            FailureKind::Identity => "IdentityError",
            FailureKind::Protocol => "ProtocolError",
            FailureKind::Sync => "SyncError",
            FailureKind::Channel => "ChannelError",
            FailureKind::PlatformIntegration => "PlatformIntegrationError",
        }
    }

    /// Inverse of [`FailureKind::name`]; unknown names map to `Base`
    pub fn from_name(name: &str) -> Self {
        match name {
            "NetworkError" => FailureKind::Network,
            "CryptoError" => FailureKind::Crypto,
            "StorageError" => FailureKind::Storage,
            "IdentityError" => FailureKind::Identity,
            "ProtocolError" => FailureKind::Protocol,
            "SyncError" => FailureKind::Sync,
            "ChannelError" => FailureKind::Channel,
            "PlatformIntegrationError" => FailureKind::PlatformIntegration,
            _ => FailureKind::Base,
        }
    }
}

/// Structured context attached to every failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    /// Component where the failure originated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Operation that was running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Sanitized diagnostic data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, serde_json::Value>>,
    /// Host description, analogous to a user agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// When the context was created
    pub timestamp: DateTime<Utc>,
    /// Session that observed the failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Parsed call frames; never serialized
    #[serde(skip)]
    pub stack: Vec<String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            component: None,
            operation: None,
            data: None,
            user_agent: Some(host_user_agent()),
            timestamp: Utc::now(),
            session_id: None,
            stack: Vec::new(),
        }
    }
}

impl ErrorContext {
    /// Create an empty context stamped with the current time
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context for a component and operation
    pub fn for_operation(component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            component: Some(component.into()),
            operation: Some(operation.into()),
            ..Self::default()
        }
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Add a single data entry
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Look up a data entry
    pub fn data_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.as_ref().and_then(|data| data.get(key))
    }

    /// Merge `other` into this context; fields present in `other` win and
    /// data bags are merged key by key
    pub fn merge(mut self, other: ErrorContext) -> Self {
        if other.component.is_some() {
            self.component = other.component;
        }
        if other.operation.is_some() {
            self.operation = other.operation;
        }
        if other.user_agent.is_some() {
            self.user_agent = other.user_agent;
        }
        if other.session_id.is_some() {
            self.session_id = other.session_id;
        }
        if let Some(data) = other.data {
            let merged = self.data.get_or_insert_with(BTreeMap::new);
            merged.extend(data);
        }
        if !other.stack.is_empty() {
            self.stack = other.stack;
        }
        self
    }

    /// Capture call frames if backtraces are enabled for this process
    pub(crate) fn capture_stack(mut self) -> Self {
        self.stack = capture_frames();
        self
    }
}

/// Host description in the spirit of a browser user agent
pub fn host_user_agent() -> String {
    format!(
        "bitchat-core/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

fn capture_frames() -> Vec<String> {
    let backtrace = std::backtrace::Backtrace::capture();
    if backtrace.status() != std::backtrace::BacktraceStatus::Captured {
        return Vec::new();
    }

    backtrace
        .to_string()
        .lines()
        .filter_map(|line| {
            let (index, symbol) = line.trim().split_once(": ")?;
            index.parse::<usize>().ok()?;
            Some(symbol.to_string())
        })
        .filter(|symbol| {
            !symbol.starts_with("std::backtrace")
                && !symbol.starts_with("bitchat_core::error::")
        })
        .take(MAX_STACK_FRAMES)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
        assert!(ErrorSeverity::Critical.is_blocking());
        assert!(!ErrorSeverity::Error.is_blocking());
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(ErrorCategory::parse("Network"), Some(ErrorCategory::Network));
        assert_eq!(ErrorCategory::parse(" sync "), Some(ErrorCategory::Sync));
        assert_eq!(ErrorCategory::parse("bogus"), None);
    }

    #[test]
    fn test_failure_kind_names_round_trip() {
        for kind in [
            FailureKind::Base,
            FailureKind::Network,
            FailureKind::Crypto,
            FailureKind::Storage,
            FailureKind::Identity,
            FailureKind::Protocol,
            FailureKind::Sync,
            FailureKind::Channel,
            FailureKind::PlatformIntegration,
        ] {
            assert_eq!(FailureKind::from_name(kind.name()), kind);
        }
        assert_eq!(FailureKind::from_name("TypeError"), FailureKind::Base);
    }

    #[test]
    fn test_context_merge() {
        let base = ErrorContext::for_operation("relay", "connect")
            .with_data("attempt", serde_json::json!(1))
            .with_data("url", serde_json::json!("wss://a"));
        let overlay = ErrorContext {
            operation: Some("reconnect".to_string()),
            ..ErrorContext::new()
        }
        .with_data("attempt", serde_json::json!(2));

        let merged = base.merge(overlay);
        assert_eq!(merged.component.as_deref(), Some("relay"));
        assert_eq!(merged.operation.as_deref(), Some("reconnect"));
        assert_eq!(merged.data_value("attempt"), Some(&serde_json::json!(2)));
        assert_eq!(merged.data_value("url"), Some(&serde_json::json!("wss://a")));
    }

    #[test]
    fn test_stack_is_bounded() {
        let context = ErrorContext::new().capture_stack();
        assert!(context.stack.len() <= MAX_STACK_FRAMES);
    }
}
