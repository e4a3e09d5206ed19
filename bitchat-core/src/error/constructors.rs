//! Constructor families and named factories for common failures
//!
//! Each family (`network`, `crypto`, ...) fills in the defaults appropriate for
//! its domain. The named factories below cover the failures that occur often
//! enough to deserve a name at the call site.

use serde_json::json;
use std::time::Duration;

use super::codes::ErrorCode;
use super::failure::BitChatError;
use super::types::{ErrorSeverity, FailureKind};

impl BitChatError {
    /// Network failure; recoverable by default
    pub fn network(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_kind(FailureKind::Network, code, message, ErrorSeverity::Error, true)
    }

    /// Cryptographic failure; never recoverable by default
    pub fn crypto(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_kind(FailureKind::Crypto, code, message, ErrorSeverity::Error, false)
    }

    /// Local storage failure
    pub fn storage(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_kind(FailureKind::Storage, code, message, ErrorSeverity::Error, false)
    }

    /// Identity failure; these block the user until resolved
    pub fn identity(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_kind(FailureKind::Identity, code, message, ErrorSeverity::Critical, false)
    }

    /// Wire protocol failure, usually caused by a misbehaving peer
    pub fn protocol(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_kind(FailureKind::Protocol, code, message, ErrorSeverity::Warning, false)
    }

    /// Synchronization failure; recoverable by default
    pub fn sync(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_kind(FailureKind::Sync, code, message, ErrorSeverity::Warning, true)
    }

    /// Channel membership or access failure
    pub fn channel(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_kind(FailureKind::Channel, code, message, ErrorSeverity::Warning, false)
    }

    /// Failure in an integration with the host platform
    pub fn platform(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_kind(
            FailureKind::PlatformIntegration,
            code,
            message,
            ErrorSeverity::Warning,
            false,
        )
    }

    // Generic

    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(
            ErrorCode::InvalidArgument,
            format!("Invalid argument '{}': {}", field, message.into()),
        )
        .with_data("field", json!(field))
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, message)
    }

    /// An operation exceeded its deadline
    pub fn timed_out(operation: impl Into<String>, after: Duration) -> Self {
        let operation = operation.into();
        Self::new(
            ErrorCode::Timeout,
            format!("Operation '{}' timed out after {:?}", operation, after),
        )
        .with_recoverable(true)
        .with_operation(operation)
        .with_data("timeoutMs", json!(after.as_millis() as u64))
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        Self::new(
            ErrorCode::Cancelled,
            format!("Operation '{}' was cancelled", operation),
        )
        .with_severity(ErrorSeverity::Info)
        .with_operation(operation)
    }

    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        let component = component.into();
        Self::new(
            ErrorCode::Configuration,
            format!("Configuration error in {}: {}", component, message.into()),
        )
        .with_component(component)
    }

    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::NotImplemented,
            format!("Feature not implemented: {}", feature.into()),
        )
    }

    // Network

    pub fn offline() -> Self {
        Self::network(ErrorCode::NetworkOffline, "Network is offline")
            .with_severity(ErrorSeverity::Warning)
    }

    pub fn network_timeout(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        Self::network(
            ErrorCode::ConnectionTimeout,
            format!("Network operation '{}' timed out", operation),
        )
        .with_operation(operation)
    }

    pub fn connection_failed(target: impl Into<String>) -> Self {
        let target = target.into();
        Self::network(
            ErrorCode::ConnectionFailed,
            format!("Connection to {} failed", target),
        )
        .with_data("target", json!(target))
    }

    pub fn relay_unavailable(relay: impl Into<String>) -> Self {
        let relay = relay.into();
        Self::network(
            ErrorCode::RelayUnavailable,
            format!("Relay {} is unavailable", relay),
        )
        .with_severity(ErrorSeverity::Warning)
        .with_data("relay", json!(relay))
    }

    pub fn peer_unreachable(peer: impl Into<String>) -> Self {
        let peer = peer.into();
        Self::network(
            ErrorCode::PeerUnreachable,
            format!("Peer {} is unreachable", peer),
        )
        .with_data("peer", json!(peer))
    }

    /// The remote side throttled us; `retry_after` is kept as a hint
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        let failure = Self::network(ErrorCode::RateLimited, "Rate limit exceeded")
            .with_severity(ErrorSeverity::Warning);
        match retry_after {
            Some(after) => failure.with_data("retryAfterMs", json!(after.as_millis() as u64)),
            None => failure,
        }
    }

    // Crypto

    pub fn key_generation_failed(reason: impl Into<String>) -> Self {
        Self::crypto(
            ErrorCode::KeyGenerationFailed,
            format!("Key generation failed: {}", reason.into()),
        )
        .with_severity(ErrorSeverity::Critical)
    }

    pub fn encryption_failed(reason: impl Into<String>) -> Self {
        Self::crypto(
            ErrorCode::EncryptionFailed,
            format!("Encryption failed: {}", reason.into()),
        )
    }

    pub fn decryption_failed(reason: impl Into<String>) -> Self {
        Self::crypto(
            ErrorCode::DecryptionFailed,
            format!("Decryption failed: {}", reason.into()),
        )
    }

    pub fn invalid_signature() -> Self {
        Self::crypto(ErrorCode::InvalidSignature, "Signature verification failed")
    }

    pub fn key_exchange_failed(peer: impl Into<String>) -> Self {
        let peer = peer.into();
        Self::crypto(
            ErrorCode::KeyExchangeFailed,
            format!("Key exchange with {} failed", peer),
        )
        .with_recoverable(true)
        .with_data("peer", json!(peer))
    }

    // Storage

    pub fn storage_unavailable(reason: impl Into<String>) -> Self {
        Self::storage(
            ErrorCode::StorageUnavailable,
            format!("Storage unavailable: {}", reason.into()),
        )
        .with_recoverable(true)
    }

    pub fn quota_exceeded() -> Self {
        Self::storage(ErrorCode::QuotaExceeded, "Storage quota exceeded")
    }

    pub fn read_failed(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::storage(ErrorCode::ReadFailed, format!("Failed to read '{}'", key))
            .with_data("key", json!(key))
    }

    pub fn write_failed(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::storage(ErrorCode::WriteFailed, format!("Failed to write '{}'", key))
            .with_data("key", json!(key))
    }

    pub fn storage_corrupted(reason: impl Into<String>) -> Self {
        Self::storage(
            ErrorCode::StorageCorrupted,
            format!("Storage corrupted: {}", reason.into()),
        )
        .with_severity(ErrorSeverity::Critical)
    }

    pub fn storage_locked(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self::storage(
            ErrorCode::StorageLocked,
            format!("Storage resource '{}' is locked", resource),
        )
        .with_severity(ErrorSeverity::Warning)
        .with_recoverable(true)
    }

    // Identity

    pub fn identity_not_found() -> Self {
        Self::identity(ErrorCode::IdentityNotFound, "No identity found")
    }

    pub fn identity_corrupted(reason: impl Into<String>) -> Self {
        Self::identity(
            ErrorCode::IdentityCorrupted,
            format!("Identity corrupted: {}", reason.into()),
        )
    }

    pub fn fingerprint_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        let expected = expected.into();
        let actual = actual.into();
        Self::identity(
            ErrorCode::FingerprintMismatch,
            format!("Fingerprint mismatch: expected {}, got {}", expected, actual),
        )
        .with_data("expected", json!(expected))
        .with_data("actual", json!(actual))
    }

    // Protocol

    pub fn invalid_message(reason: impl Into<String>) -> Self {
        Self::protocol(
            ErrorCode::InvalidMessage,
            format!("Invalid message: {}", reason.into()),
        )
    }

    pub fn unsupported_version(version: u32) -> Self {
        Self::protocol(
            ErrorCode::UnsupportedVersion,
            format!("Unsupported protocol version {}", version),
        )
        .with_data("version", json!(version))
    }

    pub fn message_too_large(size: usize, max: usize) -> Self {
        Self::protocol(
            ErrorCode::MessageTooLarge,
            format!("Message of {} bytes exceeds limit of {} bytes", size, max),
        )
        .with_data("size", json!(size))
        .with_data("max", json!(max))
    }

    // Sync

    pub fn sync_failed(reason: impl Into<String>) -> Self {
        Self::sync(ErrorCode::SyncFailed, format!("Sync failed: {}", reason.into()))
    }

    pub fn sync_conflict(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::sync(ErrorCode::SyncConflict, format!("Sync conflict on '{}'", key))
            .with_recoverable(false)
            .with_data("key", json!(key))
    }

    pub fn sync_timeout(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        Self::sync(
            ErrorCode::SyncTimeout,
            format!("Sync operation '{}' timed out", operation),
        )
        .with_operation(operation)
    }

    // Channel

    pub fn channel_not_found(channel: impl Into<String>) -> Self {
        let channel = channel.into();
        Self::channel(
            ErrorCode::ChannelNotFound,
            format!("Channel {} not found", channel),
        )
        .with_data("channel", json!(channel))
    }

    pub fn channel_access_denied(channel: impl Into<String>) -> Self {
        let channel = channel.into();
        Self::channel(
            ErrorCode::ChannelAccessDenied,
            format!("Access to channel {} denied", channel),
        )
        .with_data("channel", json!(channel))
    }

    pub fn channel_password_required(channel: impl Into<String>) -> Self {
        let channel = channel.into();
        Self::channel(
            ErrorCode::ChannelPasswordRequired,
            format!("Channel {} requires a password", channel),
        )
        .with_severity(ErrorSeverity::Info)
        .with_data("channel", json!(channel))
    }

    // Platform

    pub fn permission_denied(permission: impl Into<String>) -> Self {
        let permission = permission.into();
        Self::platform(
            ErrorCode::PermissionDenied,
            format!("Permission '{}' denied", permission),
        )
        .with_data("permission", json!(permission))
    }

    pub fn not_supported(feature: impl Into<String>) -> Self {
        let feature = feature.into();
        Self::platform(
            ErrorCode::NotSupported,
            format!("'{}' is not supported on this platform", feature),
        )
        .with_severity(ErrorSeverity::Info)
    }

    pub fn bluetooth_unavailable() -> Self {
        Self::platform(ErrorCode::BluetoothUnavailable, "Bluetooth is unavailable")
    }
}
