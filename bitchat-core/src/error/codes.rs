//! Numeric failure codes
//!
//! Codes are stable across releases and grouped by their leading digit into
//! domains. They are classification keys only; what the user sees comes from
//! [`ErrorCode::default_user_message`] or an explicit user message.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::ErrorCategory;

/// Closed set of failure codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // Generic
    Unknown = 1000,
    InvalidArgument = 1001,
    InvalidState = 1002,
    NotImplemented = 1003,
    Timeout = 1004,
    Cancelled = 1005,
    Configuration = 1006,
    CircuitOpen = 1007,

    // Network
    NetworkOffline = 2000,
    ConnectionFailed = 2001,
    ConnectionTimeout = 2002,
    ConnectionRefused = 2003,
    RelayUnavailable = 2004,
    PeerUnreachable = 2005,
    RateLimited = 2006,
    RequestFailed = 2007,

    // Crypto
    KeyGenerationFailed = 3000,
    EncryptionFailed = 3001,
    DecryptionFailed = 3002,
    InvalidSignature = 3003,
    KeyExchangeFailed = 3004,
    InvalidKey = 3005,

    // Storage
    StorageUnavailable = 4000,
    QuotaExceeded = 4001,
    ReadFailed = 4002,
    WriteFailed = 4003,
    StorageCorrupted = 4004,
    MigrationFailed = 4005,
    StorageLocked = 4006,

    // Identity
    IdentityNotFound = 5000,
    IdentityCreationFailed = 5001,
    IdentityCorrupted = 5002,
    FingerprintMismatch = 5003,
    IdentityImportFailed = 5004,

    // Protocol
    InvalidMessage = 6000,
    UnsupportedVersion = 6001,
    MessageTooLarge = 6002,
    DecodeFailed = 6003,
    EncodeFailed = 6004,

    // Sync
    SyncFailed = 7000,
    SyncConflict = 7001,
    SyncTimeout = 7002,
    StaleState = 7003,

    // Channel
    ChannelNotFound = 8000,
    ChannelAccessDenied = 8001,
    ChannelPasswordRequired = 8002,
    ChannelFull = 8003,

    // Platform integration
    PermissionDenied = 9000,
    NotSupported = 9001,
    BluetoothUnavailable = 9002,
    NotificationsBlocked = 9003,
    BackgroundTaskFailed = 9004,
}

/// Codes whose failures are expected to clear on their own
pub const TRANSIENT_CODES: &[ErrorCode] = &[
    ErrorCode::Timeout,
    ErrorCode::NetworkOffline,
    ErrorCode::ConnectionFailed,
    ErrorCode::ConnectionTimeout,
    ErrorCode::ConnectionRefused,
    ErrorCode::RelayUnavailable,
    ErrorCode::PeerUnreachable,
    ErrorCode::RateLimited,
    ErrorCode::SyncFailed,
    ErrorCode::SyncTimeout,
    ErrorCode::StorageUnavailable,
    ErrorCode::StorageLocked,
];

impl ErrorCode {
    /// Every code, in numeric order
    pub const ALL: &'static [ErrorCode] = &[
        ErrorCode::Unknown,
        ErrorCode::InvalidArgument,
        ErrorCode::InvalidState,
        ErrorCode::NotImplemented,
        ErrorCode::Timeout,
        ErrorCode::Cancelled,
        ErrorCode::Configuration,
        ErrorCode::CircuitOpen,
        ErrorCode::NetworkOffline,
        ErrorCode::ConnectionFailed,
        ErrorCode::ConnectionTimeout,
        ErrorCode::ConnectionRefused,
        ErrorCode::RelayUnavailable,
        ErrorCode::PeerUnreachable,
        ErrorCode::RateLimited,
        ErrorCode::RequestFailed,
        ErrorCode::KeyGenerationFailed,
        ErrorCode::EncryptionFailed,
        ErrorCode::DecryptionFailed,
        ErrorCode::InvalidSignature,
        ErrorCode::KeyExchangeFailed,
        ErrorCode::InvalidKey,
        ErrorCode::StorageUnavailable,
        ErrorCode::QuotaExceeded,
        ErrorCode::ReadFailed,
        ErrorCode::WriteFailed,
        ErrorCode::StorageCorrupted,
        ErrorCode::MigrationFailed,
        ErrorCode::StorageLocked,
        ErrorCode::IdentityNotFound,
        ErrorCode::IdentityCreationFailed,
        ErrorCode::IdentityCorrupted,
        ErrorCode::FingerprintMismatch,
        ErrorCode::IdentityImportFailed,
        ErrorCode::InvalidMessage,
        ErrorCode::UnsupportedVersion,
        ErrorCode::MessageTooLarge,
        ErrorCode::DecodeFailed,
        ErrorCode::EncodeFailed,
        ErrorCode::SyncFailed,
        ErrorCode::SyncConflict,
        ErrorCode::SyncTimeout,
        ErrorCode::StaleState,
        ErrorCode::ChannelNotFound,
        ErrorCode::ChannelAccessDenied,
        ErrorCode::ChannelPasswordRequired,
        ErrorCode::ChannelFull,
        ErrorCode::PermissionDenied,
        ErrorCode::NotSupported,
        ErrorCode::BluetoothUnavailable,
        ErrorCode::NotificationsBlocked,
        ErrorCode::BackgroundTaskFailed,
    ];

    /// Numeric value of the code
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Look a code up by its numeric value
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| code.as_u16() == value)
    }

    /// Domain the code belongs to, derived from the leading digit
    pub fn category(self) -> ErrorCategory {
        match self.as_u16() / 1000 {
            2 => ErrorCategory::Network,
            3 => ErrorCategory::Crypto,
            4 => ErrorCategory::Storage,
            5 => ErrorCategory::Identity,
            6 => ErrorCategory::Protocol,
            7 => ErrorCategory::Sync,
            8 => ErrorCategory::Channel,
            9 => ErrorCategory::Platform,
            _ => ErrorCategory::Generic,
        }
    }

    /// Whether the code is in [`TRANSIENT_CODES`]
    pub fn is_transient(self) -> bool {
        TRANSIENT_CODES.contains(&self)
    }

    /// Symbolic name, e.g. `CONNECTION_TIMEOUT`
    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::Unknown => "UNKNOWN",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::NotImplemented => "NOT_IMPLEMENTED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::Configuration => "CONFIGURATION",
            ErrorCode::CircuitOpen => "CIRCUIT_OPEN",
            ErrorCode::NetworkOffline => "NETWORK_OFFLINE",
            ErrorCode::ConnectionFailed => "CONNECTION_FAILED",
            ErrorCode::ConnectionTimeout => "CONNECTION_TIMEOUT",
            ErrorCode::ConnectionRefused => "CONNECTION_REFUSED",
            ErrorCode::RelayUnavailable => "RELAY_UNAVAILABLE",
            ErrorCode::PeerUnreachable => "PEER_UNREACHABLE",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::RequestFailed => "REQUEST_FAILED",
            ErrorCode::KeyGenerationFailed => "KEY_GENERATION_FAILED",
            ErrorCode::EncryptionFailed => "ENCRYPTION_FAILED",
            ErrorCode::DecryptionFailed => "DECRYPTION_FAILED",
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::KeyExchangeFailed => "KEY_EXCHANGE_FAILED",
            ErrorCode::InvalidKey => "INVALID_KEY",
            ErrorCode::StorageUnavailable => "STORAGE_UNAVAILABLE",
            ErrorCode::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorCode::ReadFailed => "READ_FAILED",
            ErrorCode::WriteFailed => "WRITE_FAILED",
            ErrorCode::StorageCorrupted => "STORAGE_CORRUPTED",
            ErrorCode::MigrationFailed => "MIGRATION_FAILED",
            ErrorCode::StorageLocked => "STORAGE_LOCKED",
            ErrorCode::IdentityNotFound => "IDENTITY_NOT_FOUND",
            ErrorCode::IdentityCreationFailed => "IDENTITY_CREATION_FAILED",
            ErrorCode::IdentityCorrupted => "IDENTITY_CORRUPTED",
            ErrorCode::FingerprintMismatch => "FINGERPRINT_MISMATCH",
            ErrorCode::IdentityImportFailed => "IDENTITY_IMPORT_FAILED",
            ErrorCode::InvalidMessage => "INVALID_MESSAGE",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::MessageTooLarge => "MESSAGE_TOO_LARGE",
            ErrorCode::DecodeFailed => "DECODE_FAILED",
            ErrorCode::EncodeFailed => "ENCODE_FAILED",
            ErrorCode::SyncFailed => "SYNC_FAILED",
            ErrorCode::SyncConflict => "SYNC_CONFLICT",
            ErrorCode::SyncTimeout => "SYNC_TIMEOUT",
            ErrorCode::StaleState => "STALE_STATE",
            ErrorCode::ChannelNotFound => "CHANNEL_NOT_FOUND",
            ErrorCode::ChannelAccessDenied => "CHANNEL_ACCESS_DENIED",
            ErrorCode::ChannelPasswordRequired => "CHANNEL_PASSWORD_REQUIRED",
            ErrorCode::ChannelFull => "CHANNEL_FULL",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::NotSupported => "NOT_SUPPORTED",
            ErrorCode::BluetoothUnavailable => "BLUETOOTH_UNAVAILABLE",
            ErrorCode::NotificationsBlocked => "NOTIFICATIONS_BLOCKED",
            ErrorCode::BackgroundTaskFailed => "BACKGROUND_TASK_FAILED",
        }
    }

    /// Message shown to end users when none was supplied
    pub fn default_user_message(self) -> &'static str {
        match self {
            ErrorCode::Unknown => "Something went wrong. Please try again.",
            ErrorCode::InvalidArgument => "The request contained invalid data.",
            ErrorCode::InvalidState => "The app is in an unexpected state. Please try again.",
            ErrorCode::NotImplemented => "This feature is not available yet.",
            ErrorCode::Timeout => "The operation took too long. Please try again.",
            ErrorCode::Cancelled => "The operation was cancelled.",
            ErrorCode::Configuration => "The app is not configured correctly.",
            ErrorCode::CircuitOpen => "This service is temporarily unavailable. Please wait a moment.",
            ErrorCode::NetworkOffline => "You appear to be offline. Check your connection.",
            ErrorCode::ConnectionFailed => "Could not connect. Please check your connection.",
            ErrorCode::ConnectionTimeout => "The connection timed out. Please try again.",
            ErrorCode::ConnectionRefused => "The connection was refused by the remote side.",
            ErrorCode::RelayUnavailable => "The relay is unavailable. Trying other relays.",
            ErrorCode::PeerUnreachable => "The other person could not be reached right now.",
            ErrorCode::RateLimited => "Too many requests. Please slow down.",
            ErrorCode::RequestFailed => "The request failed. Please try again.",
            ErrorCode::KeyGenerationFailed => "Could not create encryption keys.",
            ErrorCode::EncryptionFailed => "Could not encrypt the message.",
            ErrorCode::DecryptionFailed => "Could not decrypt the message.",
            ErrorCode::InvalidSignature => "The message signature could not be verified.",
            ErrorCode::KeyExchangeFailed => "Could not establish a secure session.",
            ErrorCode::InvalidKey => "The encryption key is invalid.",
            ErrorCode::StorageUnavailable => "Local storage is unavailable.",
            ErrorCode::QuotaExceeded => "Storage is full. Free up some space.",
            ErrorCode::ReadFailed => "Could not read saved data.",
            ErrorCode::WriteFailed => "Could not save data.",
            ErrorCode::StorageCorrupted => "Saved data is corrupted.",
            ErrorCode::MigrationFailed => "Could not upgrade saved data.",
            ErrorCode::StorageLocked => "Storage is busy. Please try again.",
            ErrorCode::IdentityNotFound => "No identity found. Create or import one.",
            ErrorCode::IdentityCreationFailed => "Could not create your identity.",
            ErrorCode::IdentityCorrupted => "Your identity data is damaged.",
            ErrorCode::FingerprintMismatch => "The security fingerprint does not match.",
            ErrorCode::IdentityImportFailed => "Could not import the identity.",
            ErrorCode::InvalidMessage => "Received an invalid message.",
            ErrorCode::UnsupportedVersion => "The other side uses an unsupported version.",
            ErrorCode::MessageTooLarge => "The message is too large to send.",
            ErrorCode::DecodeFailed => "Could not read an incoming message.",
            ErrorCode::EncodeFailed => "Could not prepare the message for sending.",
            ErrorCode::SyncFailed => "Synchronization failed. Retrying.",
            ErrorCode::SyncConflict => "Conflicting changes were detected.",
            ErrorCode::SyncTimeout => "Synchronization timed out. Retrying.",
            ErrorCode::StaleState => "Your data is out of date. Refreshing.",
            ErrorCode::ChannelNotFound => "The channel does not exist.",
            ErrorCode::ChannelAccessDenied => "You do not have access to this channel.",
            ErrorCode::ChannelPasswordRequired => "This channel requires a password.",
            ErrorCode::ChannelFull => "This channel is full.",
            ErrorCode::PermissionDenied => "Permission was denied.",
            ErrorCode::NotSupported => "This feature is not supported on your device.",
            ErrorCode::BluetoothUnavailable => "Bluetooth is unavailable.",
            ErrorCode::NotificationsBlocked => "Notifications are blocked.",
            ErrorCode::BackgroundTaskFailed => "A background task failed.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.as_u16()
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        ErrorCode::from_u16(value).ok_or_else(|| format!("unknown error code {}", value))
    }
}
