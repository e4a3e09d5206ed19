//! Console transport: one `tracing` event per handled failure

use tracing::{error, info, warn};

use crate::error::{BitChatError, ErrorSeverity};

/// Emit `failure` at the level matching its severity
pub(crate) fn report(failure: &BitChatError) {
    let line = failure.log_line();
    let code = failure.code().as_u16();
    let category = failure.category().name();

    match failure.severity() {
        ErrorSeverity::Info => info!(code, category, "{}", line),
        ErrorSeverity::Warning => warn!(code, category, "{}", line),
        ErrorSeverity::Error => error!(code, category, failure = ?failure, "{}", line),
        ErrorSeverity::Critical => {
            error!(code, category, failure = ?failure, "CRITICAL: {}", line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_levels_follow_severity() {
        report(&BitChatError::new(ErrorCode::Unknown, "quiet note").with_severity(ErrorSeverity::Info));
        report(&BitChatError::offline());
        report(&BitChatError::write_failed("prefs"));
        report(&BitChatError::identity_not_found());

        assert!(logs_contain("INFO"));
        assert!(logs_contain("[INFO] [generic/1000] quiet note"));
        assert!(logs_contain("WARN"));
        assert!(logs_contain("[WARN] [network/2000] Network is offline"));
        assert!(logs_contain("[ERROR] [storage/4003] Failed to write 'prefs'"));
        assert!(logs_contain("CRITICAL: [CRITICAL] [identity/5000]"));
    }

    #[traced_test]
    #[test]
    fn test_error_events_carry_the_failure() {
        report(&BitChatError::decryption_failed("bad tag"));
        assert!(logs_contain("failure="));
        assert!(logs_contain("DecryptionFailed"));
    }
}
