//! Human-readable error descriptions, structured JSON error output, and
//! stable exit codes.

use fatigue_core::FatigueError;

/// Map an eyre::Report to a human-readable explanation with likely causes
/// and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(fe) = err.downcast_ref::<FatigueError>() {
        return match fe {
            FatigueError::StoreUnavailable(detail) => format!(
                "What happened: The data store is unreachable ({detail}).\nLikely causes: The store service is down or the engine lost its watch channel.\nHow to fix: Restart the store backend; the engine backs off and keeps the last committed state while it retries."
            ),
            FatigueError::IllegalTransition { from, to } => format!(
                "What happened: A state transition {from} -> {to} was rejected.\nLikely causes: A collaborator requested a jump the state graph forbids, or the alcohol override is active.\nHow to fix: Check `state:current` and the requesting service; overrides clear on their own once the detection record ages out."
            ),
            FatigueError::StaleSample { age_s, max_age_s } => format!(
                "What happened: An input sample aged out ({age_s:.1}s > {max_age_s:.1}s).\nLikely causes: A sensor service stalled or its clock base differs from the engine's.\nHow to fix: Check the vision/biometric producers; the tick was skipped and monitoring continues."
            ),
            FatigueError::ShutdownRequested => "Shutdown requested; the engine drained its final tick.".to_string(),
            other => format!(
                "What happened: {other}.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();
    if lower.contains("invalid configuration") || lower.contains("parse config") {
        return "What happened: Configuration is invalid or incomplete.\nLikely causes: Out-of-range thresholds, mismatched EMA weights, or malformed TOML.\nHow to fix: Edit the config file and try again; every section is optional and falls back to defaults.".to_string();
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: state-authority corruption is the watchdog signal.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<FatigueError>() {
        Some(FatigueError::StoreUnavailable(_)) => 4,
        Some(FatigueError::IllegalTransition { .. }) => 3,
        // unrecoverable state-manager corruption
        Some(FatigueError::SubscriberFailure(_)) => 10,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    let reason = match err.downcast_ref::<FatigueError>() {
        Some(FatigueError::StoreUnavailable(_)) => "store_unavailable",
        Some(FatigueError::IllegalTransition { .. }) => "illegal_transition",
        Some(FatigueError::StaleSample { .. }) => "stale_sample",
        Some(FatigueError::InvalidSample(_)) => "invalid_sample",
        Some(FatigueError::InsufficientModalities) => "insufficient_modalities",
        Some(FatigueError::SubscriberFailure(_)) => "subscriber_failure",
        Some(FatigueError::ShutdownRequested) => "shutdown_requested",
        None => "error",
    };
    serde_json::json!({ "reason": reason, "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_stable() {
        let report = eyre::Report::new(FatigueError::StoreUnavailable("down".into()));
        assert_eq!(exit_code_for_error(&report), 4);
        let report = eyre::Report::new(FatigueError::InsufficientModalities);
        assert_eq!(exit_code_for_error(&report), 1);
    }

    #[test]
    fn json_errors_carry_a_reason_tag() {
        let report = eyre::Report::new(FatigueError::InsufficientModalities);
        let json: serde_json::Value =
            serde_json::from_str(&format_error_json(&report)).unwrap();
        assert_eq!(json["reason"], "insufficient_modalities");
    }
}
