//! Logging service

use crate::models::{LogLevel, PollReport};
use tracing_subscriber::EnvFilter;

/// Initialize logging with the specified level. `RUST_LOG` takes precedence when set.
pub fn init_logging(level: LogLevel) -> Result<(), Box<dyn std::error::Error>> {
    let level = match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("pollbot_core={0},pollbot={0}", level)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| e as Box<dyn std::error::Error>)?;

    Ok(())
}

/// Log the timing breakdown of one answered poll
pub fn log_reaction(report: &PollReport) {
    let outcome = report
        .outcome
        .as_ref()
        .map(|o| o.to_string())
        .unwrap_or_else(|| "not_voted".to_string());
    tracing::info!(
        account = report.account,
        key = %report.key,
        option = report.option_index + 1,
        confidence = %format!("{:.0}%", report.confidence),
        reasoning_ms = report.reasoning.as_millis() as u64,
        delay_ms = report.delay.as_millis() as u64,
        vote_ms = report.vote_latency.as_millis() as u64,
        reaction_ms = report.reaction_time.as_millis() as u64,
        first_seen = %report.first_seen.format("%H:%M:%S%.3f"),
        outcome = %outcome,
        "Poll answered"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PollKey, VoteOutcome};
    use std::time::Duration;

    #[test]
    fn test_logging_initialization() {
        // A second init in the same process reports an error instead of panicking
        let _ = init_logging(LogLevel::Info);
        let _ = init_logging(LogLevel::Debug);
    }

    #[test]
    fn test_log_reaction() {
        let report = PollReport {
            account: 0,
            key: PollKey {
                chat_id: -100,
                message_id: 3,
            },
            option_index: 1,
            reasoning: Duration::from_millis(420),
            delay: Duration::from_millis(25),
            vote_latency: Duration::from_millis(80),
            reaction_time: Duration::from_millis(530),
            outcome: Some(VoteOutcome::Success),
            confidence: 88.4,
            first_seen: chrono::Utc::now(),
        };
        log_reaction(&report);
        log_reaction(&PollReport {
            outcome: None,
            ..report
        });
    }
}
