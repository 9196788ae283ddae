use crate::models::AnswerSpeed;
use std::time::Duration;

/// Reaction delay for a speed tier. Fast mode halves it, never exceeding `fast_cap`.
pub fn response_delay(speed: AnswerSpeed, fast_mode: bool, fast_cap: Duration) -> Duration {
    let delay = speed.delay();
    if fast_mode {
        (delay / 2).min(fast_cap)
    } else {
        delay
    }
}
