use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use crate::jobs::error_codes::ErrorKind;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub base_ms: i64,
    pub cap_ms: i64,
    pub jitter_pct: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            cap_ms: 30_000,
            jitter_pct: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    Terminal,
}

/// Kinds outside the allow-list, `Unknown` included, are terminal.
pub fn classify_error(kind: ErrorKind, retryable: &[ErrorKind]) -> ErrorClass {
    if retryable.contains(&kind) {
        ErrorClass::Retryable
    } else {
        ErrorClass::Terminal
    }
}

/// `min(base * 2^(attempt_no - 1), cap)` with optional symmetric jitter.
pub fn next_delay_ms(attempt_no: i32, cfg: &RetryConfig, rng: &mut impl Rng) -> i64 {
    let attempt_no = attempt_no.max(1) as u32;

    // exponent = attempt_no - 1
    let exp = attempt_no.saturating_sub(1);

    // past 62 the shift overflows; the cap handles it
    let pow2 = 1_i64.checked_shl(exp).filter(|v| *v > 0).unwrap_or(i64::MAX);

    let delay = cfg.base_ms.saturating_mul(pow2).min(cfg.cap_ms);

    if cfg.jitter_pct <= 0.0 {
        return delay;
    }

    let jitter_range = (delay as f64) * cfg.jitter_pct;
    let jitter = rng.gen_range(-jitter_range..=jitter_range);

    let jittered = (delay as f64 + jitter).round() as i64;
    jittered.clamp(0, cfg.cap_ms)
}

/// What happens to a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Disposition {
    /// Back to `retry`, eligible again at `scheduled_at`.
    Retry {
        scheduled_at: DateTime<Utc>,
        delay_ms: i64,
    },
    /// Terminal `failed`.
    Terminal { reason: TerminalReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalReason {
    NonRetryable,
    MaxAttemptsExceeded,
}

impl TerminalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalReason::NonRetryable => "NON_RETRYABLE",
            TerminalReason::MaxAttemptsExceeded => "MAX_ATTEMPTS_EXCEEDED",
        }
    }
}

/// `attempts` counts the attempt that just failed.
pub fn decide(
    kind: ErrorKind,
    attempts: i32,
    max_attempts: i32,
    retryable: &[ErrorKind],
    cfg: &RetryConfig,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Disposition {
    match classify_error(kind, retryable) {
        ErrorClass::Terminal => Disposition::Terminal {
            reason: TerminalReason::NonRetryable,
        },
        ErrorClass::Retryable if attempts >= max_attempts => Disposition::Terminal {
            reason: TerminalReason::MaxAttemptsExceeded,
        },
        ErrorClass::Retryable => {
            let delay_ms = next_delay_ms(attempts, cfg, rng);
            Disposition::Retry {
                scheduled_at: now + chrono::Duration::milliseconds(delay_ms),
                delay_ms,
            }
        }
    }
}
