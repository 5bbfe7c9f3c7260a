//! One-time-code generation for the password recovery flow.
//!
//! Codes are uniformly distributed six-digit values; the expiry is a fixed
//! window from issuance. Persistence of the pair is the caller's job.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Validity window of a freshly issued code, in minutes.
const OTP_WINDOW_MINUTES: i64 = 60;

/// A one-time code with its absolute expiry instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpChallenge {
    pub code: u32,
    pub expires_at: DateTime<Utc>,
}

/// Source of one-time codes. A trait so tests can inject a fixed code.
pub trait OtpGenerator: Send + Sync {
    fn generate(&self) -> OtpChallenge;
}

/// Production generator backed by the thread-local RNG.
pub struct RandomOtp;

impl OtpGenerator for RandomOtp {
    fn generate(&self) -> OtpChallenge {
        // 100000..=999999 keeps the code at exactly six digits.
        let code = rand::thread_rng().gen_range(100_000..=999_999);
        OtpChallenge {
            code,
            expires_at: Utc::now() + Duration::minutes(OTP_WINDOW_MINUTES),
        }
    }
}

/// Deterministic generator for tests.
#[cfg(test)]
pub struct FixedOtp {
    pub code: u32,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
impl OtpGenerator for FixedOtp {
    fn generate(&self) -> OtpChallenge {
        OtpChallenge {
            code: self.code,
            expires_at: self.expires_at,
        }
    }
}
