//! One-time numeric codes for email verification and password reset.
//!
//! Codes are hashed at rest, expire after `OTP_TTL_MINUTES`, and a submitted
//! code is matched against the most recent unexpired ones only.

pub mod repo;
pub mod services;

pub use repo::OtpPurpose;
