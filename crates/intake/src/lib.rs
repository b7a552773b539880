//! Submission intake and review services for the patient advocacy platform.
//!
//! The crate accepts patient-assistance requests and provider applications,
//! validates and persists them behind a repository abstraction, fans out
//! email/SMS notifications with fallback providers, and gates staff review
//! endpoints behind bearer-token authorization with audit logging throughout.

pub mod config;
pub mod error;
pub mod submissions;
pub mod telemetry;
