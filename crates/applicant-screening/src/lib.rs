//! Applicant screening: FCRA consent, identity-document verification and
//! criminal background checks behind one orchestrator, plus the config,
//! logging and error plumbing the HTTP service is built from.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
