//! Background-screening orchestration for matchmaking applicants.
//!
//! Two providers (identity documents, criminal background) sit behind one
//! applicant-facing state machine. Synchronous triggers and provider webhooks
//! race freely; the store's conditional claim and idempotent terminal update are
//! the only places screening statuses change.

pub mod access;
pub mod audit;
pub mod consent;
pub mod domain;
pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod providers;
pub mod router;
pub mod store;
pub mod webhook;

#[cfg(test)]
mod tests;

pub use access::{AdminAuthorizer, StaticAdminList};
pub use audit::{AuditAction, AuditEntry, AuditEntryId, AuditLog, NewAuditEntry};
pub use consent::{ConsentLedger, ConsentOutcome, ConsentRequest};
pub use domain::{
    aggregate_status, ApplicantId, ApplicantProfile, ClaimResult, Correlation, Pipeline,
    ScreeningRecord, ScreeningStatusView, TerminalOutcome, TerminalStatus, UserId,
    VerificationStatus,
};
pub use error::ScreeningError;
pub use notify::{NotificationSender, NotifyError, ScreeningNotice, TracingNotifier};
pub use orchestrator::{
    BackgroundCheckOutcome, IdentityOutcome, MonitoringOutcome, ScreeningOrchestrator,
    ScreeningSettings,
};
pub use providers::{
    BackgroundCheckProvider, CandidateIdentity, CheckrClient, IdenfyClient, IdentitySession,
    IdentityVerifier, Invitation, ProviderError, ProviderKind, Report, SandboxBackgroundCheck,
    SandboxIdentityVerifier,
};
pub use router::{screening_router, ScreeningApi};
pub use store::{ConsentCommit, ConsentGrant, InMemoryScreeningStore, ScreeningStore, StoreError};
pub use webhook::{IngestResult, WebhookIngestor};
