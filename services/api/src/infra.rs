use applicant_screening::config::ScreeningConfig;
use applicant_screening::error::AppError;
use applicant_screening::workflows::screening::{
    BackgroundCheckProvider, CheckrClient, IdenfyClient, IdentityVerifier, InMemoryScreeningStore,
    SandboxBackgroundCheck, SandboxIdentityVerifier, ScreeningApi, ScreeningOrchestrator,
    ScreeningSettings, StaticAdminList, TracingNotifier,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::warn;

/// Webhook signing keys the sandbox providers verify against.
pub(crate) const SANDBOX_IDENTITY_KEY: &str = "sandbox-idenfy-callback";
pub(crate) const SANDBOX_CHECKR_KEY: &str = "sandbox-checkr";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn identity_provider(
    config: &ScreeningConfig,
) -> Result<Arc<dyn IdentityVerifier>, AppError> {
    match &config.idenfy {
        Some(idenfy) => Ok(Arc::new(IdenfyClient::new(idenfy.clone())?)),
        None => {
            warn!("identity provider credentials missing; using sandbox verifier");
            Ok(Arc::new(SandboxIdentityVerifier::new(SANDBOX_IDENTITY_KEY)))
        }
    }
}

pub(crate) fn background_provider(
    config: &ScreeningConfig,
) -> Result<Arc<dyn BackgroundCheckProvider>, AppError> {
    match &config.checkr {
        Some(checkr) => Ok(Arc::new(CheckrClient::new(checkr.clone())?)),
        None => {
            warn!("background check credentials missing; using sandbox provider");
            Ok(Arc::new(SandboxBackgroundCheck::new(SANDBOX_CHECKR_KEY)))
        }
    }
}

/// Wire the screening subsystem from configuration.
pub(crate) fn screening_api(
    config: &ScreeningConfig,
) -> Result<ScreeningApi<InMemoryScreeningStore>, AppError> {
    let orchestrator = Arc::new(ScreeningOrchestrator::new(
        Arc::new(InMemoryScreeningStore::new()),
        identity_provider(config)?,
        background_provider(config)?,
        Arc::new(TracingNotifier),
        ScreeningSettings::from(config),
    ));
    let admins = StaticAdminList::new(config.admin_users.iter().cloned());
    Ok(ScreeningApi::new(
        orchestrator,
        config.disclosure_version.clone(),
        Arc::new(admins),
    ))
}
