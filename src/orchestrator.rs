use crate::{
    config::AppConfig,
    error::{ConsoleError, ErrorKind},
    printer_client::{ConsoleTransport, DeviceEndpoint, HttpConsoleTransport},
    session::{self, Credentials, CredentialVariant},
    steps::{ConfigStep, LOGIN_STEP, PIPELINE},
};
use anyhow::Result;
use log::{debug, error, info};
use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::time::sleep;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Error,
}

/// Outcome of a single console submission (login included).
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step: String,
    pub status: StepStatus,
    /// Raw console body, kept for operators diagnosing firmware quirks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl StepResult {
    fn success(step: &str, raw_response: String) -> Self {
        StepResult {
            step: step.to_string(),
            status: StepStatus::Success,
            raw_response: Some(raw_response),
            error: None,
            error_kind: None,
        }
    }

    fn failure(step: &str, error: &ConsoleError) -> Self {
        StepResult {
            step: step.to_string(),
            status: StepStatus::Error,
            raw_response: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }
}

/// Full record of one configuration run.
///
/// `steps` is always a strict prefix of the pipeline: login first, then every
/// completed step in order, ending with the first failure if there was one.
/// Steps after a failure are never attempted, so they never appear.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationRun {
    pub run_id: Uuid,
    pub printer: String,
    pub steps: Vec<StepResult>,
    pub overall_success: bool,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_variant: Option<CredentialVariant>,
}

/// Cooperative cancellation for a running configuration.
///
/// Checked between steps only. An in-flight request is always awaited, since
/// tearing down the connection mid-submission could leave the printer with a
/// half-applied page.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Configure one printer with a fresh transport and the process-wide timeout.
pub async fn configure(
    endpoint: &DeviceEndpoint,
    credentials: &Credentials,
    cancel: Option<&CancelFlag>,
) -> Result<ConfigurationRun> {
    let transport = HttpConsoleTransport::new(AppConfig::get().printer.request_timeout)?;
    Ok(run_with_transport(&transport, endpoint, credentials, cancel).await)
}

/// Drive the full pipeline against one printer.
///
/// Infallible by design: transport and device failures end the run early and
/// are reported inside the returned [`ConfigurationRun`], never as an `Err`.
pub async fn run_with_transport<T: ConsoleTransport>(
    transport: &T,
    endpoint: &DeviceEndpoint,
    credentials: &Credentials,
    cancel: Option<&CancelFlag>,
) -> ConfigurationRun {
    let run_id = Uuid::new_v4();
    let printer = endpoint.to_string();
    let mut steps = Vec::with_capacity(PIPELINE.len() + 1);

    info!("[{run_id}] starting configuration of {printer}");

    let session = match session::login(transport, endpoint, credentials).await {
        Ok(session) => {
            steps.push(StepResult::success(LOGIN_STEP, session.login_response.clone()));
            session
        }
        Err(e) => {
            error!("[{run_id}] login failed: {e}");
            steps.push(StepResult::failure(LOGIN_STEP, &e));
            return finish(run_id, printer, steps, false, false, None);
        }
    };

    let variant = Some(session.variant);

    for step in &PIPELINE {
        if cancel.is_some_and(CancelFlag::is_cancelled) {
            info!("[{run_id}] cancelled before step {}", step.name);
            return finish(run_id, printer, steps, false, true, variant);
        }

        match execute_step(transport, endpoint, step).await {
            Ok(raw_response) => {
                debug!("[{run_id}] step {} succeeded", step.name);
                steps.push(StepResult::success(step.name, raw_response));
            }
            Err(e) => {
                error!("[{run_id}] step {} failed: {e}", step.name);
                steps.push(StepResult::failure(step.name, &e));
                return finish(run_id, printer, steps, false, false, variant);
            }
        }

        if !step.settle.is_zero() {
            debug!(
                "[{run_id}] waiting {:?} for the printer to apply {}",
                step.settle, step.name
            );
            sleep(step.settle).await;
        }
    }

    info!("[{run_id}] configuration of {printer} complete");
    finish(run_id, printer, steps, true, false, variant)
}

async fn execute_step<T: ConsoleTransport>(
    transport: &T,
    endpoint: &DeviceEndpoint,
    step: &ConfigStep,
) -> Result<String, ConsoleError> {
    let url = endpoint.url_for(step.page);
    let response = transport.post_form(&url, &step.form_fields()).await?;

    if !response.is_success() {
        return Err(ConsoleError::UnexpectedStatus {
            status: response.status,
            url,
        });
    }

    if let Some(marker) = step
        .failure_markers
        .iter()
        .find(|marker| response.body.contains(**marker))
    {
        return Err(ConsoleError::DeviceRejection {
            step: step.name.to_string(),
            marker: marker.to_string(),
        });
    }

    Ok(response.body)
}

fn finish(
    run_id: Uuid,
    printer: String,
    steps: Vec<StepResult>,
    overall_success: bool,
    cancelled: bool,
    credential_variant: Option<CredentialVariant>,
) -> ConfigurationRun {
    ConfigurationRun {
        run_id,
        printer,
        steps,
        overall_success,
        cancelled,
        credential_variant,
    }
}
