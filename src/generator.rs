use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::error::{ReportError, Result};
use crate::form::FormSubmission;
use crate::llm::{GeminiClient, RelayClient, ReportBackend};
use crate::report::{assemble, Report, ReportRequestBuilder, ReportSnapshot};
use crate::scoring::{DerivedProfile, ScoringPipeline};
use crate::webhooks::{DeliveryReport, WebhookDispatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    Scored,
    RequestBuilt,
    CallingModel,
    ResponseReceived,
    Assembled,
}

impl GenerationStage {
    pub fn label(self) -> &'static str {
        match self {
            GenerationStage::Scored => "scored",
            GenerationStage::RequestBuilt => "request_built",
            GenerationStage::CallingModel => "calling",
            GenerationStage::ResponseReceived => "received",
            GenerationStage::Assembled => "assembled",
        }
    }
}

#[derive(Debug)]
pub struct GeneratedReport {
    pub report: Report,
    pub profile: DerivedProfile,
    /// Fire-and-forget webhook delivery; dropping the handle detaches it.
    pub webhooks: Option<JoinHandle<DeliveryReport>>,
}

/// Runs one submission end to end: score, build the request, call the
/// backend under a time bound, assemble, then hand off to webhooks.
pub struct ReportGenerator {
    pipeline: ScoringPipeline,
    builder: ReportRequestBuilder,
    backend: Arc<dyn ReportBackend>,
    webhooks: Option<WebhookDispatcher>,
    timeout: Duration,
}

impl ReportGenerator {
    pub fn new(
        pipeline: ScoringPipeline,
        builder: ReportRequestBuilder,
        backend: Arc<dyn ReportBackend>,
        webhooks: Option<WebhookDispatcher>,
        timeout: Duration,
    ) -> Self {
        Self {
            pipeline,
            builder,
            backend,
            webhooks,
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.model.timeout_ms);
        let backend: Arc<dyn ReportBackend> = match config.relay.endpoint.as_ref() {
            Some(endpoint) => Arc::new(RelayClient::new(endpoint.clone(), timeout)?),
            None => Arc::new(GeminiClient::from_config(&config.model)?),
        };
        Ok(Self::new(
            ScoringPipeline::from_config(config),
            ReportRequestBuilder::default(),
            backend,
            Some(WebhookDispatcher::from_config(&config.webhooks)?),
            timeout,
        ))
    }

    pub fn pipeline(&self) -> &ScoringPipeline {
        &self.pipeline
    }

    pub async fn generate(&self, form: FormSubmission) -> Result<GeneratedReport> {
        self.generate_observed(form, |_| {}).await
    }

    pub async fn generate_observed<F>(&self, form: FormSubmission, observe: F) -> Result<GeneratedReport>
    where
        F: Fn(GenerationStage) + Send + Sync,
    {
        form.validate()?;

        let profile = self.pipeline.score(&form.scores)?;
        info!(
            persona = %profile.persona,
            top_skills = ?profile.dominant.keys(),
            "submission scored"
        );
        observe(GenerationStage::Scored);

        let request = self.builder.build(&form, &profile)?;
        debug!(
            user_content_bytes = request.user_content.len(),
            "report request built"
        );
        observe(GenerationStage::RequestBuilt);

        observe(GenerationStage::CallingModel);
        let started = Instant::now();
        let raw = match tokio::time::timeout(self.timeout, self.backend.generate(&form, &request)).await {
            Ok(result) => result,
            Err(_) => Err(ReportError::GenerationTimeout(self.timeout)),
        }
        .map_err(|err| {
            error!(backend = self.backend.name(), error = %err, "report generation failed");
            err
        })?;
        info!(
            backend = self.backend.name(),
            latency_ms = started.elapsed().as_millis() as u64,
            "model response received"
        );
        observe(GenerationStage::ResponseReceived);

        let snapshot = ReportSnapshot::new(&form, &profile);
        let report = assemble(&raw, &snapshot)?;
        observe(GenerationStage::Assembled);

        let webhooks = self
            .webhooks
            .as_ref()
            .and_then(|dispatcher| dispatcher.dispatch(snapshot));

        Ok(GeneratedReport {
            report,
            profile,
            webhooks,
        })
    }
}

/// Holds at most one in-flight generation; a new submission aborts the old one.
pub struct SubmissionSlot {
    generator: Arc<ReportGenerator>,
    current: StdMutex<Option<InFlight>>,
    next_id: AtomicU64,
}

struct InFlight {
    id: u64,
    abort: AbortHandle,
}

/// Aborts its task and frees the slot when the waiting caller goes away,
/// whether it finished or was dropped mid-flight.
struct InFlightGuard<'a> {
    current: &'a StdMutex<Option<InFlight>>,
    id: u64,
    abort: AbortHandle,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.abort.abort();
        let mut current = lock(self.current);
        if current.as_ref().map_or(false, |in_flight| in_flight.id == self.id) {
            *current = None;
        }
    }
}

impl SubmissionSlot {
    pub fn new(generator: Arc<ReportGenerator>) -> Self {
        Self {
            generator,
            current: StdMutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    pub async fn submit(&self, form: FormSubmission) -> Result<GeneratedReport> {
        self.submit_observed(form, |_| {}).await
    }

    pub async fn submit_observed<F>(&self, form: FormSubmission, observe: F) -> Result<GeneratedReport>
    where
        F: Fn(GenerationStage) + Send + Sync + 'static,
    {
        // Abort, spawn and register under one lock so two racing submits
        // cannot register out of order.
        let (guard, task) = {
            let mut current = lock(&self.current);
            if let Some(previous) = current.take() {
                previous.abort.abort();
            }
            let generator = self.generator.clone();
            let task =
                tokio::spawn(async move { generator.generate_observed(form, observe).await });
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            *current = Some(InFlight {
                id,
                abort: task.abort_handle(),
            });
            let guard = InFlightGuard {
                current: &self.current,
                id,
                abort: task.abort_handle(),
            };
            (guard, task)
        };

        let outcome = task.await;
        drop(guard);
        match outcome {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => {
                info!("submission superseded");
                Err(ReportError::Superseded)
            }
            Err(err) => Err(ReportError::ModelRequestFailure(format!(
                "generation task failed: {}",
                err
            ))),
        }
    }

    pub fn is_idle(&self) -> bool {
        lock(&self.current).is_none()
    }

    /// Drops whatever is in flight, e.g. when the user resets the form.
    pub fn reset(&self) {
        if let Some(previous) = lock(&self.current).take() {
            previous.abort.abort();
        }
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
