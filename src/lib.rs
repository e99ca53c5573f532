//! Workspace umbrella crate for the autofill decision core.
//!
//! [`AutofillService`] wires the member crates into one request pipeline:
//! match the request against saved entries, build the fill response under
//! the retry and deadline policy, describe what to save, and report the
//! outcome to the shared [`MetricsCollector`].

pub mod config;

pub use config::{AutofillConfig, BuilderYamlConfig, ConfigLoadError, MetricsYamlConfig};
pub use fill::{
    build_save_descriptor, BuildError, BuildInfo, BuildResult, DeviceProfile,
    DeviceProfileProvider, FieldDescriptor, FieldHint, FieldId, FillPlatform, FillResponse,
    FillUnit, Manufacturer, PickerContext, PickerPresenter, ResponseBuilder, RomFamily,
    SaveDescriptor, StandardPlatform, StaticDeviceProvider, value_for_hint,
};
pub use matcher::{
    CredentialEntry, DomainMatchStrategy, ExtractionMethod, MatchCandidate, MatchError,
    MatchResult, MatchType, Matcher, MatcherConfig, PageContext, PageNode, ViewNode,
};
pub use resilience::{
    safely, safely_or_else, with_recovery, with_timeout, AutofillError, ErrorKind, ErrorReporter,
    ErrorStats, RetryConfig, RetryPolicy, RetryResult,
};
pub use telemetry::{MetricsCollector, MetricsSnapshot, SeriesStats, Stopwatch};

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One fill request as delivered by the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FillRequest {
    pub requesting_id: String,
    #[serde(default)]
    pub page: PageContext,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub picker_requested: bool,
}

impl FillRequest {
    pub fn new(requesting_id: impl Into<String>) -> Self {
        Self {
            requesting_id: requesting_id.into(),
            ..Self::default()
        }
    }

    pub fn with_page(mut self, page: PageContext) -> Self {
        self.page = page;
        self
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_picker(mut self) -> Self {
        self.picker_requested = true;
        self
    }
}

/// Narrows what a [`CredentialSource`] needs to return.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntryFilter {
    pub requesting_id: String,
    /// Domain extracted from the page, when there is one.
    pub domain: Option<String>,
}

/// Store of saved credential entries.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn entries(&self, filter: &EntryFilter) -> Result<Vec<CredentialEntry>, AutofillError>;
}

/// Everything decided for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillOutcome {
    pub match_result: MatchResult,
    pub build: BuildResult,
    pub save: Option<SaveDescriptor>,
    /// Build attempts made; 0 when nothing matched.
    pub attempts: u32,
    /// Set when every build attempt failed.
    pub failure: Option<ErrorKind>,
}

impl FillOutcome {
    pub fn has_response(&self) -> bool {
        self.build.response.is_some()
    }
}

/// The request pipeline. Cheap to share behind an `Arc`; holds no
/// per-request state.
#[derive(Debug, Clone)]
pub struct AutofillService {
    matcher: Matcher,
    builder: ResponseBuilder,
    metrics: Arc<MetricsCollector>,
    errors: Arc<ErrorReporter>,
    device: DeviceProfile,
    retry: RetryConfig,
    timeout: Duration,
    capacity: usize,
    use_picker: bool,
}

impl AutofillService {
    pub fn new(
        config: &AutofillConfig,
        devices: &dyn DeviceProfileProvider,
    ) -> Result<Self, AutofillError> {
        config.validate()?;
        let matcher = Matcher::new(config.matcher.clone())
            .map_err(|err| AutofillError::configuration(err.to_string()))?;
        let device = devices.current_device();

        let service = Self {
            matcher,
            builder: ResponseBuilder::default(),
            metrics: Arc::new(MetricsCollector::with_series_capacity(
                config.metrics.series_capacity,
            )),
            errors: Arc::new(ErrorReporter::new()),
            retry: config.effective_retry(&device),
            timeout: config.effective_timeout(&device),
            capacity: config.builder.capacity,
            use_picker: config.builder.use_picker,
            device,
        };
        tracing::info!(
            category = "filling",
            rom = %service.device.rom,
            api_level = service.device.api_level,
            retry_count = service.retry.retry_count,
            timeout_ms = service.timeout.as_millis() as u64,
            "autofill service ready"
        );
        Ok(service)
    }

    pub fn with_builder(mut self, builder: ResponseBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Report into a collector shared with other components.
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Recent failures seen by this service.
    pub fn errors(&self) -> &Arc<ErrorReporter> {
        &self.errors
    }

    pub fn device(&self) -> &DeviceProfile {
        &self.device
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn report_failure(&self, err: &AutofillError, stage: &str, requesting_id: &str) {
        self.metrics.record_failure(err.kind());
        let context = BTreeMap::from([
            ("stage".to_string(), stage.to_string()),
            ("requesting_id".to_string(), requesting_id.to_string()),
        ]);
        self.errors.report_with_context(err, context);
    }

    fn retry_policy<T>(&self, stage: &'static str) -> RetryPolicy<T> {
        RetryPolicy::from_config(&self.retry).with_before_retry(move |attempt, err| {
            tracing::warn!(
                category = "error",
                stage,
                attempt,
                error = %err,
                "retrying after failure"
            );
        })
    }

    /// Run the pipeline over already loaded `entries`.
    pub async fn handle(&self, request: &FillRequest, entries: &[CredentialEntry]) -> FillOutcome {
        let total = Stopwatch::start("fill_request");

        let matching = Stopwatch::start("matching");
        let match_result = self
            .matcher
            .find_matches(&request.requesting_id, &request.page, entries);
        let matching_time = matching.finish();

        self.metrics.record_request(
            &request.requesting_id,
            match_result.diagnostics.extracted_domain.as_deref(),
        );

        let save = build_save_descriptor(&request.fields, &self.device);

        let Some(best) = match_result.best_match() else {
            self.metrics.record_no_match();
            tracing::info!(
                category = "matching",
                requesting_id = %request.requesting_id,
                entries = entries.len(),
                "no candidates for request"
            );
            return FillOutcome {
                match_result,
                build: BuildResult::default(),
                save,
                attempts: 0,
                failure: None,
            };
        };
        if best.match_type.is_exact() {
            self.metrics.record_exact_match();
        } else {
            self.metrics.record_fuzzy_match();
        }

        let picker = PickerContext {
            requesting_id: request.requesting_id.clone(),
            domain: match_result.diagnostics.extracted_domain.clone(),
        };
        let picker_requested = request.picker_requested || self.use_picker;

        let filling = Stopwatch::start("filling");
        let policy = self.retry_policy::<BuildResult>("build");
        let candidates = Arc::new(match_result.matches.clone());
        let fields = Arc::new(request.fields.clone());
        let last_failed: Mutex<Option<BuildResult>> = Mutex::new(None);
        let recovered = with_recovery(&policy, |_attempt| {
            let builder = self.builder.clone();
            let candidates = Arc::clone(&candidates);
            let fields = Arc::clone(&fields);
            let picker = picker.clone();
            let capacity = self.capacity;
            let last_failed = &last_failed;
            // Platform hooks block; the deadline covers the blocking pool task.
            with_timeout(self.timeout, async move {
                let build = tokio::task::spawn_blocking(move || {
                    builder.build_with_context(
                        candidates.as_slice(),
                        fields.as_slice(),
                        capacity,
                        picker_requested,
                        Some(&picker),
                    )
                })
                .await
                .map_err(|err| AutofillError::field_fill_failed("*", err.to_string()))?;
                match build_failure(&build) {
                    Some(err) => {
                        *last_failed.lock().unwrap_or_else(|p| p.into_inner()) = Some(build);
                        Err(err)
                    }
                    None => Ok(build),
                }
            })
        })
        .await;
        let filling_time = filling.finish();

        let attempts = recovered.attempts;
        let (build, failure) = match recovered.into_result() {
            Ok(build) => {
                self.metrics
                    .record_success(total.finish(), matching_time, filling_time);
                (build, None)
            }
            Err(err) => {
                self.report_failure(&err, "build", &request.requesting_id);
                tracing::warn!(
                    category = "error",
                    requesting_id = %request.requesting_id,
                    attempts,
                    error = %err,
                    "fill response could not be built"
                );
                (
                    last_failed
                        .into_inner()
                        .unwrap_or_else(|p| p.into_inner())
                        .unwrap_or_default(),
                    Some(err.kind()),
                )
            }
        };

        FillOutcome {
            match_result,
            build,
            save,
            attempts,
            failure,
        }
    }

    /// Load entries from `source` under the retry and deadline policy, then
    /// run [`handle`](Self::handle).
    pub async fn fetch_and_handle(
        &self,
        source: &dyn CredentialSource,
        request: &FillRequest,
    ) -> Result<FillOutcome, AutofillError> {
        let (domain, _) = self
            .matcher
            .extract_domain(&request.requesting_id, &request.page);
        let filter = EntryFilter {
            requesting_id: request.requesting_id.clone(),
            domain,
        };

        let policy = self.retry_policy::<Vec<CredentialEntry>>("fetch");
        let fetched = with_recovery(&policy, |_attempt| {
            with_timeout(self.timeout, source.entries(&filter))
        })
        .await;

        match fetched.into_result() {
            Ok(entries) => Ok(self.handle(request, &entries).await),
            Err(err) => {
                self.metrics
                    .record_request(&request.requesting_id, filter.domain.as_deref());
                self.report_failure(&err, "fetch", &request.requesting_id);
                tracing::error!(
                    category = "error",
                    requesting_id = %request.requesting_id,
                    error = %err,
                    "credential source unavailable"
                );
                Err(err)
            }
        }
    }

    /// Like [`handle`](Self::handle), abandoned when `cancelled` resolves
    /// first. Returns `None` and records a cancellation in that case.
    pub async fn handle_or_cancel<C>(
        &self,
        request: &FillRequest,
        entries: &[CredentialEntry],
        cancelled: C,
    ) -> Option<FillOutcome>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancelled => {
                self.metrics.record_cancellation();
                None
            }
            outcome = self.handle(request, entries) => Some(outcome),
        }
    }
}

/// Error to retry on when an attempt produced no response despite having
/// candidates.
fn build_failure(build: &BuildResult) -> Option<AutofillError> {
    if build.is_success() || build.errors.is_empty() {
        return None;
    }
    let cause = build
        .errors
        .iter()
        .find_map(|err| err.cause.clone())
        .unwrap_or_else(|| AutofillError::field_fill_failed("*", &build.errors[0].message));
    Some(cause)
}
