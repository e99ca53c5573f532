//! Fill response assembly.
//!
//! Each candidate becomes at most one [`FillUnit`]. A candidate that cannot be
//! turned into a unit is recorded as a [`BuildError`] and the remaining
//! candidates are still processed, so one broken entry never costs the user
//! the others.

use std::fmt;
use std::sync::Arc;

use matcher::CredentialEntry;
use resilience::{AutofillError, ErrorKind};
use serde::{Serialize, Serializer};

use crate::field::{value_for_hint, FieldDescriptor, FieldId};

/// Subtitle shown for entries without a username.
pub const NO_USERNAME_PLACEHOLDER: &str = "No username";

const EMPTY_UNIT_MESSAGE: &str = "No fields could be filled";

/// Values for one candidate, ready to hand to the platform.
#[derive(Clone, PartialEq, Serialize)]
pub struct FillUnit {
    pub entry_id: u64,
    /// Entry title, or the app name when the title is blank.
    pub label: String,
    /// Username, or [`NO_USERNAME_PLACEHOLDER`].
    pub subtitle: String,
    /// Ordered field/value pairs; never empty. Only the field ids serialize.
    #[serde(rename = "filled_fields", serialize_with = "field_ids_only")]
    pub values: Vec<(FieldId, String)>,
}

impl FillUnit {
    pub fn field_ids(&self) -> impl Iterator<Item = &FieldId> {
        self.values.iter().map(|(id, _)| id)
    }

    pub fn value_for(&self, field: &FieldId) -> Option<&str> {
        self.values
            .iter()
            .find(|(id, _)| id == field)
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Debug for FillUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FillUnit")
            .field("entry_id", &self.entry_id)
            .field("label", &self.label)
            .field("subtitle", &self.subtitle)
            .field("fields", &self.field_ids().collect::<Vec<_>>())
            .finish()
    }
}

fn field_ids_only<S>(values: &[(FieldId, String)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(values.iter().map(|(id, _)| id))
}

/// What the caller hands back to the platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FillResponse {
    /// One selectable dataset per unit.
    Datasets { units: Vec<FillUnit> },
    /// A single entry point that opens the multi-candidate picker.
    Picker {
        entry_ids: Vec<u64>,
        requesting_id: String,
    },
}

impl FillResponse {
    pub fn unit_count(&self) -> usize {
        match self {
            FillResponse::Datasets { units } => units.len(),
            FillResponse::Picker { .. } => 1,
        }
    }
}

/// Why one candidate produced no unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildError {
    pub entry_id: u64,
    pub entry_title: String,
    pub message: String,
    #[serde(serialize_with = "cause_kind")]
    pub cause: Option<AutofillError>,
}

fn cause_kind<S>(cause: &Option<AutofillError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let kind: Option<ErrorKind> = cause.as_ref().map(AutofillError::kind);
    kind.serialize(serializer)
}

/// Outcome of a build. `response` is present exactly when `succeeded > 0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildResult {
    pub response: Option<FillResponse>,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<BuildError>,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        self.response.is_some() && self.succeeded > 0
    }

    /// Fraction of processed candidates that produced a unit, `0.0` when none were processed.
    pub fn success_rate(&self) -> f32 {
        let total = self.succeeded + self.failed;
        if total == 0 {
            0.0
        } else {
            self.succeeded as f32 / total as f32
        }
    }

    pub fn stats(&self) -> BuildStats {
        BuildStats {
            created: self.succeeded,
            failed: self.failed,
            success_rate_percent: self.success_rate() * 100.0,
            error_count: self.errors.len(),
            has_response: self.response.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BuildStats {
    pub created: usize,
    pub failed: usize,
    pub success_rate_percent: f32,
    pub error_count: usize,
    pub has_response: bool,
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} failed={} success={:.1}% errors={} response={}",
            self.created,
            self.failed,
            self.success_rate_percent,
            self.error_count,
            self.has_response
        )
    }
}

/// Platform hooks used while assembling a response.
///
/// Every method has a default; [`StandardPlatform`] uses all of them.
pub trait FillPlatform: Send + Sync {
    /// Value to place in `field` for `entry`. `Ok(None)` skips the field.
    fn resolve_value(
        &self,
        entry: &CredentialEntry,
        field: &FieldDescriptor,
    ) -> Result<Option<String>, AutofillError> {
        Ok(value_for_hint(entry, field.hint).map(str::to_owned))
    }

    /// Label used when the entry has no title.
    fn fallback_label(&self, entry: &CredentialEntry) -> String {
        if entry.app_name.trim().is_empty() {
            entry.app_id.clone()
        } else {
            entry.app_name.clone()
        }
    }

    /// Final check on a finished unit.
    fn seal(&self, unit: FillUnit) -> Result<FillUnit, AutofillError> {
        Ok(unit)
    }

    /// Combine the sealed units into the response.
    fn assemble(&self, units: Vec<FillUnit>) -> Result<FillResponse, AutofillError> {
        Ok(FillResponse::Datasets { units })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPlatform;

impl FillPlatform for StandardPlatform {}

/// Request details the picker needs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PickerContext {
    pub requesting_id: String,
    pub domain: Option<String>,
}

/// Produces a single picker response for several candidates.
pub trait PickerPresenter: Send + Sync {
    fn present(
        &self,
        candidates: &[&CredentialEntry],
        context: &PickerContext,
    ) -> Result<FillResponse, AutofillError>;
}

/// Assembles fill responses; see the module docs for the failure model.
#[derive(Clone)]
pub struct ResponseBuilder {
    platform: Arc<dyn FillPlatform>,
    presenter: Option<Arc<dyn PickerPresenter>>,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new(Arc::new(StandardPlatform))
    }
}

impl fmt::Debug for ResponseBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBuilder")
            .field("presenter", &self.presenter.is_some())
            .finish_non_exhaustive()
    }
}

impl ResponseBuilder {
    pub fn new(platform: Arc<dyn FillPlatform>) -> Self {
        Self {
            platform,
            presenter: None,
        }
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn PickerPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    /// Build without picker context; the picker path is never taken.
    pub fn build<C: AsRef<CredentialEntry>>(
        &self,
        candidates: &[C],
        fields: &[FieldDescriptor],
        capacity: usize,
        picker_requested: bool,
    ) -> BuildResult {
        self.build_with_context(candidates, fields, capacity, picker_requested, None)
    }

    /// Build a response for `candidates` over `fields`.
    ///
    /// With `capacity > 0` only that many candidates are considered. The
    /// picker is used when requested, there is more than one candidate, a
    /// context is given and a presenter is installed; if it fails the
    /// standard path runs instead.
    pub fn build_with_context<C: AsRef<CredentialEntry>>(
        &self,
        candidates: &[C],
        fields: &[FieldDescriptor],
        capacity: usize,
        picker_requested: bool,
        picker: Option<&PickerContext>,
    ) -> BuildResult {
        tracing::debug!(
            category = "filling",
            candidates = candidates.len(),
            fields = fields.len(),
            capacity,
            "building fill response"
        );

        if picker_requested && candidates.len() > 1 {
            if let (Some(context), Some(presenter)) = (picker, &self.presenter) {
                let entries: Vec<&CredentialEntry> =
                    candidates.iter().map(AsRef::<CredentialEntry>::as_ref).collect();
                match presenter.present(&entries, context) {
                    Ok(response) => {
                        tracing::info!(
                            category = "filling",
                            candidates = entries.len(),
                            "picker response created"
                        );
                        return BuildResult {
                            response: Some(response),
                            succeeded: 1,
                            failed: 0,
                            errors: Vec::new(),
                        };
                    }
                    Err(err) => {
                        tracing::warn!(
                            category = "filling",
                            error = %err,
                            "picker failed, falling back to standard datasets"
                        );
                    }
                }
            }
        }

        self.build_standard(candidates, fields, capacity)
    }

    fn build_standard<C: AsRef<CredentialEntry>>(
        &self,
        candidates: &[C],
        fields: &[FieldDescriptor],
        capacity: usize,
    ) -> BuildResult {
        let limit = if capacity > 0 {
            capacity.min(candidates.len())
        } else {
            candidates.len()
        };

        let mut result = BuildResult::default();
        let mut units = Vec::with_capacity(limit);

        for candidate in &candidates[..limit] {
            let entry: &CredentialEntry = candidate.as_ref();
            match self.build_unit(entry, fields) {
                Ok(Some(unit)) => {
                    tracing::debug!(category = "filling", entry_id = entry.id, "fill unit created");
                    units.push(unit);
                }
                Ok(None) => {
                    tracing::warn!(
                        category = "filling",
                        entry_id = entry.id,
                        "no fields could be filled, skipping entry"
                    );
                    result.errors.push(BuildError {
                        entry_id: entry.id,
                        entry_title: entry.title.clone(),
                        message: EMPTY_UNIT_MESSAGE.to_owned(),
                        cause: None,
                    });
                }
                Err(err) => {
                    tracing::error!(
                        category = "filling",
                        entry_id = entry.id,
                        error = %err,
                        "failed to build fill unit"
                    );
                    result.errors.push(BuildError {
                        entry_id: entry.id,
                        entry_title: entry.title.clone(),
                        message: err.to_string(),
                        cause: Some(err),
                    });
                }
            }
        }

        result.succeeded = units.len();
        result.failed = result.errors.len();

        if units.is_empty() {
            tracing::warn!(category = "filling", "no fill units created, returning no response");
        } else {
            let unit_ids: Vec<(u64, String)> = units
                .iter()
                .map(|u| (u.entry_id, u.label.clone()))
                .collect();
            match self.platform.assemble(units) {
                Ok(response) => result.response = Some(response),
                Err(err) => {
                    // Units that never reach the platform count as failed.
                    tracing::error!(
                        category = "filling",
                        error = %err,
                        "failed to assemble fill response"
                    );
                    for (entry_id, label) in unit_ids {
                        result.errors.push(BuildError {
                            entry_id,
                            entry_title: label,
                            message: err.to_string(),
                            cause: Some(err.clone()),
                        });
                    }
                    result.failed += result.succeeded;
                    result.succeeded = 0;
                }
            }
        }

        tracing::info!(
            category = "filling",
            succeeded = result.succeeded,
            failed = result.failed,
            "fill response build completed"
        );
        result
    }

    fn build_unit(
        &self,
        entry: &CredentialEntry,
        fields: &[FieldDescriptor],
    ) -> Result<Option<FillUnit>, AutofillError> {
        let mut values = Vec::new();
        for field in fields {
            let value = self
                .platform
                .resolve_value(entry, field)
                .map_err(|err| as_field_failure(field.id.as_str(), err))?;
            match value {
                Some(value) if !value.trim().is_empty() => {
                    tracing::trace!(category = "filling", hint = %field.hint, "field filled");
                    values.push((field.id.clone(), value));
                }
                _ => {}
            }
        }

        if values.is_empty() {
            return Ok(None);
        }

        let unit = FillUnit {
            entry_id: entry.id,
            label: if entry.title.trim().is_empty() {
                self.platform.fallback_label(entry)
            } else {
                entry.title.clone()
            },
            subtitle: if entry.username.trim().is_empty() {
                NO_USERNAME_PLACEHOLDER.to_owned()
            } else {
                entry.username.clone()
            },
            values,
        };
        let sealed = self
            .platform
            .seal(unit)
            .map_err(|err| as_field_failure("*", err))?;
        Ok(Some(sealed))
    }
}

fn as_field_failure(field_id: &str, err: AutofillError) -> AutofillError {
    match err {
        AutofillError::FieldFillFailed { .. } => err,
        other => AutofillError::field_fill_failed(field_id, other),
    }
}
