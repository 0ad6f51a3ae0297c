//! Form evaluation session: live values, derived recompute and submission.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::derive::{update_derived_fields, Clock, SystemClock};
use crate::error::SessionError;
use crate::types::{FieldDefinition, FieldValue, FormSchema, ValidationErrorMap, ValueSet};
use crate::validator::validate_form;

/// Error returned by a submit collaborator.
pub type DeliveryError = Box<dyn std::error::Error + Send + Sync>;

/// Receives the value set of a form that passed validation.
#[async_trait]
pub trait SubmitHandler: Send + Sync {
    async fn submit(&self, values: &ValueSet) -> Result<(), DeliveryError>;
}

#[async_trait]
impl<F> SubmitHandler for F
where
    F: Fn(&ValueSet) -> Result<(), DeliveryError> + Send + Sync,
{
    async fn submit(&self, values: &ValueSet) -> Result<(), DeliveryError> {
        self(values)
    }
}

/// Where a session is in its edit/submit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Values may be changed; derived values are current.
    Editing,
    /// Derived values are being recomputed after a change.
    Recomputing,
    /// Validation passed and the submit collaborator is running.
    Submitting,
    /// The last submission was delivered.
    Submitted,
    /// The last submission failed validation or delivery.
    Failed,
}

/// One in-progress instance of a form.
///
/// Every value write recomputes the derived fields before returning, so
/// the exposed value set is always consistent with its parents.
pub struct FormSession {
    fields: Vec<FieldDefinition>,
    values: ValueSet,
    errors: ValidationErrorMap,
    state: SessionState,
    submit_error: Option<String>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for FormSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormSession")
            .field("fields", &self.fields.len())
            .field("values", &self.values)
            .field("errors", &self.errors)
            .field("state", &self.state)
            .field("submit_error", &self.submit_error)
            .finish()
    }
}

impl FormSession {
    /// Start a session over `fields` using the system clock.
    pub fn new(fields: Vec<FieldDefinition>) -> Self {
        Self::with_clock(fields, Arc::new(SystemClock))
    }

    /// Start a session over a stored schema.
    pub fn from_schema(schema: &FormSchema) -> Self {
        Self::new(schema.fields.clone())
    }

    /// Start a session whose age derivations use `clock`.
    pub fn with_clock(fields: Vec<FieldDefinition>, clock: Arc<dyn Clock>) -> Self {
        let mut session = Self {
            fields,
            values: ValueSet::new(),
            errors: ValidationErrorMap::new(),
            state: SessionState::Editing,
            submit_error: None,
            clock,
        };
        session.seed();
        session
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, field_id: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.id == field_id)
    }

    pub fn values(&self) -> &ValueSet {
        &self.values
    }

    pub fn value(&self, field_id: &str) -> Option<&FieldValue> {
        self.values.get(field_id)
    }

    pub fn errors(&self) -> &ValidationErrorMap {
        &self.errors
    }

    pub fn error(&self, field_id: &str) -> Option<&str> {
        self.errors.get(field_id).map(String::as_str)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Message of the last failed delivery.
    pub fn submit_error(&self) -> Option<&str> {
        self.submit_error.as_deref()
    }

    /// Write one field's value and recompute derived fields.
    ///
    /// Clears the stored error for this field only.
    ///
    /// # Errors
    ///
    /// Rejects unknown and derived fields, and writes while a submission is
    /// outstanding.
    pub fn set_value(
        &mut self,
        field_id: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), SessionError> {
        if self.state == SessionState::Submitting {
            return Err(SessionError::SubmitInProgress);
        }

        let Some(field) = self.field(field_id) else {
            return Err(SessionError::UnknownField {
                field: field_id.to_string(),
            });
        };
        if field.is_derived {
            return Err(SessionError::ReadOnlyField {
                field: field_id.to_string(),
            });
        }

        self.values.insert(field_id.to_string(), value.into());
        self.errors.remove(field_id);
        self.recompute();
        Ok(())
    }

    /// Validate and, if clean, deliver the values to `handler`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Invalid` with the per-field messages when
    /// validation fails (the handler is not called), `Delivery` when the
    /// handler fails, and `SubmitInProgress` if a previous submission never
    /// settled.
    pub async fn submit(&mut self, handler: &dyn SubmitHandler) -> Result<(), SessionError> {
        if self.state == SessionState::Submitting {
            return Err(SessionError::SubmitInProgress);
        }
        self.transition(SessionState::Submitting);
        self.submit_error = None;

        let errors = validate_form(&self.values, &self.fields);
        if !errors.is_empty() {
            debug!(count = errors.len(), "submission blocked by validation");
            self.errors = errors.clone();
            self.transition(SessionState::Failed);
            return Err(SessionError::Invalid { errors });
        }
        self.errors.clear();

        match handler.submit(&self.values).await {
            Ok(()) => {
                info!(fields = self.values.len(), "form submitted");
                self.transition(SessionState::Submitted);
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                warn!(error = %message, "form delivery failed");
                self.submit_error = Some(message.clone());
                self.transition(SessionState::Failed);
                Err(SessionError::Delivery { message })
            }
        }
    }

    /// Restore default values, clear errors and recompute derived fields.
    pub fn reset(&mut self) {
        self.errors.clear();
        self.submit_error = None;
        self.seed();
    }

    fn seed(&mut self) {
        self.values = self
            .fields
            .iter()
            .map(|f| (f.id.clone(), f.initial_value()))
            .collect();
        self.state = SessionState::Editing;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.transition(SessionState::Recomputing);
        let (values, changed) = update_derived_fields(&self.values, &self.fields, &*self.clock);
        if changed {
            self.values = values;
        }
        self.transition(SessionState::Editing);
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "session state");
            self.state = next;
        }
    }
}
