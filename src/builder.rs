//! Schema authoring: ordered field-list edits and saving.
//!
//! The free functions take a field list and return the edited copy, so
//! callers can keep the previous list around. [`FormBuilder`] wraps them
//! with the draft name and the save path through a repository.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{validate_config, validate_schema};
use crate::error::{ConfigError, RepositoryError, SaveError};
use crate::repository::SchemaRepository;
use crate::types::{
    FieldDefinition, FieldOption, FieldType, FormSchema, FormSchemaPatch, NewFormSchema,
    MAX_FIELDS,
};

/// A fresh field of `field_type` with a generated id and placeholder label.
pub fn new_field(field_type: FieldType) -> FieldDefinition {
    let mut field = FieldDefinition::new(
        Uuid::new_v4().to_string(),
        field_type,
        format!("{} Field", field_type),
    );
    if field_type.has_options() {
        field.options = vec![FieldOption::new("Option 1", "option1")];
    }
    field
}

/// Append `field` to the list.
///
/// # Errors
///
/// Fails when the list is full, the id is taken, or the field itself is
/// misconfigured.
pub fn add_field(
    fields: &[FieldDefinition],
    field: FieldDefinition,
) -> Result<Vec<FieldDefinition>, ConfigError> {
    if fields.len() >= MAX_FIELDS {
        return Err(ConfigError::TooManyFields { max: MAX_FIELDS });
    }
    if fields.iter().any(|f| f.id == field.id) {
        return Err(ConfigError::DuplicateId { field: field.id });
    }
    validate_config(&field, fields)?;

    let mut next = fields.to_vec();
    next.push(field);
    Ok(next)
}

/// Replace the field with `id` by `updated`, keeping its position.
///
/// Derived fields that read the replaced field are re-checked, so a type
/// change or rename cannot strand them.
///
/// # Errors
///
/// Fails for an unknown `id`, a rename onto an existing id, an invalid
/// `updated`, or a dependent derived field it would break.
pub fn update_field(
    fields: &[FieldDefinition],
    id: &str,
    updated: FieldDefinition,
) -> Result<Vec<FieldDefinition>, ConfigError> {
    let Some(index) = fields.iter().position(|f| f.id == id) else {
        return Err(ConfigError::UnknownField {
            field: id.to_string(),
        });
    };
    if updated.id != id && fields.iter().any(|f| f.id == updated.id) {
        return Err(ConfigError::DuplicateId { field: updated.id });
    }

    let mut next = fields.to_vec();
    next[index] = updated;

    let field = &next[index];
    validate_config(field, &next)?;
    for dependent in dependents_of(&next, id) {
        validate_config(dependent, &next)?;
    }

    Ok(next)
}

/// Remove the field with `id`. Unknown ids leave the list unchanged.
///
/// # Errors
///
/// Returns `ConfigError::ParentInUse` if a derived field reads it.
pub fn delete_field(
    fields: &[FieldDefinition],
    id: &str,
) -> Result<Vec<FieldDefinition>, ConfigError> {
    if let Some(dependent) = dependents_of(fields, id).next() {
        return Err(ConfigError::ParentInUse {
            field: id.to_string(),
            dependent: dependent.id.clone(),
        });
    }
    Ok(fields.iter().filter(|f| f.id != id).cloned().collect())
}

/// Swap the field with `id` with the one before it.
pub fn move_field_up(fields: &[FieldDefinition], id: &str) -> Vec<FieldDefinition> {
    match fields.iter().position(|f| f.id == id) {
        Some(index) if index > 0 => reorder_fields(fields, index, index - 1),
        _ => fields.to_vec(),
    }
}

/// Swap the field with `id` with the one after it.
pub fn move_field_down(fields: &[FieldDefinition], id: &str) -> Vec<FieldDefinition> {
    match fields.iter().position(|f| f.id == id) {
        Some(index) if index + 1 < fields.len() => reorder_fields(fields, index, index + 1),
        _ => fields.to_vec(),
    }
}

/// Move the field at `from` so it ends up at `to`.
///
/// Out-of-range indices leave the list unchanged.
pub fn reorder_fields(fields: &[FieldDefinition], from: usize, to: usize) -> Vec<FieldDefinition> {
    let mut next = fields.to_vec();
    if from >= next.len() || to >= next.len() {
        return next;
    }
    let field = next.remove(from);
    next.insert(to, field);
    next
}

fn dependents_of<'a>(
    fields: &'a [FieldDefinition],
    id: &'a str,
) -> impl Iterator<Item = &'a FieldDefinition> + 'a {
    fields.iter().filter(move |f| {
        f.is_derived
            && f.id != id
            && f
                .derived_spec
                .as_ref()
                .is_some_and(|spec| spec.parents().contains(&id))
    })
}

/// Draft state of a schema being authored.
#[derive(Debug, Clone, Default)]
pub struct FormBuilder {
    name: String,
    fields: Vec<FieldDefinition>,
    editing_id: Option<String>,
    is_loading: bool,
    error: Option<String>,
}

impl FormBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a draft from an unsaved schema. Nothing is checked until
    /// [`save`](Self::save).
    pub fn from_draft(draft: NewFormSchema) -> Self {
        Self {
            name: draft.name,
            fields: draft.fields,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Id of the stored schema being edited, if any.
    pub fn editing_id(&self) -> Option<&str> {
        self.editing_id.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Message of the last failed save.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn add_field(&mut self, field: FieldDefinition) -> Result<(), ConfigError> {
        self.fields = add_field(&self.fields, field)?;
        Ok(())
    }

    pub fn update_field(&mut self, id: &str, updated: FieldDefinition) -> Result<(), ConfigError> {
        self.fields = update_field(&self.fields, id, updated)?;
        Ok(())
    }

    pub fn delete_field(&mut self, id: &str) -> Result<(), ConfigError> {
        self.fields = delete_field(&self.fields, id)?;
        Ok(())
    }

    pub fn move_field_up(&mut self, id: &str) {
        self.fields = move_field_up(&self.fields, id);
    }

    pub fn move_field_down(&mut self, id: &str) {
        self.fields = move_field_down(&self.fields, id);
    }

    pub fn reorder_fields(&mut self, from: usize, to: usize) {
        self.fields = reorder_fields(&self.fields, from, to);
    }

    /// Replace the draft with a stored schema. Saving updates it in place.
    pub fn load_for_editing(&mut self, schema: &FormSchema) {
        self.name = schema.name.clone();
        self.fields = schema.fields.clone();
        self.editing_id = Some(schema.id.clone());
        self.error = None;
    }

    /// Discard the draft.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Persist the draft and reset the builder.
    ///
    /// A draft loaded with [`load_for_editing`](Self::load_for_editing) is
    /// updated in place; otherwise a new schema is stored.
    ///
    /// # Errors
    ///
    /// Returns `SaveError::Config` if the draft is incomplete or invalid, or
    /// `SaveError::Repository` if storage fails. On a storage failure the
    /// draft is kept and [`error`](Self::error) holds the message.
    pub fn save(&mut self, repo: &dyn SchemaRepository) -> Result<FormSchema, SaveError> {
        validate_schema(&self.name, &self.fields)?;
        if self.fields.is_empty() {
            return Err(SaveError::Config(ConfigError::TooFewFields));
        }

        self.is_loading = true;
        let result = self.persist(repo);
        self.is_loading = false;

        match result {
            Ok(saved) => {
                debug!(id = %saved.id, fields = saved.fields.len(), "draft saved");
                self.clear();
                Ok(saved)
            }
            Err(err) => {
                warn!(error = %err, "saving draft failed");
                self.error = Some(err.to_string());
                Err(err.into())
            }
        }
    }

    fn persist(&self, repo: &dyn SchemaRepository) -> Result<FormSchema, RepositoryError> {
        if let Some(id) = &self.editing_id {
            let patch = FormSchemaPatch {
                name: Some(self.name.clone()),
                fields: Some(self.fields.clone()),
            };
            if let Some(updated) = repo.update(id, patch)? {
                return Ok(updated);
            }
            debug!(id = %id, "edited schema no longer stored, saving as new");
        }

        repo.save(NewFormSchema {
            name: self.name.clone(),
            fields: self.fields.clone(),
        })
    }
}
