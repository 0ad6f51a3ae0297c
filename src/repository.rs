//! Durable storage of named form schemas.
//!
//! The file-backed store keeps every schema in one JSON array, rewritten
//! on each change. Reads of a store that does not exist yet see no schemas.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::types::{FormSchema, FormSchemaPatch, NewFormSchema, ValueSet};

/// Store of saved form schemas.
pub trait SchemaRepository {
    /// Every stored schema, in save order.
    fn load_all(&self) -> Result<Vec<FormSchema>, RepositoryError>;

    /// Store a new schema, assigning its `id` and `created_at`.
    fn save(&self, schema: NewFormSchema) -> Result<FormSchema, RepositoryError>;

    /// Merge `patch` into the schema with `id` and stamp `updated_at`.
    ///
    /// Returns `None` when no schema has that id.
    fn update(&self, id: &str, patch: FormSchemaPatch)
        -> Result<Option<FormSchema>, RepositoryError>;

    /// Remove the schema with `id`. Unknown ids are a no-op.
    fn delete(&self, id: &str) -> Result<(), RepositoryError>;

    fn get_by_id(&self, id: &str) -> Result<Option<FormSchema>, RepositoryError> {
        Ok(self.load_all()?.into_iter().find(|s| s.id == id))
    }
}

fn stamp_new(schema: NewFormSchema) -> FormSchema {
    FormSchema {
        id: Uuid::new_v4().to_string(),
        name: schema.name,
        fields: schema.fields,
        created_at: Utc::now(),
        updated_at: None,
    }
}

fn apply_patch(schema: &mut FormSchema, patch: FormSchemaPatch) {
    if let Some(name) = patch.name {
        schema.name = name;
    }
    if let Some(fields) = patch.fields {
        schema.fields = fields;
    }
    schema.updated_at = Some(Utc::now());
}

/// Schemas persisted as a JSON array in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_all(&self, schemas: &[FormSchema]) -> Result<(), RepositoryError> {
        let content =
            serde_json::to_string_pretty(schemas).map_err(|source| RepositoryError::InvalidJson {
                path: self.path.clone(),
                source,
            })?;

        std::fs::write(&self.path, content).map_err(|source| RepositoryError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl SchemaRepository for JsonFileRepository {
    fn load_all(&self) -> Result<Vec<FormSchema>, RepositoryError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "store missing, starting empty");
            return Ok(Vec::new());
        }
        load_json(&self.path)
    }

    fn save(&self, schema: NewFormSchema) -> Result<FormSchema, RepositoryError> {
        let mut schemas = self.load_all()?;
        let saved = stamp_new(schema);
        schemas.push(saved.clone());
        self.write_all(&schemas)?;
        info!(id = %saved.id, name = %saved.name, "schema saved");
        Ok(saved)
    }

    fn update(
        &self,
        id: &str,
        patch: FormSchemaPatch,
    ) -> Result<Option<FormSchema>, RepositoryError> {
        let mut schemas = self.load_all()?;
        let Some(schema) = schemas.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        apply_patch(schema, patch);
        let updated = schema.clone();
        self.write_all(&schemas)?;
        info!(id, "schema updated");
        Ok(Some(updated))
    }

    fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let mut schemas = self.load_all()?;
        let before = schemas.len();
        schemas.retain(|s| s.id != id);
        if schemas.len() == before {
            debug!(id, "delete of unknown schema ignored");
            return Ok(());
        }
        self.write_all(&schemas)?;
        info!(id, "schema deleted");
        Ok(())
    }
}

/// Schemas held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    schemas: RwLock<Vec<FormSchema>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Unavailable {
        message: "store lock poisoned".to_string(),
    }
}

impl SchemaRepository for InMemoryRepository {
    fn load_all(&self) -> Result<Vec<FormSchema>, RepositoryError> {
        Ok(self.schemas.read().map_err(poisoned)?.clone())
    }

    fn save(&self, schema: NewFormSchema) -> Result<FormSchema, RepositoryError> {
        let saved = stamp_new(schema);
        self.schemas.write().map_err(poisoned)?.push(saved.clone());
        Ok(saved)
    }

    fn update(
        &self,
        id: &str,
        patch: FormSchemaPatch,
    ) -> Result<Option<FormSchema>, RepositoryError> {
        let mut schemas = self.schemas.write().map_err(poisoned)?;
        Ok(schemas.iter_mut().find(|s| s.id == id).map(|schema| {
            apply_patch(schema, patch);
            schema.clone()
        }))
    }

    fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        self.schemas.write().map_err(poisoned)?.retain(|s| s.id != id);
        Ok(())
    }
}

/// Load a schema definition (`{ "name", "fields" }`) from a JSON file.
///
/// Stored schemas also load this way; their `id` and timestamps are ignored.
pub fn load_schema_file(path: &Path) -> Result<NewFormSchema, RepositoryError> {
    load_json(path)
}

/// Load a value set (`{ "<field id>": value, ... }`) from a JSON file.
pub fn load_values_file(path: &Path) -> Result<ValueSet, RepositoryError> {
    load_json(path)
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, RepositoryError> {
    if !path.exists() {
        return Err(RepositoryError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| RepositoryError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| RepositoryError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}
