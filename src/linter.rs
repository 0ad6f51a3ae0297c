//! Schema linting - static analysis of form schema files.
//!
//! A file holds either one schema object or a store array of schemas.
//! Reports:
//! - JSON syntax and shape errors
//! - Authoring invariant violations (labels, options, derived parents)
//! - Rules that have no effect on the field they are attached to

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::config::{config_errors, validate_form_name};
use crate::error::ConfigError;
use crate::types::{NewFormSchema, MAX_FIELDS};
use crate::validator::field_rules;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON path to the issue (e.g., "/fields/2/derivedSpec")
    pub path: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a file or directory.
///
/// If path is a directory, recursively finds all .json files.
/// If `strict` is true, files with warnings count as failed.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let files = collect_schema_files(path);
    let mut results = Vec::new();
    let mut total_errors = 0;
    let mut total_warnings = 0;

    for file in &files {
        let file_result = lint_file(file, path);
        total_errors += file_result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        total_warnings += file_result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count();
        results.push(file_result);
    }

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors: total_errors,
        warnings: total_warnings,
        results,
    }
}

/// Lint a single schema file.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let mut diagnostics = Vec::new();
    let display = file.strip_prefix(base_path).unwrap_or(file).to_path_buf();

    let parsed = std::fs::read_to_string(file)
        .map_err(|e| e.to_string())
        .and_then(|content| serde_json::from_str::<Value>(&content).map_err(|e| e.to_string()));

    match parsed {
        Ok(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                check_schema(item, file, &format!("/{}", i), &mut diagnostics);
            }
        }
        Ok(value) => check_schema(&value, file, "", &mut diagnostics),
        Err(message) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            code: "E001".to_string(),
            file: file.to_path_buf(),
            path: "/".to_string(),
            message: format!("syntax error: {}", message),
        }),
    }

    let has_errors = diagnostics.iter().any(|d| d.severity == Severity::Error);
    let has_warnings = diagnostics.iter().any(|d| d.severity == Severity::Warning);

    let status = if has_errors {
        FileStatus::Error
    } else if has_warnings {
        FileStatus::Warning
    } else {
        FileStatus::Ok
    };

    FileResult {
        file: display,
        status,
        diagnostics,
    }
}

fn check_schema(value: &Value, file: &Path, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let mut push = |severity: Severity, code: &str, at: String, message: String| {
        diagnostics.push(Diagnostic {
            severity,
            code: code.to_string(),
            file: file.to_path_buf(),
            path: if at.is_empty() { "/".to_string() } else { at },
            message,
        });
    };

    let schema: NewFormSchema = match serde_json::from_value(value.clone()) {
        Ok(s) => s,
        Err(e) => {
            push(
                Severity::Error,
                "E001",
                path.to_string(),
                format!("not a form schema: {}", e),
            );
            return;
        }
    };

    if let Err(e) = validate_form_name(&schema.name) {
        push(Severity::Error, "E004", format!("{}/name", path), e.to_string());
    }

    if schema.fields.is_empty() {
        push(
            Severity::Warning,
            "W004",
            format!("{}/fields", path),
            "schema has no fields".to_string(),
        );
    }
    if schema.fields.len() > MAX_FIELDS {
        push(
            Severity::Error,
            "E005",
            format!("{}/fields", path),
            ConfigError::TooManyFields { max: MAX_FIELDS }.to_string(),
        );
    }

    let mut seen = HashSet::new();
    for (i, field) in schema.fields.iter().enumerate() {
        let field_path = format!("{}/fields/{}", path, i);

        if !seen.insert(field.id.as_str()) {
            push(
                Severity::Error,
                "E003",
                format!("{}/id", field_path),
                ConfigError::DuplicateId {
                    field: field.id.clone(),
                }
                .to_string(),
            );
        }

        for err in config_errors(field, &schema.fields) {
            let at = match err {
                ConfigError::BlankLabel { .. } => format!("{}/label", field_path),
                ConfigError::MissingOptions { .. } => format!("{}/options", field_path),
                _ => format!("{}/derivedSpec", field_path),
            };
            push(Severity::Error, "E002", at, err.to_string());
        }

        if field.is_derived {
            if field.required || !field.validation.is_empty() {
                push(
                    Severity::Warning,
                    "W002",
                    field_path.clone(),
                    "derived fields are never validated; required and rules are ignored"
                        .to_string(),
                );
            }
            continue;
        }

        for rule in field_rules(field) {
            if !rule.applies_to(field.field_type) {
                push(
                    Severity::Warning,
                    "W001",
                    format!("{}/validation/{}", field_path, rule.name()),
                    format!(
                        "rule '{}' has no effect on a {} field",
                        rule.name(),
                        field.field_type
                    ),
                );
            }
        }
    }
}

fn collect_schema_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn lint_str(content: &str) -> FileResult {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        lint_file(file.path(), file.path().parent().unwrap())
    }

    fn codes(result: &FileResult) -> Vec<&str> {
        result.diagnostics.iter().map(|d| d.code.as_str()).collect()
    }

    #[test]
    fn lint_valid_schema() {
        let result = lint_str(
            r#"{
                "name": "Signup",
                "fields": [
                    { "id": "dob", "type": "date", "label": "Date of birth" },
                    { "id": "age", "type": "number", "label": "Age", "isDerived": true,
                      "derivedSpec": { "type": "age_from_dob", "parentField": "dob" } }
                ]
            }"#,
        );
        assert_eq!(result.status, FileStatus::Ok);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn lint_invalid_json_syntax() {
        let result = lint_str("{ not json }");
        assert_eq!(result.status, FileStatus::Error);
        assert_eq!(codes(&result), vec!["E001"]);
    }

    #[test]
    fn lint_wrong_shape() {
        let result = lint_str(r#"{ "name": "x", "fields": [{ "id": "a", "type": "slider", "label": "A" }] }"#);
        assert_eq!(codes(&result), vec!["E001"]);
    }

    #[test]
    fn lint_config_errors() {
        let result = lint_str(
            r#"{
                "name": "",
                "fields": [
                    { "id": "a", "type": "select", "label": " " },
                    { "id": "a", "type": "text", "label": "Again" },
                    { "id": "age", "type": "number", "label": "Age", "isDerived": true,
                      "derivedSpec": { "type": "age_from_dob", "parentField": "a" } }
                ]
            }"#,
        );
        assert_eq!(result.status, FileStatus::Error);
        assert_eq!(codes(&result), vec!["E004", "E002", "E002", "E003", "E002"]);
        assert_eq!(result.diagnostics[1].path, "/fields/0/label");
        assert_eq!(result.diagnostics[2].path, "/fields/0/options");
        assert_eq!(result.diagnostics[4].path, "/fields/2/derivedSpec");
    }

    #[test]
    fn lint_derived_spec_without_is_derived() {
        let result = lint_str(
            r#"{
                "name": "Notes",
                "fields": [
                    { "id": "dob", "type": "date", "label": "Date of birth" },
                    { "id": "note", "type": "text", "label": "Note",
                      "derivedSpec": { "type": "age_from_dob", "parentField": "dob" } }
                ]
            }"#,
        );
        assert_eq!(result.status, FileStatus::Error);
        assert_eq!(codes(&result), vec!["E002"]);
        assert_eq!(result.diagnostics[0].path, "/fields/1/derivedSpec");
    }

    #[test]
    fn lint_inapplicable_rule_warning() {
        let result = lint_str(
            r#"{
                "name": "Survey",
                "fields": [
                    { "id": "n", "type": "number", "label": "N", "validation": { "email": true } }
                ]
            }"#,
        );
        assert_eq!(result.status, FileStatus::Warning);
        assert_eq!(codes(&result), vec!["W001"]);
        assert_eq!(result.diagnostics[0].path, "/fields/0/validation/email");
    }

    #[test]
    fn lint_store_array() {
        let result = lint_str(
            r#"[
                { "id": "1", "name": "One", "createdAt": "2024-01-01T00:00:00Z",
                  "fields": [{ "id": "a", "type": "text", "label": "A" }] },
                { "id": "2", "name": "Two", "createdAt": "2024-01-01T00:00:00Z", "fields": [] }
            ]"#,
        );
        assert_eq!(codes(&result), vec!["W004"]);
        assert_eq!(result.diagnostics[0].path, "/1/fields");
    }

    #[test]
    fn lint_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("valid.json"),
            r#"{"name": "Ok", "fields": [{"id": "a", "type": "text", "label": "A"}]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("invalid.json"), "{ not json }").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let result = lint(dir.path(), false);
        assert_eq!(result.files_checked, 2);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 1);
        assert!(!result.is_ok());
    }

    #[test]
    fn lint_strict_mode() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("form.json");
        std::fs::write(&file_path, r#"{"name": "Empty", "fields": []}"#).unwrap();

        let result = lint(&file_path, false);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 0);

        let result = lint(&file_path, true);
        assert_eq!(result.passed, 0);
        assert_eq!(result.failed, 1);
    }
}
