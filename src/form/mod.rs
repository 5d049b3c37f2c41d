//! Form state controller.
//!
//! Holds raw input values keyed by field name, tracks dirty/touched state
//! against the last `reset` baseline, and validates through a `Schema`.
//! Parsed output is what gets sent to the API: transforms applied, empty
//! optional fields left out.

pub mod schema;
pub mod tags;

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;

use serde_json::{Map, Value};

pub use schema::{capitalize_words, FieldKind, FieldSpec, Schema};
pub use tags::{Key, TagInput};

/// One failed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Field-keyed validation failures, in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Message shown to the user: the first failing field's.
    pub fn first_message(&self) -> Option<&str> {
        self.errors.first().map(|e| e.message.as_str())
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.first() {
            Some(first) => write!(f, "{}: {}", first.field, first.message),
            None => f.write_str("invalid form"),
        }
    }
}

impl std::error::Error for ValidationErrors {}

/// Render-time view of one registered field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBinding {
    pub name: String,
    pub kind: FieldKind,
    pub value: Value,
    pub error: Option<String>,
    pub required: bool,
    pub dirty: bool,
    pub touched: bool,
}

#[derive(Debug, Clone)]
pub struct FormController {
    schema: Schema,
    values: Map<String, Value>,
    baseline: Map<String, Value>,
    touched: BTreeSet<String>,
    errors: Vec<FieldError>,
}

impl FormController {
    pub fn new(schema: Schema) -> Self {
        let baseline = empty_values(&schema);
        Self {
            schema,
            values: baseline.clone(),
            baseline,
            touched: BTreeSet::new(),
            errors: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Bind a field for rendering. Unknown names bind as empty text.
    pub fn register(&self, name: &str) -> FieldBinding {
        let spec = self.schema.get(name);
        if spec.is_none() {
            tracing::debug!(field = name, "Registered field not in schema");
        }
        FieldBinding {
            name: name.to_string(),
            kind: spec.map_or(FieldKind::Text, FieldSpec::kind),
            value: self.values.get(name).cloned().unwrap_or(Value::Null),
            error: self.error(name).map(String::from),
            required: spec.is_some_and(FieldSpec::is_required),
            dirty: self.is_field_dirty(name),
            touched: self.is_touched(name),
        }
    }

    pub fn set_value(&mut self, name: &str, value: impl Into<Value>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Mark a field as visited (blur).
    pub fn touch(&mut self, name: &str) {
        self.touched.insert(name.to_string());
    }

    pub fn is_touched(&self, name: &str) -> bool {
        self.touched.contains(name)
    }

    pub fn is_dirty(&self) -> bool {
        self.schema.fields().iter().any(|f| self.is_field_dirty(f.name()))
    }

    /// Fields whose value differs from the last reset, in schema order.
    pub fn dirty_fields(&self) -> Vec<&str> {
        self.schema
            .fields()
            .iter()
            .map(FieldSpec::name)
            .filter(|name| self.is_field_dirty(name))
            .collect()
    }

    fn is_field_dirty(&self, name: &str) -> bool {
        self.values.get(name) != self.baseline.get(name)
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn error(&self, name: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == name)
            .map(|e| e.message.as_str())
    }

    /// Replace all values and the dirty baseline; clear touched and errors.
    /// Schema fields missing from `values` fall back to their empty value.
    pub fn reset(&mut self, values: Map<String, Value>) {
        let mut baseline = empty_values(&self.schema);
        baseline.extend(values);
        self.values = baseline.clone();
        self.baseline = baseline;
        self.touched.clear();
        self.errors.clear();
    }

    /// Reset to empty defaults.
    pub fn clear(&mut self) {
        self.reset(Map::new());
    }

    /// Parse and transform every field, storing errors for rendering.
    pub fn validate(&mut self) -> Result<Map<String, Value>, ValidationErrors> {
        match self.schema.parse(&self.values) {
            Ok(parsed) => {
                self.errors.clear();
                Ok(parsed)
            }
            Err(errors) => {
                tracing::debug!(
                    fields = errors.len(),
                    first = %errors[0].field,
                    "Form validation failed"
                );
                self.errors = errors.clone();
                Err(ValidationErrors::new(errors))
            }
        }
    }

    /// Validate for a partial update. Fields emptied since the last reset are
    /// kept in the output with their kind's cleared value, so the server
    /// erases them instead of keeping the stored one.
    pub fn validate_changes(&mut self) -> Result<Map<String, Value>, ValidationErrors> {
        let mut parsed = self.validate()?;
        for spec in self.schema.fields() {
            if !parsed.contains_key(spec.name()) && self.is_field_dirty(spec.name()) {
                parsed.insert(spec.name().to_string(), spec.kind().cleared_value());
            }
        }
        Ok(parsed)
    }

    /// Validate, then await `on_valid` with the parsed values. An invalid form
    /// never reaches the handler.
    pub async fn handle_submit<F, Fut>(&mut self, on_valid: F) -> Result<Fut::Output, ValidationErrors>
    where
        F: FnOnce(Map<String, Value>) -> Fut,
        Fut: Future,
    {
        let parsed = self.validate()?;
        Ok(on_valid(parsed).await)
    }
}

fn empty_values(schema: &Schema) -> Map<String, Value> {
    schema
        .fields()
        .iter()
        .map(|f| (f.name().to_string(), f.kind().empty_value()))
        .collect()
}
