//! Field schema: per-field parsing, rules and transforms, plus cross-field checks.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde_json::{Map, Value};

use super::FieldError;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

const INVALID_NUMBER: &str = "Informe um número válido";
const INVALID_DATE: &str = "Informe uma data válida";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// JSON number, or a numeric string with `,` or `.` as decimal separator.
    Number,
    /// `YYYY-MM-DD`; RFC 3339 timestamps are accepted and truncated to the date.
    Date,
    Boolean,
    /// Array of diagnosis tags.
    Tags,
}

impl FieldKind {
    /// Value of an untouched, empty input.
    pub fn empty_value(&self) -> Value {
        match self {
            Self::Text | Self::Number | Self::Date => Value::String(String::new()),
            Self::Boolean => Value::Bool(false),
            Self::Tags => Value::Array(Vec::new()),
        }
    }

    /// Value sent in a partial update to erase a stored field.
    pub fn cleared_value(&self) -> Value {
        match self {
            Self::Text => Value::String(String::new()),
            Self::Number | Self::Date => Value::Null,
            Self::Boolean => Value::Bool(false),
            Self::Tags => Value::Array(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Trim,
    /// Uppercase the first letter of every whitespace-separated word.
    CapitalizeWords,
}

impl Transform {
    fn apply(&self, text: &str) -> String {
        match self {
            Self::Trim => text.trim().to_string(),
            Self::CapitalizeWords => capitalize_words(text),
        }
    }
}

/// `"joão da silva"` → `"João Da Silva"`. Runs of whitespace collapse to one space.
pub fn capitalize_words(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone)]
enum Rule {
    MinLen(usize, String),
    MaxLen(usize, String),
    Email(String),
    Positive(String),
    Pattern(Regex, String),
}

impl Rule {
    fn check(&self, value: &Value) -> Option<&str> {
        let failed = match (self, value) {
            (Self::MinLen(min, _), Value::String(s)) => s.chars().count() < *min,
            (Self::MaxLen(max, _), Value::String(s)) => s.chars().count() > *max,
            (Self::Email(_), Value::String(s)) => !EMAIL.is_match(s),
            (Self::Pattern(re, _), Value::String(s)) => !re.is_match(s),
            (Self::Positive(_), Value::Number(n)) => n.as_f64().map_or(true, |n| n <= 0.0),
            _ => false,
        };
        failed.then(|| self.message())
    }

    fn message(&self) -> &str {
        match self {
            Self::MinLen(_, m)
            | Self::MaxLen(_, m)
            | Self::Email(m)
            | Self::Positive(m)
            | Self::Pattern(_, m) => m,
        }
    }
}

/// One form field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    kind: FieldKind,
    required: Option<String>,
    rules: Vec<Rule>,
    transforms: Vec<Transform>,
}

impl FieldSpec {
    fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: None,
            rules: Vec::new(),
            transforms: Vec::new(),
        }
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, FieldKind::Text).trim()
    }

    pub fn number(name: &str) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn date(name: &str) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn tags(name: &str) -> Self {
        Self::new(name, FieldKind::Tags)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required.is_some()
    }

    /// Empty input fails with `message`. For tags, an empty list fails.
    pub fn required(mut self, message: &str) -> Self {
        self.required = Some(message.to_string());
        self
    }

    pub fn min_len(mut self, min: usize, message: &str) -> Self {
        self.rules.push(Rule::MinLen(min, message.to_string()));
        self
    }

    pub fn max_len(mut self, max: usize, message: &str) -> Self {
        self.rules.push(Rule::MaxLen(max, message.to_string()));
        self
    }

    pub fn email(mut self, message: &str) -> Self {
        self.rules.push(Rule::Email(message.to_string()));
        self
    }

    pub fn positive(mut self, message: &str) -> Self {
        self.rules.push(Rule::Positive(message.to_string()));
        self
    }

    pub fn pattern(mut self, regex: Regex, message: &str) -> Self {
        self.rules.push(Rule::Pattern(regex, message.to_string()));
        self
    }

    pub fn trim(mut self) -> Self {
        if !self.transforms.contains(&Transform::Trim) {
            self.transforms.push(Transform::Trim);
        }
        self
    }

    pub fn capitalize_words(mut self) -> Self {
        self.transforms.push(Transform::CapitalizeWords);
        self
    }

    /// Parse one raw input. `Ok(None)` means "empty and optional": the field is
    /// left out of the output.
    pub(crate) fn parse(&self, raw: Option<&Value>) -> Result<Option<Value>, String> {
        let parsed = match self.kind {
            FieldKind::Text => self.parse_text(raw),
            FieldKind::Number => parse_number(raw)?,
            FieldKind::Date => parse_date(raw)?,
            FieldKind::Boolean => Some(Value::Bool(parse_bool(raw))),
            FieldKind::Tags => parse_tags(raw),
        };

        let Some(value) = parsed else {
            return match &self.required {
                Some(message) => Err(message.clone()),
                None => Ok(None),
            };
        };

        if let Some(message) = self.rules.iter().find_map(|rule| rule.check(&value)) {
            return Err(message.to_string());
        }
        Ok(Some(value))
    }

    fn parse_text(&self, raw: Option<&Value>) -> Option<Value> {
        let text = match raw {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        };
        let text = self
            .transforms
            .iter()
            .fold(text, |acc, transform| transform.apply(&acc));
        (!text.is_empty()).then_some(Value::String(text))
    }
}

fn parse_number(raw: Option<&Value>) -> Result<Option<Value>, String> {
    match raw {
        Some(Value::Number(n)) => Ok(Some(Value::Number(n.clone()))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .and_then(serde_json::Number::from_f64)
            .map(|n| Some(Value::Number(n)))
            .ok_or_else(|| INVALID_NUMBER.to_string()),
        None | Some(Value::Null) => Ok(None),
        Some(_) => Err(INVALID_NUMBER.to_string()),
    }
}

fn parse_date(raw: Option<&Value>) -> Result<Option<Value>, String> {
    let text = match raw {
        Some(Value::String(s)) => s.trim(),
        None | Some(Value::Null) => return Ok(None),
        Some(_) => return Err(INVALID_DATE.to_string()),
    };
    if text.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
        .map(|date| Some(Value::String(date.format("%Y-%m-%d").to_string())))
        .ok_or_else(|| INVALID_DATE.to_string())
}

fn parse_bool(raw: Option<&Value>) -> bool {
    match raw {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "on" | "1"),
        _ => false,
    }
}

fn parse_tags(raw: Option<&Value>) -> Option<Value> {
    match raw {
        Some(Value::Array(items)) if !items.is_empty() => Some(Value::Array(items.clone())),
        _ => None,
    }
}

type Check = Arc<dyn Fn(&Map<String, Value>) -> bool + Send + Sync>;

/// Cross-field rule, run on the parsed output once every field passes.
#[derive(Clone)]
struct Refinement {
    field: String,
    message: String,
    check: Check,
}

/// Ordered set of fields plus cross-field refinements.
#[derive(Clone, Default)]
pub struct Schema {
    fields: Vec<FieldSpec>,
    refinements: Vec<Refinement>,
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("fields", &self.fields)
            .field("refinements", &self.refinements.len())
            .finish()
    }
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Attach `message` to `field` when `check` returns false for the parsed values.
    pub fn refine<F>(mut self, field: &str, message: &str, check: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> bool + Send + Sync + 'static,
    {
        self.refinements.push(Refinement {
            field: field.to_string(),
            message: message.to_string(),
            check: Arc::new(check),
        });
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Parse every field in order. Errors come back in schema order.
    pub fn parse(&self, values: &Map<String, Value>) -> Result<Map<String, Value>, Vec<FieldError>> {
        let mut output = Map::new();
        let mut errors = Vec::new();

        for spec in &self.fields {
            match spec.parse(values.get(&spec.name)) {
                Ok(Some(value)) => {
                    output.insert(spec.name.clone(), value);
                }
                Ok(None) => {}
                Err(message) => errors.push(FieldError::new(&spec.name, &message)),
            }
        }

        if errors.is_empty() {
            errors.extend(
                self.refinements
                    .iter()
                    .filter(|r| !(r.check)(&output))
                    .map(|r| FieldError::new(&r.field, &r.message)),
            );
        }

        if errors.is_empty() {
            Ok(output)
        } else {
            Err(errors)
        }
    }
}
