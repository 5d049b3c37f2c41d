//! Creatable multi-value tag input for diagnoses.

use serde_json::Value;

use crate::models::DiagnosisTag;

/// Keys the tag input reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Tab,
    Backspace,
    Char(char),
    Other,
}

/// Text box plus the tags created so far. Any text becomes a tag; duplicates
/// are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagInput {
    input: String,
    tags: Vec<DiagnosisTag>,
}

impl TagInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(tags: Vec<DiagnosisTag>) -> Self {
        Self {
            input: String::new(),
            tags,
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn tags(&self) -> &[DiagnosisTag] {
        &self.tags
    }

    pub fn set_input(&mut self, text: &str) {
        self.input = text.to_string();
    }

    /// Handle a keystroke. Returns true when the tag list changed.
    pub fn on_key(&mut self, key: Key) -> bool {
        match key {
            Key::Enter | Key::Tab => {
                let text = self.input.trim();
                if text.is_empty() {
                    return false;
                }
                self.tags.push(DiagnosisTag::new(text));
                self.input.clear();
                true
            }
            Key::Backspace => {
                if self.input.pop().is_some() {
                    false
                } else {
                    self.tags.pop().is_some()
                }
            }
            Key::Char(c) => {
                self.input.push(c);
                false
            }
            Key::Other => false,
        }
    }

    /// Type `text` then press `key`.
    pub fn submit_text(&mut self, text: &str, key: Key) -> bool {
        self.input.push_str(text);
        self.on_key(key)
    }

    pub fn remove(&mut self, index: usize) -> Option<DiagnosisTag> {
        (index < self.tags.len()).then(|| self.tags.remove(index))
    }

    /// Replace the list (hydration); clears the text box.
    pub fn set_tags(&mut self, tags: Vec<DiagnosisTag>) {
        self.tags = tags;
        self.input.clear();
    }

    pub fn clear(&mut self) {
        self.set_tags(Vec::new());
    }

    /// Array value stored in the form.
    pub fn to_value(&self) -> Value {
        Value::Array(
            self.tags
                .iter()
                .map(|tag| serde_json::json!({ "label": tag.label, "value": tag.value }))
                .collect(),
        )
    }
}
