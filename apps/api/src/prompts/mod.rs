//! Prompt Template Store: named, versioned prompt bodies with `{{variable}}` placeholders.
//!
//! The registry is built once at startup and never mutated afterwards. Callers that
//! need a different set of templates build a new `PromptRegistry` and swap the whole
//! `Arc`, so in-flight calls always see a consistent snapshot.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub mod library;

/// Template variables keyed by placeholder name.
pub type Variables = BTreeMap<String, Value>;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt template '{0}' is not registered")]
    NotFound(String),

    #[error("Prompt template '{0}' is registered more than once")]
    Duplicate(String),
}

/// A single prompt template. Immutable once loaded.
#[derive(Debug, Clone, Serialize)]
pub struct PromptTemplate {
    pub id: String,
    pub display_name: String,
    /// Free-form, monotonic by convention.
    pub version: String,
    #[serde(skip)]
    pub body: String,
}

impl PromptTemplate {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        version: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            version: version.into(),
            body: body.into(),
        }
    }

    /// Substitutes every `{{key}}` whose key is present in `variables`.
    ///
    /// A key is any non-empty text without braces, matched exactly (spaces and
    /// non-ASCII included). Unknown placeholders stay as literal `{{key}}` text.
    /// Substitution is a single left-to-right pass: substituted values are never
    /// re-scanned.
    pub fn render(&self, variables: &Variables) -> String {
        render_placeholders(&self.body, variables)
    }
}

/// Read-only registry of prompt templates keyed by id.
#[derive(Debug, Default)]
pub struct PromptRegistry {
    templates: HashMap<String, PromptTemplate>,
}

static BUILTIN: Lazy<Arc<PromptRegistry>> = Lazy::new(|| {
    let registry = PromptRegistry::from_templates(library::builtin_templates())
        .unwrap_or_else(|e| panic!("built-in prompt library is invalid: {e}"));
    Arc::new(registry)
});

impl PromptRegistry {
    /// Builds a registry, rejecting duplicate ids.
    pub fn from_templates(
        templates: impl IntoIterator<Item = PromptTemplate>,
    ) -> Result<Self, PromptError> {
        let mut map = HashMap::new();
        for template in templates {
            if map.contains_key(&template.id) {
                return Err(PromptError::Duplicate(template.id));
            }
            map.insert(template.id.clone(), template);
        }
        Ok(Self { templates: map })
    }

    /// The process-wide registry holding the built-in prompt library.
    pub fn builtin() -> Arc<PromptRegistry> {
        Arc::clone(&BUILTIN)
    }

    pub fn get(&self, id: &str) -> Result<&PromptTemplate, PromptError> {
        self.templates
            .get(id)
            .ok_or_else(|| PromptError::NotFound(id.to_string()))
    }

    /// All templates, sorted by id.
    pub fn list(&self) -> Vec<&PromptTemplate> {
        let mut templates: Vec<&PromptTemplate> = self.templates.values().collect();
        templates.sort_by(|a, b| a.id.cmp(&b.id));
        templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn render_placeholders(body: &str, variables: &Variables) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        let Some(end) = after_open.find(CLOSE) else {
            out.push_str(&rest[start..]);
            return out;
        };

        let key = &after_open[..end];
        if !is_placeholder_key(key) {
            // Nested braces: keep one and rescan, so `{{{key}}}` still substitutes.
            out.push('{');
            rest = &rest[start + 1..];
            continue;
        }

        match variables.get(key) {
            Some(value) => out.push_str(&value_as_text(value)),
            None => {
                out.push_str(OPEN);
                out.push_str(key);
                out.push_str(CLOSE);
            }
        }
        rest = &after_open[end + CLOSE.len()..];
    }

    out.push_str(rest);
    out
}

fn is_placeholder_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(['{', '}'])
}

fn value_as_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}
