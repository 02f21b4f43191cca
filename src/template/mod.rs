//! Template engine module.
//!
//! A small Handlebars-style engine used for the HTML pages.
//!
//! # Features
//!
//! - Variable expansion: `{{variable}}` (HTML-escaped), `{{{variable}}}` (raw)
//! - Conditionals: `{{#if condition}}...{{else}}...{{/if}}`, `{{#unless}}`
//! - Loops: `{{#each items}}...{{/each}}`
//! - Escaping: `\{{` to output literal `{{`
//!
//! # Example
//!
//! ```
//! use feedhub::template::{TemplateContext, TemplateEngine, Value};
//!
//! let mut engine = TemplateEngine::new();
//! engine.load("greeting", "Hello, {{name}}!").unwrap();
//!
//! let mut context = TemplateContext::new();
//! context.set("name", Value::string("<World>"));
//!
//! let result = engine.render("greeting", &context).unwrap();
//! assert_eq!(result, "Hello, &lt;World&gt;!");
//! ```

mod loader;
mod parser;
mod renderer;

use std::collections::HashMap;

use thiserror::Error;

pub use loader::{TemplateLoader, DEFAULT_TEMPLATES};
pub use parser::{Node, Parser};
pub use renderer::Renderer;

/// Template-related errors.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// Template not found.
    #[error("Template not found: {0}")]
    NotFound(String),

    /// Parse error.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Render error.
    #[error("Render error: {0}")]
    Render(String),
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Escape text for HTML element content and attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// A value that can be used in templates.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(i64),
    Bool(bool),
    List(Vec<Value>),
    Object(HashMap<String, Value>),
    Null,
}

impl Value {
    /// Convert the value to a string for display.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::List(_) => "[list]".to_string(),
            Value::Object(_) => "[object]".to_string(),
            Value::Null => String::new(),
        }
    }

    /// Check if the value is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => *n != 0,
            Value::Bool(b) => *b,
            Value::List(l) => !l.is_empty(),
            Value::Object(o) => !o.is_empty(),
            Value::Null => false,
        }
    }

    /// Get a nested value by dot-separated path.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = self;

        for part in path.split('.') {
            match current {
                Value::Object(map) => {
                    current = map.get(part)?;
                }
                Value::List(list) => {
                    let index: usize = part.parse().ok()?;
                    current = list.get(index)?;
                }
                _ => return None,
            }
        }

        Some(current)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Build an object from `(key, value)` pairs.
    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// Context for template rendering.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    variables: HashMap<String, Value>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable in the context.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Get a variable from the context, following dot notation.
    pub fn get(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.variables.get(name) {
            return Some(value);
        }

        let (root, rest) = name.split_once('.')?;
        self.variables.get(root)?.get_path(rest)
    }

    /// Create a child context inheriting every variable of this one.
    pub fn child(&self) -> Self {
        self.clone()
    }
}

/// Template engine for parsing and rendering templates.
#[derive(Debug, Default)]
pub struct TemplateEngine {
    templates: HashMap<String, Vec<Node>>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with the built-in templates, each replaceable by a file in
    /// `override_dir` (empty for none).
    pub fn with_defaults<P: AsRef<std::path::Path>>(override_dir: P) -> Result<Self> {
        TemplateLoader::new(override_dir).engine()
    }

    /// Parse and register a template.
    pub fn load(&mut self, name: impl Into<String>, content: &str) -> Result<()> {
        let nodes = Parser::new(content).parse()?;
        self.templates.insert(name.into(), nodes);
        Ok(())
    }

    /// Render a template with the given context.
    pub fn render(&self, name: &str, context: &TemplateContext) -> Result<String> {
        let nodes = self
            .templates
            .get(name)
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))?;

        Renderer::new(context).render(nodes)
    }

    /// Render a template string directly without loading.
    pub fn render_string(content: &str, context: &TemplateContext) -> Result<String> {
        let nodes = Parser::new(content).parse()?;
        Renderer::new(context).render(&nodes)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}
