//! Field module.
//! Describes a single configuration field (key, kind, required flag, default)
//! and the ordered field set a generator accumulates.
//! Keys are the HTML form names the admin view posts back, e.g. `options[passkey]`.
//! A key keeps the position where it was first introduced; later writes replace
//! the descriptor in place.

use indexmap::IndexMap;
use indexmap::map::Values;
use serde::Serialize;

/// Closed set of input kinds the form renderer knows how to draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Password,
    /// Integer input with an inclusive valid range
    Number { min: i64, max: i64 },
    Url,
    /// Several URLs, joined into one client-usable value on save
    UrlList,
}

impl FieldKind {
    /// `type` attribute of the rendered `<input>`
    pub fn input_type(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Password => "password",
            FieldKind::Number { .. } => "number",
            FieldKind::Url | FieldKind::UrlList => "url",
        }
    }

    /// Whether the field needs client-side script to be usable.
    pub fn is_interactive(self) -> bool {
        matches!(self, FieldKind::UrlList)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<&'static str>,
    /// Placeholder text shown inside the input
    pub help: &'static str,
}

impl FieldDescriptor {
    pub fn new(key: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            label,
            kind,
            required: false,
            default: None,
            help: "",
        }
    }

    pub fn text(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Text)
    }

    pub fn password(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Password)
    }

    pub fn number(key: &'static str, label: &'static str, min: i64, max: i64) -> Self {
        Self::new(key, label, FieldKind::Number { min, max })
    }

    pub fn url(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Url)
    }

    pub fn url_list(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::UrlList)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_help(mut self, help: &'static str) -> Self {
        self.help = help;
        self
    }
}

/// Insertion-ordered set of field descriptors, unique by key.
#[derive(Clone, Debug, Default)]
pub struct FieldSet {
    fields: IndexMap<&'static str, FieldDescriptor>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `field`, replacing any descriptor already stored under the same key.
    /// A replaced key keeps its original position.
    pub fn insert(&mut self, field: FieldDescriptor) {
        self.fields.insert(field.key, field);
    }

    /// Drops `key`, keeping the order of the remaining fields.
    pub fn remove(&mut self, key: &str) -> Option<FieldDescriptor> {
        self.fields.shift_remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    pub fn iter(&self) -> Values<'_, &'static str, FieldDescriptor> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// Order-sensitive, unlike IndexMap's own equality.
impl PartialEq for FieldSet {
    fn eq(&self, other: &Self) -> bool {
        self.fields.iter().eq(other.fields.iter())
    }
}

impl Eq for FieldSet {}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = &'a FieldDescriptor;
    type IntoIter = Values<'a, &'static str, FieldDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
