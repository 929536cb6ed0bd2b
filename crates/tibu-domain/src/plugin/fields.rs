use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::CollectorError;
use crate::message::MessageSet;
use crate::shared::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    Date,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Number(_) => FieldKind::Number,
            FieldValue::Boolean(_) => FieldKind::Boolean,
            FieldValue::Date(_) => FieldKind::Date,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// String form used when a value is persisted in plugin settings.
    pub fn to_setting(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// One user input of a plugin form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub label_key: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub password: bool,
    pub required: bool,
    pub size: Option<u16>,
    pub maxlen: Option<usize>,
    /// Relative position; ties keep declaration order.
    #[serde(default)]
    pub order: i32,
    pub fieldset: Option<String>,
    #[serde(default)]
    pub show_fieldsets: Vec<String>,
    #[serde(default)]
    pub hide_fieldsets: Vec<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            label_key: format!("field.{}", name),
            name,
            kind,
            password: false,
            required: true,
            size: None,
            maxlen: None,
            order: 0,
            fieldset: None,
            show_fieldsets: Vec::new(),
            hide_fieldsets: Vec::new(),
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn password(name: impl Into<String>) -> Self {
        let mut field = Self::new(name, FieldKind::Text);
        field.password = true;
        field
    }

    /// Boolean fields default to optional: unchecked means `false`.
    pub fn toggle(name: impl Into<String>) -> Self {
        let mut field = Self::new(name, FieldKind::Boolean);
        field.required = false;
        field
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_label(mut self, label_key: impl Into<String>) -> Self {
        self.label_key = label_key.into();
        self
    }

    pub fn with_maxlen(mut self, maxlen: usize) -> Self {
        self.maxlen = Some(maxlen);
        self
    }

    pub fn with_size(mut self, size: u16) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn in_fieldset(mut self, fieldset: impl Into<String>) -> Self {
        self.fieldset = Some(fieldset.into());
        self
    }

    pub fn shows(mut self, fieldset: impl Into<String>) -> Self {
        self.show_fieldsets.push(fieldset.into());
        self
    }

    pub fn hides(mut self, fieldset: impl Into<String>) -> Self {
        self.hide_fieldsets.push(fieldset.into());
        self
    }

    fn has_toggles(&self) -> bool {
        !self.show_fieldsets.is_empty() || !self.hide_fieldsets.is_empty()
    }

    /// Checks a value against required / kind / maxlen.
    pub fn check(&self, value: Option<&FieldValue>) -> Result<(), CollectorError> {
        let value = match value {
            None => {
                if self.required {
                    return Err(CollectorError::parameter(&self.name, "field.required", vec![]));
                }
                return Ok(());
            }
            Some(v) => v,
        };

        if value.kind() != self.kind {
            return Err(CollectorError::parameter(
                &self.name,
                "field.invalid_type",
                vec![Value::from(format!("{:?}", self.kind))],
            ));
        }

        if let FieldValue::Text(text) = value {
            if self.required && text.trim().is_empty() {
                return Err(CollectorError::parameter(&self.name, "field.required", vec![]));
            }
            if let Some(max) = self.maxlen {
                if text.chars().count() > max {
                    return Err(CollectorError::parameter(
                        &self.name,
                        "field.maxlen",
                        vec![Value::from(max)],
                    ));
                }
            }
        }
        Ok(())
    }

    /// Parses user-entered text into a value of this field's kind.
    pub fn parse(&self, raw: &str) -> Result<FieldValue, CollectorError> {
        let invalid = || {
            CollectorError::parameter(
                &self.name,
                "field.invalid_type",
                vec![Value::from(format!("{:?}", self.kind))],
            )
        };
        let value = match self.kind {
            FieldKind::Text => FieldValue::Text(raw.to_string()),
            FieldKind::Number => FieldValue::Number(raw.trim().parse().map_err(|_| invalid())?),
            FieldKind::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => FieldValue::Boolean(true),
                "false" | "no" | "0" | "off" | "" => FieldValue::Boolean(false),
                _ => return Err(invalid()),
            },
            FieldKind::Date => FieldValue::Date(
                NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| invalid())?,
            ),
        };
        self.check(Some(&value))?;
        Ok(value)
    }
}

/// An ordered, validated set of field descriptors.
#[derive(Debug, Clone, PartialEq)]
pub struct FormLayout {
    fields: Vec<FieldDescriptor>,
}

impl FormLayout {
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self, DomainError> {
        let mut seen = BTreeSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(DomainError::Validation(format!(
                    "duplicate field name: {}",
                    field.name
                )));
            }
            if field.has_toggles() && field.kind != FieldKind::Boolean {
                return Err(DomainError::Validation(format!(
                    "field {} toggles fieldsets but is not a boolean",
                    field.name
                )));
            }
        }

        let mut fields = fields;
        // sort_by_key is stable
        fields.sort_by_key(|f| f.order);
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fieldsets visible given the current toggle values. A fieldset no
    /// toggle mentions is always visible; unset toggles count as `false`.
    pub fn visible_fieldsets(&self, values: &BTreeMap<String, FieldValue>) -> BTreeSet<String> {
        let mut visible: BTreeSet<String> = self
            .fields
            .iter()
            .filter_map(|f| f.fieldset.clone())
            .collect();

        for toggle in self.fields.iter().filter(|f| f.has_toggles()) {
            let on = values
                .get(&toggle.name)
                .and_then(FieldValue::as_bool)
                .unwrap_or(false);
            let (hidden, shown) = if on {
                (&toggle.hide_fieldsets, &toggle.show_fieldsets)
            } else {
                (&toggle.show_fieldsets, &toggle.hide_fieldsets)
            };
            for name in hidden {
                visible.remove(name);
            }
            for name in shown {
                visible.insert(name.clone());
            }
        }
        visible
    }

    pub fn visible_fields(&self, values: &BTreeMap<String, FieldValue>) -> Vec<&FieldDescriptor> {
        let fieldsets = self.visible_fieldsets(values);
        self.fields
            .iter()
            .filter(|f| f.fieldset.as_ref().map_or(true, |s| fieldsets.contains(s)))
            .collect()
    }

    /// Checks every visible field. Hidden fields are ignored.
    pub fn check_all(&self, values: &BTreeMap<String, FieldValue>) -> MessageSet {
        let mut messages = MessageSet::new();
        for field in self.visible_fields(values) {
            if let Err(e) = field.check(values.get(&field.name)) {
                messages.extend(e.messages());
            }
        }
        messages
    }
}
