use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a message shown to the end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Info,
    Error,
    Warn,
    Success,
}

/// A localizable message, optionally attached to one input field.
///
/// `key` is a localization key, `args` its positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub field_name: Option<String>,
    pub key: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Message {
    pub fn new(kind: MessageKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            field_name: None,
            key: key.into(),
            args: Vec::new(),
        }
    }

    pub fn error(key: impl Into<String>) -> Self {
        Self::new(MessageKind::Error, key)
    }

    pub fn warn(key: impl Into<String>) -> Self {
        Self::new(MessageKind::Warn, key)
    }

    pub fn info(key: impl Into<String>) -> Self {
        Self::new(MessageKind::Info, key)
    }

    pub fn success(key: impl Into<String>) -> Self {
        Self::new(MessageKind::Success, key)
    }

    pub fn for_field(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    pub fn with_arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = Value>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn is_error(&self) -> bool {
        self.kind == MessageKind::Error
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field_name {
            Some(field) => write!(f, "[{:?}] {}: {}", self.kind, field, self.key)?,
            None => write!(f, "[{:?}] {}", self.kind, self.key)?,
        }
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
            write!(f, " ({})", args.join(", "))?;
        }
        Ok(())
    }
}

/// Messages grouped by field name (`None` = global).
///
/// Insertion order is kept inside each group. Validation passes iff the set
/// holds no `Error` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageSet {
    messages: Vec<Message>,
}

impl MessageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(message: Message) -> Self {
        Self {
            messages: vec![message],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn extend(&mut self, other: MessageSet) {
        self.messages.extend(other.messages);
    }

    pub fn global_messages(&self) -> Vec<&Message> {
        self.field_messages_opt(None)
    }

    pub fn field_messages(&self, field_name: &str) -> Vec<&Message> {
        self.field_messages_opt(Some(field_name))
    }

    fn field_messages_opt(&self, field_name: Option<&str>) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| m.field_name.as_deref() == field_name)
            .collect()
    }

    pub fn has_global_messages(&self) -> bool {
        self.messages.iter().any(|m| m.field_name.is_none())
    }

    pub fn has_field_messages(&self, field_name: &str) -> bool {
        self.messages
            .iter()
            .any(|m| m.field_name.as_deref() == Some(field_name))
    }

    /// Distinct field names carrying at least one message, in first-seen order.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for name in self.messages.iter().filter_map(|m| m.field_name.as_deref()) {
            if !fields.contains(&name) {
                fields.push(name);
            }
        }
        fields
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn has_kind(&self, kind: MessageKind) -> bool {
        self.messages.iter().any(|m| m.kind == kind)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.messages.iter().any(|m| m.key == key)
    }

    pub fn passes(&self) -> bool {
        !self.has_kind(MessageKind::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_error())
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

impl From<Message> for MessageSet {
    fn from(message: Message) -> Self {
        Self::single(message)
    }
}

impl FromIterator<Message> for MessageSet {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for MessageSet {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

impl std::fmt::Display for MessageSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.messages.iter().map(|m| m.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}
