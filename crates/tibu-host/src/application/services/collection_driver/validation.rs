use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use tibu_domain::{CollectorError, Message, MessageSet};

use crate::application::error::HostError;
use crate::application::instance::PluginInstance;

/// Parses raw input against the plugin's fields and hands each value over.
/// Every bad field is reported, not just the first.
pub fn apply_fields(
    instance: &mut PluginInstance,
    fields: &BTreeMap<String, String>,
) -> Result<MessageSet, HostError> {
    let descriptors = instance.fields();
    let mut messages = MessageSet::new();

    for (name, raw) in fields {
        let Some(descriptor) = descriptors.iter().find(|d| &d.name == name) else {
            warn!(field = %name, "Unknown field ignored");
            messages.push(
                Message::warn("field.unknown")
                    .for_field(name.clone())
                    .with_arg(Value::from(name.clone())),
            );
            continue;
        };

        let value = match descriptor.parse(raw) {
            Ok(value) => value,
            Err(e) => {
                messages.extend(e.messages());
                continue;
            }
        };

        match instance.set_field(name, value) {
            Ok(()) => {}
            Err(HostError::Collector(e @ CollectorError::Parameter { .. })) => {
                messages.extend(e.messages())
            }
            Err(e) => return Err(e),
        }
    }
    Ok(messages)
}
