use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use tibu_domain::repository::{ConnectionState, ConnectionStateRepository};
use tibu_domain::{ConnectionKey, DomainError, PluginId};

/// One pretty-printed JSON file per connection:
/// `<root>/<plugin id>/<connection>.json`, names percent-escaped.
pub struct JsonFileStateRepository {
    root: PathBuf,
}

fn escape(component: &str) -> String {
    let mut escaped = String::with_capacity(component.len());
    for byte in component.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => escaped.push(byte as char),
            _ => escaped.push_str(&format!("%{:02X}", byte)),
        }
    }
    if escaped.is_empty() {
        escaped.push('%');
    }
    escaped
}

fn io_error(context: &str, path: &Path, e: impl std::fmt::Display) -> DomainError {
    DomainError::Repository(format!("{} {}: {}", context, path.display(), e))
}

impl JsonFileStateRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn plugin_dir(&self, plugin_id: &PluginId) -> PathBuf {
        self.root.join(escape(plugin_id.as_str()))
    }

    fn path_for(&self, key: &ConnectionKey) -> PathBuf {
        self.plugin_dir(&key.plugin_id)
            .join(format!("{}.json", escape(&key.connection)))
    }
}

#[async_trait]
impl ConnectionStateRepository for JsonFileStateRepository {
    async fn load(&self, key: &ConnectionKey) -> Result<Option<ConnectionState>, DomainError> {
        let path = self.path_for(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("Failed to read", &path, e)),
        };
        let state: ConnectionState = serde_json::from_str(&content)
            .map_err(|e| DomainError::Serialization(format!("{}: {}", path.display(), e)))?;
        Ok(Some(state))
    }

    async fn save(&self, state: &ConnectionState) -> Result<(), DomainError> {
        let dir = self.plugin_dir(&state.key.plugin_id);
        let path = self.path_for(&state.key);
        let json = serde_json::to_vec_pretty(state)?;

        // Write beside the target then rename, so a crash never leaves half a file
        tokio::task::spawn_blocking(move || -> Result<(), DomainError> {
            std::fs::create_dir_all(&dir).map_err(|e| io_error("Failed to create", &dir, e))?;
            let mut file = tempfile::NamedTempFile::new_in(&dir)
                .map_err(|e| io_error("Failed to create temp file in", &dir, e))?;
            file.write_all(&json)
                .map_err(|e| io_error("Failed to write", file.path(), e))?;
            file.persist(&path)
                .map_err(|e| io_error("Failed to replace", &path, e))?;
            Ok(())
        })
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))??;

        debug!(key = %state.key, "Connection state saved");
        Ok(())
    }

    async fn delete(&self, key: &ConnectionKey) -> Result<bool, DomainError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error("Failed to delete", &path, e)),
        }
    }

    async fn list(&self, plugin_id: &PluginId) -> Result<Vec<ConnectionKey>, DomainError> {
        let dir = self.plugin_dir(plugin_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("Failed to list", &dir, e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("Failed to list", &dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            // The key is read back from the file rather than decoded from its name
            let parsed = tokio::fs::read_to_string(&path)
                .await
                .ok()
                .and_then(|content| serde_json::from_str::<ConnectionState>(&content).ok());
            match parsed {
                Some(state) if &state.key.plugin_id == plugin_id => keys.push(state.key),
                Some(_) => warn!(path = %path.display(), "State file belongs to another plugin"),
                None => warn!(path = %path.display(), "Skipping unreadable state file"),
            }
        }
        keys.sort();
        Ok(keys)
    }
}
