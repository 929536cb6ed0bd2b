use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use tibu_domain::repository::{ConnectionState, ConnectionStateRepository};
use tibu_domain::{ConnectionKey, DomainError, PluginId};

/// Process-local state, used by tests and one-shot runs.
#[derive(Debug, Default)]
pub struct InMemoryStateRepository {
    states: RwLock<BTreeMap<ConnectionKey, ConnectionState>>,
}

impl InMemoryStateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionStateRepository for InMemoryStateRepository {
    async fn load(&self, key: &ConnectionKey) -> Result<Option<ConnectionState>, DomainError> {
        Ok(self.states.read().await.get(key).cloned())
    }

    async fn save(&self, state: &ConnectionState) -> Result<(), DomainError> {
        self.states
            .write()
            .await
            .insert(state.key.clone(), state.clone());
        Ok(())
    }

    async fn delete(&self, key: &ConnectionKey) -> Result<bool, DomainError> {
        Ok(self.states.write().await.remove(key).is_some())
    }

    async fn list(&self, plugin_id: &PluginId) -> Result<Vec<ConnectionKey>, DomainError> {
        Ok(self
            .states
            .read()
            .await
            .keys()
            .filter(|k| &k.plugin_id == plugin_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_delete() {
        let repo = InMemoryStateRepository::new();
        let key = ConnectionKey::new(PluginId::from_string("json-bank"), "main");

        assert!(repo.load(&key).await.unwrap().is_none());

        let mut state = ConnectionState::new(key.clone());
        state.settings.insert("token".into(), "t1".into());
        repo.save(&state).await.unwrap();
        assert_eq!(repo.load(&key).await.unwrap(), Some(state));

        assert!(repo.delete(&key).await.unwrap());
        assert!(!repo.delete(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_filters_by_plugin() {
        let repo = InMemoryStateRepository::new();
        let bank = PluginId::from_string("json-bank");
        for (plugin, connection) in [("json-bank", "a"), ("json-bank", "b"), ("other", "a")] {
            let key = ConnectionKey::new(PluginId::from_string(plugin), connection);
            repo.save(&ConnectionState::new(key)).await.unwrap();
        }

        let keys = repo.list(&bank).await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.plugin_id == bank));
    }
}
