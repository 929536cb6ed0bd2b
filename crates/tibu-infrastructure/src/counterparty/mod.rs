use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

use tibu_domain::capability::counterparty::{
    CoreMetadataKey, MetadataKeyError, MetadataKeyRegistry,
};
use tibu_domain::capability::{CounterpartyProvider, CounterpartyQuery};

/// A known counterparty and its metadata (`tibu:` keys).
#[derive(Debug, Clone, PartialEq)]
pub struct CounterpartyRecord {
    pub id: Uuid,
    pub text: BTreeMap<String, String>,
    pub numeric: BTreeMap<String, f64>,
}

impl CounterpartyRecord {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            text: BTreeMap::new(),
            numeric: BTreeMap::new(),
        }
    }

    pub fn with_text(mut self, key: &str, value: impl Into<String>) -> Self {
        self.text.insert(key.to_string(), value.into());
        self
    }

    pub fn with_numeric(mut self, key: &str, value: f64) -> Self {
        self.numeric.insert(key.to_string(), value);
        self
    }
}

/// Immutable directory loaded at startup. Lookups never mutate it, so the
/// same query always gives the same answer.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCounterpartyDirectory {
    registry: MetadataKeyRegistry,
    records: Vec<CounterpartyRecord>,
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// `Some` only when exactly one id matched.
fn single<I: IntoIterator<Item = Uuid>>(matches: I) -> Option<Uuid> {
    let mut matches = matches.into_iter();
    let first = matches.next()?;
    if matches.any(|other| other != first) {
        return None;
    }
    Some(first)
}

impl InMemoryCounterpartyDirectory {
    pub fn new(registry: MetadataKeyRegistry, records: Vec<CounterpartyRecord>) -> Self {
        Self { registry, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Exact match on the text value, or on the numeric value when the
    /// text parses as a number.
    fn find_text(&self, key: &str, value: &str) -> Option<Uuid> {
        let wanted = value.trim();
        let as_number = wanted.parse::<f64>().ok();
        single(
            self.records
                .iter()
                .filter(|r| {
                    r.text.get(key).is_some_and(|v| v.trim() == wanted)
                        || as_number.is_some_and(|n| r.numeric.get(key) == Some(&n))
                })
                .map(|r| r.id),
        )
    }

    fn search_text(&self, query: &str) -> Option<Uuid> {
        let wanted = normalize(query);
        if wanted.is_empty() {
            return None;
        }
        let name_keys = [
            CoreMetadataKey::Name,
            CoreMetadataKey::Brand,
            CoreMetadataKey::TransactionKeyword,
        ];
        single(
            self.records
                .iter()
                .filter(|r| {
                    name_keys
                        .iter()
                        .any(|k| r.text.get(k.key()).is_some_and(|v| normalize(v) == wanted))
                })
                .map(|r| r.id),
        )
    }
}

#[async_trait]
impl CounterpartyProvider for InMemoryCounterpartyDirectory {
    async fn search(&self, query: &str) -> Option<Uuid> {
        let found = match CounterpartyQuery::parse(query) {
            CounterpartyQuery::Identifier { key, value } => self.find_text(key.key(), &value),
            CounterpartyQuery::Text(text) => self.search_text(&text),
        };
        debug!(query, found = found.is_some(), "Counterparty search");
        found
    }

    async fn find(&self, key: &str, value: &str) -> Result<Option<Uuid>, MetadataKeyError> {
        self.registry.check_lookup(key, false)?;
        Ok(self.find_text(key, value))
    }

    async fn find_numeric(&self, key: &str, value: f64) -> Result<Option<Uuid>, MetadataKeyError> {
        self.registry.check_lookup(key, true)?;
        Ok(single(
            self.records
                .iter()
                .filter(|r| r.numeric.get(key).is_some_and(|v| *v == value))
                .map(|r| r.id),
        ))
    }
}
