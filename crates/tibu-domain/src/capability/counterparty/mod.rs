mod metadata_keys;

use async_trait::async_trait;
use uuid::Uuid;

pub use metadata_keys::{
    CoreMetadataKey, MetadataKeyDefinition, MetadataKeyError, MetadataKeyRegistry,
    METADATA_NAMESPACE,
};

/// Resolves counterparties (merchants, banks, companies) to stable ids.
///
/// Lookups are pure: the same input yields the same output. Ambiguous
/// matches are reported as `None`, never guessed.
#[async_trait]
pub trait CounterpartyProvider: Send + Sync {
    /// Free text or `prefix:identifier` (see [`CounterpartyQuery`]).
    async fn search(&self, query: &str) -> Option<Uuid>;

    /// Exact lookup on a unique text key.
    async fn find(&self, key: &str, value: &str) -> Result<Option<Uuid>, MetadataKeyError>;

    /// Exact lookup on a unique numeric key.
    async fn find_numeric(&self, key: &str, value: f64) -> Result<Option<Uuid>, MetadataKeyError>;
}

/// A parsed `search` query.
#[derive(Debug, Clone, PartialEq)]
pub enum CounterpartyQuery {
    Identifier { key: CoreMetadataKey, value: String },
    Text(String),
}

impl CounterpartyQuery {
    const PREFIXES: [(&'static str, CoreMetadataKey); 7] = [
        ("bic", CoreMetadataKey::IdBic),
        ("fr_siret", CoreMetadataKey::IdFrSiret),
        ("fr_siren", CoreMetadataKey::IdFrSiren),
        ("eu_vat", CoreMetadataKey::IdEuVat),
        ("lei", CoreMetadataKey::IdLei),
        ("powens", CoreMetadataKey::IdPowens),
        ("osm", CoreMetadataKey::SourceOpenStreetMap),
    ];

    pub fn parse(query: &str) -> Self {
        let query = query.trim();
        if let Some((prefix, value)) = query.split_once(':') {
            let prefix = prefix.trim().to_ascii_lowercase();
            if let Some((_, key)) = Self::PREFIXES.iter().find(|(p, _)| *p == prefix) {
                return CounterpartyQuery::Identifier {
                    key: *key,
                    value: value.trim().to_string(),
                };
            }
        }
        CounterpartyQuery::Text(query.to_string())
    }
}
