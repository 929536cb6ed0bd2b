use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const METADATA_NAMESPACE: &str = "tibu:";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataKeyError {
    #[error("metadata key is blank")]
    Blank,

    #[error("unknown metadata key: {0}")]
    Unknown(String),

    #[error("metadata key {0} does not identify a single counterparty")]
    NotUnique(String),

    #[error("metadata key {key} expects a {expected} value")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("metadata key {0} is outside the tibu: namespace")]
    InvalidFormat(String),

    #[error("metadata key {0} is already registered")]
    AlreadyRegistered(String),
}

/// Keys every counterparty directory understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoreMetadataKey {
    Name,
    SourceType,
    SourceOpenStreetMap,
    SourceUser,
    SourceUserPro,
    MainActivity,
    Latitude,
    Longitude,
    Address,
    City,
    District,
    CommercialArea,
    Brand,
    Logo128,
    IdBic,
    IdFrSiret,
    IdFrSiren,
    IdEuVat,
    IdLei,
    IdPowens,
    TransactionKeyword,
}

impl CoreMetadataKey {
    pub const ALL: [CoreMetadataKey; 21] = [
        CoreMetadataKey::Name,
        CoreMetadataKey::SourceType,
        CoreMetadataKey::SourceOpenStreetMap,
        CoreMetadataKey::SourceUser,
        CoreMetadataKey::SourceUserPro,
        CoreMetadataKey::MainActivity,
        CoreMetadataKey::Latitude,
        CoreMetadataKey::Longitude,
        CoreMetadataKey::Address,
        CoreMetadataKey::City,
        CoreMetadataKey::District,
        CoreMetadataKey::CommercialArea,
        CoreMetadataKey::Brand,
        CoreMetadataKey::Logo128,
        CoreMetadataKey::IdBic,
        CoreMetadataKey::IdFrSiret,
        CoreMetadataKey::IdFrSiren,
        CoreMetadataKey::IdEuVat,
        CoreMetadataKey::IdLei,
        CoreMetadataKey::IdPowens,
        CoreMetadataKey::TransactionKeyword,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            CoreMetadataKey::Name => "tibu:name",
            CoreMetadataKey::SourceType => "tibu:source:type",
            CoreMetadataKey::SourceOpenStreetMap => "tibu:source:osm",
            CoreMetadataKey::SourceUser => "tibu:source:usr",
            CoreMetadataKey::SourceUserPro => "tibu:source:pro",
            CoreMetadataKey::MainActivity => "tibu:activity:main",
            CoreMetadataKey::Latitude => "tibu:latitude",
            CoreMetadataKey::Longitude => "tibu:longitude",
            CoreMetadataKey::Address => "tibu:address:full",
            CoreMetadataKey::City => "tibu:address:city",
            CoreMetadataKey::District => "tibu:address:district",
            CoreMetadataKey::CommercialArea => "tibu:address:commercial_area",
            CoreMetadataKey::Brand => "tibu:brand",
            CoreMetadataKey::Logo128 => "tibu:logo:128x128",
            CoreMetadataKey::IdBic => "tibu:id:bic",
            CoreMetadataKey::IdFrSiret => "tibu:id:fr:siret",
            CoreMetadataKey::IdFrSiren => "tibu:id:fr:siren",
            CoreMetadataKey::IdEuVat => "tibu:id:eu:vat",
            CoreMetadataKey::IdLei => "tibu:id:lei",
            CoreMetadataKey::IdPowens => "tibu:id:powens",
            CoreMetadataKey::TransactionKeyword => "tibu:transaction_keyword",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CoreMetadataKey::Name => "Display name",
            CoreMetadataKey::SourceType => "Origin of the record",
            CoreMetadataKey::SourceOpenStreetMap => "OpenStreetMap element id",
            CoreMetadataKey::SourceUser => "Created by a user",
            CoreMetadataKey::SourceUserPro => "Created by the business itself",
            CoreMetadataKey::MainActivity => "Main activity",
            CoreMetadataKey::Latitude => "Latitude (WGS84)",
            CoreMetadataKey::Longitude => "Longitude (WGS84)",
            CoreMetadataKey::Address => "Full postal address",
            CoreMetadataKey::City => "City",
            CoreMetadataKey::District => "District",
            CoreMetadataKey::CommercialArea => "Shopping mall or commercial area",
            CoreMetadataKey::Brand => "Brand",
            CoreMetadataKey::Logo128 => "Logo, 128x128",
            CoreMetadataKey::IdBic => "Bank identifier code",
            CoreMetadataKey::IdFrSiret => "French establishment number (SIRET)",
            CoreMetadataKey::IdFrSiren => "French company number (SIREN)",
            CoreMetadataKey::IdEuVat => "EU VAT number",
            CoreMetadataKey::IdLei => "Legal entity identifier",
            CoreMetadataKey::IdPowens => "Powens counterparty id",
            CoreMetadataKey::TransactionKeyword => "Keyword found in transaction labels",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            CoreMetadataKey::Latitude
                | CoreMetadataKey::Longitude
                | CoreMetadataKey::IdFrSiret
                | CoreMetadataKey::IdFrSiren
        )
    }

    /// Whether one value identifies at most one counterparty.
    pub fn is_unique(&self) -> bool {
        matches!(
            self,
            CoreMetadataKey::SourceOpenStreetMap
                | CoreMetadataKey::IdBic
                | CoreMetadataKey::IdFrSiret
                | CoreMetadataKey::IdFrSiren
                | CoreMetadataKey::IdEuVat
                | CoreMetadataKey::IdLei
                | CoreMetadataKey::IdPowens
        )
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.key() == key)
    }

    pub fn definition(&self) -> MetadataKeyDefinition {
        MetadataKeyDefinition {
            key: self.key().to_string(),
            description: self.description().to_string(),
            numeric: self.is_numeric(),
            unique: self.is_unique(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataKeyDefinition {
    pub key: String,
    pub description: String,
    pub numeric: bool,
    pub unique: bool,
}

/// Core keys plus keys registered by the host.
#[derive(Debug, Clone)]
pub struct MetadataKeyRegistry {
    keys: BTreeMap<String, MetadataKeyDefinition>,
}

impl Default for MetadataKeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataKeyRegistry {
    pub fn new() -> Self {
        let keys = CoreMetadataKey::ALL
            .iter()
            .map(|k| (k.key().to_string(), k.definition()))
            .collect();
        Self { keys }
    }

    pub fn register(&mut self, definition: MetadataKeyDefinition) -> Result<(), MetadataKeyError> {
        let key = definition.key.trim();
        if key.is_empty() {
            return Err(MetadataKeyError::Blank);
        }
        let name = key.strip_prefix(METADATA_NAMESPACE).unwrap_or_default();
        if name.is_empty() || name.split(':').any(str::is_empty) {
            return Err(MetadataKeyError::InvalidFormat(key.to_string()));
        }
        if self.keys.contains_key(key) {
            return Err(MetadataKeyError::AlreadyRegistered(key.to_string()));
        }
        let key = key.to_string();
        self.keys.insert(
            key.clone(),
            MetadataKeyDefinition { key, ..definition },
        );
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<&MetadataKeyDefinition, MetadataKeyError> {
        if key.trim().is_empty() {
            return Err(MetadataKeyError::Blank);
        }
        self.keys
            .get(key)
            .ok_or_else(|| MetadataKeyError::Unknown(key.to_string()))
    }

    /// Checks that `key` can serve as an exact lookup key. Any unique key
    /// accepts a text value; a numeric value needs a numeric key.
    pub fn check_lookup(
        &self,
        key: &str,
        numeric: bool,
    ) -> Result<&MetadataKeyDefinition, MetadataKeyError> {
        let definition = self.get(key)?;
        if !definition.unique {
            return Err(MetadataKeyError::NotUnique(key.to_string()));
        }
        if numeric && !definition.numeric {
            return Err(MetadataKeyError::TypeMismatch {
                key: key.to_string(),
                expected: "text",
            });
        }
        Ok(definition)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &MetadataKeyDefinition> {
        self.keys.values()
    }
}
