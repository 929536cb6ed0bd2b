use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

use super::FileAttachment;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuantityUnit {
    #[default]
    Unit,
    Gram,
    Liter,
    Meter,
    SquareMeter,
    CubicMeter,
    Hour,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductReferenceType {
    Gtin,
    Ean,
    Upc,
    Isbn,
    Asin,
    Sku,
    Other,
}

/// A purchased line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub label: String,
    pub brand: Option<String>,
    /// Line total, not unit price.
    pub price: f64,
    pub quantity: f64,
    #[serde(default)]
    pub quantity_unit: QuantityUnit,
    #[serde(default)]
    pub references: BTreeMap<ProductReferenceType, String>,
    #[serde(default)]
    pub files: Vec<FileAttachment>,
    pub url: Option<Url>,
}

impl Item {
    pub fn new(label: impl Into<String>, price: f64, quantity: f64) -> Self {
        Self {
            label: label.into(),
            brand: None,
            price,
            quantity,
            quantity_unit: QuantityUnit::Unit,
            references: BTreeMap::new(),
            files: Vec::new(),
            url: None,
        }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_unit(mut self, unit: QuantityUnit) -> Self {
        self.quantity_unit = unit;
        self
    }

    /// Replaces any earlier reference of the same type.
    pub fn with_reference(mut self, kind: ProductReferenceType, value: impl Into<String>) -> Self {
        self.references.insert(kind, value.into());
        self
    }

    pub fn with_file(mut self, file: FileAttachment) -> Self {
        self.files.push(file);
        self
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    pub fn unit_price(&self) -> Option<f64> {
        if self.quantity == 0.0 {
            None
        } else {
            Some(self.price / self.quantity)
        }
    }
}
