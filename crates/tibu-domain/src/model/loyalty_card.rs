use serde::{Deserialize, Serialize};

use super::FileAttachment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarcodeType {
    #[serde(rename = "EAN_13")]
    Ean13,
    #[serde(rename = "EAN_8")]
    Ean8,
    #[serde(rename = "UPC_A")]
    UpcA,
    #[serde(rename = "UPC_E")]
    UpcE,
    #[serde(rename = "CODE_39")]
    Code39,
    #[serde(rename = "CODE_93")]
    Code93,
    #[serde(rename = "CODE_128")]
    Code128,
    #[serde(rename = "ITF")]
    Itf,
    #[serde(rename = "CODABAR")]
    Codabar,
    #[serde(rename = "QR_CODE")]
    QrCode,
    #[serde(rename = "DATA_MATRIX")]
    DataMatrix,
    #[serde(rename = "PDF_417")]
    Pdf417,
    #[serde(rename = "AZTEC")]
    Aztec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyCard {
    /// Untruncated; the host cuts it to [`LoyaltyCard::ISSUER_MAX_LENGTH`].
    pub issuer: String,
    pub barcode_type: BarcodeType,
    pub reference: String,
    pub cover: Option<FileAttachment>,
}

impl LoyaltyCard {
    pub const ISSUER_MAX_LENGTH: usize = 100;

    pub fn new(
        issuer: impl Into<String>,
        barcode_type: BarcodeType,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            barcode_type,
            reference: reference.into(),
            cover: None,
        }
    }

    pub fn with_cover(mut self, cover: FileAttachment) -> Self {
        self.cover = Some(cover);
        self
    }
}
