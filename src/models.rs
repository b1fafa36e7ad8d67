use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorKind;

/// Wire names of the canonical identity fields, in output order.
pub const FIELD_KEYS: [&str; 8] = [
    "nome",
    "cognome",
    "dataNascita",
    "luogoNascita",
    "codiceFiscale",
    "numeroDocumento",
    "dataRilascio",
    "dataScadenza",
];

/// Body of the analyze route. `ocrText` is kept as a raw value so that a
/// missing or non-string field can be reported as invalid input instead of
/// an extractor rejection.
#[derive(Debug, Deserialize)]
pub struct ExtractionRequest {
    #[serde(rename = "ocrText", default)]
    pub ocr_text: Value,
}

/// The fixed eight-field record. An empty string means "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub nome: String,
    pub cognome: String,
    pub data_nascita: String,
    pub luogo_nascita: String,
    pub codice_fiscale: String,
    pub numero_documento: String,
    pub data_rilascio: String,
    pub data_scadenza: String,
}

impl IdentityRecord {
    /// Pairs of (wire key, value) in canonical order.
    pub fn fields(&self) -> [(&'static str, &str); 8] {
        [
            (FIELD_KEYS[0], self.nome.as_str()),
            (FIELD_KEYS[1], self.cognome.as_str()),
            (FIELD_KEYS[2], self.data_nascita.as_str()),
            (FIELD_KEYS[3], self.luogo_nascita.as_str()),
            (FIELD_KEYS[4], self.codice_fiscale.as_str()),
            (FIELD_KEYS[5], self.numero_documento.as_str()),
            (FIELD_KEYS[6], self.data_rilascio.as_str()),
            (FIELD_KEYS[7], self.data_scadenza.as_str()),
        ]
    }

    pub(crate) fn field_mut(&mut self, key: &str) -> Option<&mut String> {
        match key {
            "nome" => Some(&mut self.nome),
            "cognome" => Some(&mut self.cognome),
            "dataNascita" => Some(&mut self.data_nascita),
            "luogoNascita" => Some(&mut self.luogo_nascita),
            "codiceFiscale" => Some(&mut self.codice_fiscale),
            "numeroDocumento" => Some(&mut self.numero_documento),
            "dataRilascio" => Some(&mut self.data_rilascio),
            "dataScadenza" => Some(&mut self.data_scadenza),
            _ => None,
        }
    }

    /// Number of fields with a non-empty value.
    pub fn fields_extracted(&self) -> usize {
        self.fields().iter().filter(|(_, v)| !v.is_empty()).count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Raw text returned by the model plus whatever usage the provider reported.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmCompletion {
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub tokens: u32,
    pub estimated_cost: String,
    pub model: String,
}

impl CostEstimate {
    pub fn from_usage(usage: &Usage, cost_per_1k_tokens: f64, model: &str) -> Self {
        let tokens = usage.prompt_tokens.saturating_add(usage.completion_tokens);
        let cost = f64::from(tokens) / 1000.0 * cost_per_1k_tokens;
        Self {
            tokens,
            estimated_cost: format!("€{:.6}", cost),
            model: model.to_string(),
        }
    }
}

/// Successful pipeline output before it is shaped for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub record: IdentityRecord,
    pub fields_extracted: usize,
    pub processing_time_ms: u64,
    pub usage: Option<Usage>,
    pub cost: Option<CostEstimate>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<IdentityRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields_extracted: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<CostEstimate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl From<Extraction> for ExtractionResult {
    fn from(extraction: Extraction) -> Self {
        Self {
            success: true,
            data: Some(extraction.record),
            fields_extracted: Some(extraction.fields_extracted),
            processing_time_ms: Some(extraction.processing_time_ms),
            usage: extraction.usage,
            cost: extraction.cost,
            warnings: extraction.warnings,
            error: None,
            error_kind: None,
        }
    }
}

impl From<&crate::error::ExtractionError> for ExtractionResult {
    fn from(err: &crate::error::ExtractionError) -> Self {
        Self {
            success: false,
            data: None,
            fields_extracted: None,
            processing_time_ms: None,
            usage: None,
            cost: None,
            warnings: Vec::new(),
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
        }
    }
}
