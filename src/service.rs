use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::error::ExtractionError;
use crate::gateway::CompletionGateway;
use crate::models::{CostEstimate, Extraction, ExtractionResult};
use crate::normalize::{format_warnings, normalize};
use crate::prompt::build_prompt;
use crate::response::extract_json_object;

pub const MIN_OCR_CHARS: usize = 5;
pub const MAX_OCR_CHARS: usize = 15_000;

/// The extraction pipeline. Holds no per-request state, so a single instance
/// is shared by every handler.
pub struct ExtractionService {
    gateway: Arc<dyn CompletionGateway>,
    cost_per_1k_tokens: f64,
}

impl ExtractionService {
    pub fn new(gateway: Arc<dyn CompletionGateway>, cost_per_1k_tokens: f64) -> Self {
        Self {
            gateway,
            cost_per_1k_tokens,
        }
    }

    /// Run the pipeline and fold the outcome into the wire result.
    pub async fn run(&self, ocr_text: &str) -> ExtractionResult {
        match self.try_run(ocr_text).await {
            Ok(extraction) => extraction.into(),
            Err(e) => ExtractionResult::from(&e),
        }
    }

    /// validate → prompt → completion → JSON recovery → normalization.
    /// Every stage failure is terminal for the request.
    pub async fn try_run(&self, ocr_text: &str) -> Result<Extraction, ExtractionError> {
        let started = Instant::now();

        validate_ocr_text(ocr_text)?;
        let prompt = build_prompt(ocr_text);

        let completion = self.gateway.complete(&prompt).await.map_err(|e| {
            if e.is_local() {
                tracing::warn!(kind = ?e.kind(), "extraction not attempted");
            } else {
                tracing::error!(kind = ?e.kind(), "completion failed");
            }
            e
        })?;

        let raw = extract_json_object(&completion.content).map_err(|e| {
            tracing::error!(
                kind = ?e.kind(),
                completion_len = completion.content.len(),
                "no usable JSON in completion"
            );
            e
        })?;

        let record = normalize(&Value::Object(raw));
        let fields_extracted = record.fields_extracted();
        let warnings = format_warnings(&record);
        if !warnings.is_empty() {
            tracing::warn!(count = warnings.len(), "extracted fields with unexpected format");
        }

        let cost = completion.usage.as_ref().map(|usage| {
            CostEstimate::from_usage(usage, self.cost_per_1k_tokens, self.gateway.model())
        });
        let processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        tracing::info!(fields_extracted, processing_time_ms, "extraction completed");

        Ok(Extraction {
            record,
            fields_extracted,
            processing_time_ms,
            usage: completion.usage,
            cost,
            warnings,
        })
    }
}

/// Lengths are counted in characters. The lower bound applies to the trimmed
/// text; the upper bound to the raw text, since that is what gets sent.
pub fn validate_ocr_text(ocr_text: &str) -> Result<(), ExtractionError> {
    let len = ocr_text.trim().chars().count();
    if len < MIN_OCR_CHARS {
        tracing::warn!(len, "OCR text too short");
        return Err(ExtractionError::InvalidInput(format!(
            "Testo OCR troppo corto (min {} caratteri)",
            MIN_OCR_CHARS
        )));
    }
    let raw_len = ocr_text.chars().count();
    if raw_len > MAX_OCR_CHARS {
        tracing::warn!(len = raw_len, "OCR text too long");
        return Err(ExtractionError::InvalidInput(format!(
            "Testo troppo lungo (max {} caratteri)",
            MAX_OCR_CHARS
        )));
    }
    Ok(())
}
