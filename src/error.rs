use serde::Serialize;

// ── Error type ───────────────────────────────────────────────────────────────

/// Terminal failure of an extraction request.
///
/// The `Display` text is what the client sees, so it must never carry OCR
/// text, credentials or upstream response bodies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Servizio di analisi non configurato")]
    Unconfigured,
    #[error("Errore di autenticazione con il servizio di analisi")]
    AuthError,
    #[error("Rate limit raggiunto. Riprova più tardi.")]
    RateLimited,
    #[error("Servizio di analisi non disponibile")]
    ServiceUnavailable(u16),
    #[error("Errore del servizio di analisi")]
    ServiceFailure(u16),
    #[error("Impossibile contattare il servizio di analisi")]
    NetworkError,
    #[error("Timeout della richiesta al servizio di analisi")]
    Timeout,
    #[error("Risposta non valida dal servizio di analisi")]
    MalformedResponse,
    #[error("Formato JSON non trovato nella risposta")]
    NoJsonFound,
    #[error("JSON non valido nella risposta")]
    InvalidJson,
}

/// Wire-level classification of an [`ExtractionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidInput,
    Unconfigured,
    AuthError,
    RateLimited,
    ServiceUnavailable,
    ServiceFailure,
    NetworkError,
    Timeout,
    MalformedResponse,
    NoJsonFound,
    InvalidJson,
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractionError::InvalidInput(_) => ErrorKind::InvalidInput,
            ExtractionError::Unconfigured => ErrorKind::Unconfigured,
            ExtractionError::AuthError => ErrorKind::AuthError,
            ExtractionError::RateLimited => ErrorKind::RateLimited,
            ExtractionError::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            ExtractionError::ServiceFailure(_) => ErrorKind::ServiceFailure,
            ExtractionError::NetworkError => ErrorKind::NetworkError,
            ExtractionError::Timeout => ErrorKind::Timeout,
            ExtractionError::MalformedResponse => ErrorKind::MalformedResponse,
            ExtractionError::NoJsonFound => ErrorKind::NoJsonFound,
            ExtractionError::InvalidJson => ErrorKind::InvalidJson,
        }
    }

    /// True when the failure happened before the completion endpoint was
    /// reached, i.e. no provider quota was spent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ExtractionError::InvalidInput(_) | ExtractionError::Unconfigured
        )
    }
}
