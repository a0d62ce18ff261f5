use thiserror::Error;

#[derive(Debug, Error)]
pub enum NavEngineError {
    #[error("Invalid input: {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Data unavailable: {context}")]
    DataAvailability { context: String },

    #[error("Numeric overflow in {context}")]
    NumericOverflow { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl NavEngineError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        NavEngineError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn data_availability(context: impl Into<String>) -> Self {
        NavEngineError::DataAvailability {
            context: context.into(),
        }
    }
}

impl From<serde_json::Error> for NavEngineError {
    fn from(e: serde_json::Error) -> Self {
        NavEngineError::SerializationError(e.to_string())
    }
}
