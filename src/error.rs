use thiserror::Error;

/// Why a prediction fetch was rejected. Every variant leads to the same error
/// screen; the distinction is for diagnostics.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("prediction source failed: {0}")]
    FetchFailed(String),

    #[error("no JSON array found in model response")]
    InvalidResponseShape,

    #[error("model response is not valid prediction JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

impl FetchError {
    /// Message shown to the user on the error screen.
    pub fn user_message(&self) -> &'static str {
        match self {
            FetchError::FetchFailed(_) => {
                "No se pudieron obtener las predicciones. La API puede estar ocupada."
            }
            FetchError::InvalidResponseShape => "La IA no devolvió un JSON válido.",
            FetchError::MalformedJson(_) => {
                "Error al procesar la respuesta de la IA. Inténtalo de nuevo."
            }
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::FetchFailed(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_kind_has_a_distinct_user_message() {
        let malformed = serde_json::from_str::<Vec<u8>>("[1,").unwrap_err();
        let messages = [
            FetchError::FetchFailed("503".to_string()).user_message(),
            FetchError::InvalidResponseShape.user_message(),
            FetchError::MalformedJson(malformed).user_message(),
        ];
        assert_eq!(messages[1], "La IA no devolvió un JSON válido.");
        assert_ne!(messages[0], messages[1]);
        assert_ne!(messages[1], messages[2]);
        assert_ne!(messages[0], messages[2]);
    }
}
