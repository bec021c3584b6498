use thiserror::Error;

#[derive(Error, Debug)]
pub enum LingoError {
    #[error("Incompatible stages: {predecessor} -> {successor}, {reason}")]
    IncompatibleStage {
        predecessor: String,
        successor: String,
        reason: String,
    },

    #[error("Attribute binding failed: stage={stage}, key={key}, {message}")]
    Binding {
        stage: String,
        key: String,
        message: String,
    },

    #[error("Token pool contract violation: slot {index} generation {generation}, pool at generation {current}")]
    PoolContractViolation {
        index: u32,
        generation: u32,
        current: u32,
    },

    #[error("Processing error: stage={stage}, {message}")]
    Processing { stage: String, message: String },

    #[error("Unrecognized lexeme at offset {offset}: {text:?}")]
    UnrecognizedLexeme { offset: usize, text: String },

    #[error("Unknown algorithm: {name}")]
    UnknownAlgorithm { name: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl LingoError {
    pub fn processing(stage: impl Into<String>, message: impl Into<String>) -> Self {
        LingoError::Processing {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn binding(
        stage: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        LingoError::Binding {
            stage: stage.into(),
            key: key.into(),
            message: message.into(),
        }
    }
}

pub type LingoResult<T> = Result<T, LingoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formats() {
        let err = LingoError::IncompatibleStage {
            predecessor: "source".into(),
            successor: "lingo".into(),
            reason: "no shared capability".into(),
        };
        assert_eq!(
            err.to_string(),
            "Incompatible stages: source -> lingo, no shared capability"
        );

        let err = LingoError::binding("tokenizer", "tokenizer.pool_hard_size", "type mismatch");
        assert!(err.to_string().contains("tokenizer.pool_hard_size"));

        let err = LingoError::PoolContractViolation {
            index: 3,
            generation: 1,
            current: 2,
        };
        assert!(err.to_string().contains("generation 1"));

        let err = LingoError::processing("language", "buffer overflow");
        assert!(err.to_string().contains("language"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LingoError>();
    }

    #[test]
    fn json_error_converts() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: LingoError = json_err.into();
        assert!(matches!(err, LingoError::Serialization(_)));
    }

    #[test]
    fn anyhow_error_converts() {
        let err: LingoError = anyhow::anyhow!("host failure").into();
        assert_eq!(err.to_string(), "host failure");
    }
}
