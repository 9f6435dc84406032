//! Error types for the translation pipeline.
//!
//! Errors are tagged by kind rather than by origin. Every kind except `Io`
//! is recovered locally by the component that produced it: page failures
//! become artifact blocks, translation failures fall back to the original
//! text, cache failures degrade to an empty or unsaved cache.

use thiserror::Error;

/// Error type covering every failure kind the pipeline can produce.
#[derive(Error, Debug)]
pub enum BabelsbergError {
    /// Page-level extraction failure. Recovered as a `Metadata(artifact)` block.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// OCR failure. Recovered by leaving `ocr_text` empty.
    #[error("OCR failed: {0}")]
    Ocr(String),

    /// Translation call failure. Recovered by substituting the original text.
    #[error("Translation failed: {0}")]
    Translation(String),

    /// Per-task translation timeout. Handled like a translation failure.
    #[error("Translation timed out after {0}s")]
    Timeout(u64),

    /// Persistent cache could not be read. Recovered with an empty cache.
    #[error("Cache load failed: {0}")]
    CacheLoad(String),

    /// Persistent cache could not be written. Save is skipped.
    #[error("Cache save failed: {0}")]
    CacheSave(String),

    /// Markup structure did not survive translation. Triggers segmented retry.
    #[error("Markup validation failed: {0}")]
    Validation(String),

    /// Invalid or unreadable configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Fatal I/O error (input unreadable, output directory unwritable).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BabelsbergError {
    /// Create an extraction error from any displayable cause.
    pub fn extraction(msg: impl Into<String>) -> Self {
        BabelsbergError::Extraction(msg.into())
    }

    /// Create a translation error from any displayable cause.
    pub fn translation(msg: impl Into<String>) -> Self {
        BabelsbergError::Translation(msg.into())
    }

    /// Create a configuration error from any displayable cause.
    pub fn config(msg: impl Into<String>) -> Self {
        BabelsbergError::Config(msg.into())
    }

    /// Whether this error may abort the pipeline. Everything except I/O is
    /// converted to recoverable state at the component boundary.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BabelsbergError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, BabelsbergError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_error_display() {
        let err = BabelsbergError::extraction("page 3 unreadable");
        assert_eq!(err.to_string(), "Extraction failed: page 3 unreadable");
    }

    #[test]
    fn test_timeout_error_display() {
        let err = BabelsbergError::Timeout(600);
        assert_eq!(err.to_string(), "Translation timed out after 600s");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.pdf");
        let err: BabelsbergError = io_err.into();
        assert!(matches!(err, BabelsbergError::Io(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_non_fatal_kinds() {
        let recoverable = [
            BabelsbergError::extraction("x"),
            BabelsbergError::Ocr("x".into()),
            BabelsbergError::translation("x"),
            BabelsbergError::Timeout(1),
            BabelsbergError::CacheLoad("x".into()),
            BabelsbergError::CacheSave("x".into()),
            BabelsbergError::Validation("x".into()),
        ];
        for err in recoverable {
            assert!(!err.is_fatal(), "{err} should be recoverable");
        }
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let err: BabelsbergError = json_err.into();
        assert!(matches!(err, BabelsbergError::Json(_)));
    }

    #[test]
    fn test_error_propagation() {
        fn inner() -> Result<()> {
            Err(BabelsbergError::Validation("heading count drifted".into()))
        }
        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }
        assert!(matches!(outer(), Err(BabelsbergError::Validation(_))));
    }
}
