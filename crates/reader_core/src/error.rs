//! Error taxonomy for a read operation

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why no read target was available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoCandidate {
    /// The page has no surfaces at all
    NoSurfaces,
    /// Surfaces exist but none is large enough and on-screen
    NoneSuitable,
}

/// Errors raised while reading a surface
///
/// All of these are recovered by the reader and reported as status text;
/// none of them leaves the reader outside `Idle`.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("no candidate surface: {0:?}")]
    NoCandidate(NoCandidate),

    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("recognition failed: {0}")]
    RecognitionFailure(String),

    #[error("recognition returned no text")]
    EmptyResult,

    #[error("failed to prepare image: {0}")]
    Preprocess(#[from] image::ImageError),

    #[error("a read is already in progress")]
    Busy,
}

pub type Result<T> = std::result::Result<T, ReaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ReaderError::EngineUnavailable("tessdata missing".to_string());
        assert_eq!(err.to_string(), "OCR engine unavailable: tessdata missing");

        let err = ReaderError::NoCandidate(NoCandidate::NoneSuitable);
        assert!(err.to_string().contains("NoneSuitable"));
    }
}
