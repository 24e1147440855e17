//! Filing error types.
//!
//! A step either succeeds, fails recoverably (the enclosing step may start
//! over), or fails fatally. Retry loops branch on
//! [`FilingError::is_recoverable`] and nothing else.

use std::fmt;

use thiserror::Error;

use super::surface::SurfaceError;

#[derive(Debug, Error)]
pub enum FilingError {
    /// Transient condition; the enclosing step can be restarted.
    #[error("{0}")]
    Recoverable(String),
    /// Structural problem that retrying will not fix.
    #[error("{0}")]
    Fatal(String),
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),
}

impl FilingError {
    pub fn recoverable(reason: impl Into<String>) -> Self {
        Self::Recoverable(reason.into())
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal(reason.into())
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable(_))
    }
}

/// Wizard stages, in the order a case passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    OpenForm,
    Classification,
    RegionCourt,
    Participants,
    Payment,
    ClaimText,
    Documents,
    Confirmation,
    ReturnHome,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::OpenForm => "open-form",
            Stage::Classification => "classification",
            Stage::RegionCourt => "region-court",
            Stage::Participants => "participants",
            Stage::Payment => "payment",
            Stage::ClaimText => "claim-text",
            Stage::Documents => "documents",
            Stage::Confirmation => "confirmation",
            Stage::ReturnHome => "return-home",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filing error together with the stage that raised it.
#[derive(Debug, Error)]
#[error("Stage {stage} failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: FilingError,
}

impl StageError {
    pub fn new(stage: Stage, source: impl Into<FilingError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// Tag an error with the stage it happened in.
pub trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, StageError>;
}

impl<T, E: Into<FilingError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, StageError> {
        self.map_err(|e| StageError::new(stage, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_recoverable_is_retryable() {
        assert!(FilingError::recoverable("dialog gone").is_recoverable());
        assert!(!FilingError::fatal("phone field missing").is_recoverable());
        assert!(!FilingError::RetriesExhausted {
            attempts: 3,
            last: "dialog gone".into()
        }
        .is_recoverable());
        assert!(!FilingError::from(SurfaceError::NotFound("x".into())).is_recoverable());
    }

    #[test]
    fn test_stage_error_names_stage() {
        let result: Result<(), FilingError> = Err(FilingError::fatal("court list empty"));
        let err = result.at(Stage::RegionCourt).unwrap_err();
        assert_eq!(err.stage, Stage::RegionCourt);
        assert_eq!(err.to_string(), "Stage region-court failed: court list empty");
    }
}
