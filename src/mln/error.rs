use thiserror::Error;

/// Failure modes of an analysis run. Character-level conditions
/// (`EmptyCharacter`, `SolverExhausted`) are recovered by the driver;
/// everything else aborts the dataset.
#[derive(Debug, Error)]
pub enum MlnError {
    #[error("the mode {0} is not available")]
    InvalidMode(String),
    #[error("taxon {0} is missing from the reference tree")]
    MissingTaxon(String),
    #[error("character has no positive tips")]
    EmptyCharacter,
    #[error("solver exceeded its candidate ceiling")]
    SolverExhausted,
    #[error("{0}")]
    Parse(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
