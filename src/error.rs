use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ExperimentError>;

#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    /// The runner was asked for a subject the dataset does not contain.
    #[error("subject {id} not found in {}", dataset.display())]
    SubjectNotFound { id: String, dataset: PathBuf },

    #[error("dataset root not set (use --dataset-root or DEFECT_REPAIRING_DATASET)")]
    MissingDatasetRoot,

    #[error("failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
}
