use thiserror::Error;

#[derive(Error, Debug)]
pub enum StudioError {
    #[error("No matching template for analysis type '{analysis_type}'")]
    NoTemplateMatch { analysis_type: String },

    #[error("Unknown granularity '{0}'")]
    Granularity(String),

    #[error("History error: {0}")]
    History(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StudioError>;
