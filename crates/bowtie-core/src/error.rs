#[derive(Debug, thiserror::Error)]
pub enum BowtieError {
    #[error("invalid bowtie JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("invalid literal: {0}")]
    Literal(String),
    #[error("failed to process workbook: {0}")]
    Workbook(String),
    #[error("record is not renderable: {0}")]
    NotRenderable(String),
    #[error("no field at {0}")]
    NoSuchField(String),
    #[error("invalid field path '{0}'")]
    InvalidFieldPath(String),
    #[error("i/o error: {0}")]
    Io(#[source] std::io::Error),
}

pub type BowtieResult<T> = Result<T, BowtieError>;
