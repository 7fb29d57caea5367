use std::path::PathBuf;

pub mod config;
pub mod graph;
pub mod index;
pub mod progress;
pub mod pyramid;

#[cfg(test)]
mod tests;

#[derive(Debug, thiserror::Error)]
#[error("{context}: {detail}")]
pub struct Error {
    pub context: Box<ErrorContext>,
    pub detail: Box<ErrorDetail>,
}

#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub path: PathBuf,
    pub id: Option<String>,
}

impl ErrorContext {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            id: None,
        }
    }

    pub(crate) fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            path: self.path.clone(),
            id: Some(id.into()),
        }
    }

    pub(crate) fn error(&self, detail: ErrorDetail) -> Error {
        Error {
            context: Box::new(self.clone()),
            detail: Box::new(detail),
        }
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{id}({})", self.path.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorDetail {
    #[error("Failed to read index: {0}")]
    ReadIndex(std::io::Error),
    #[error("Failed to parse index: {0}")]
    ParseIndex(serde_json::Error),
    #[error("Failed to read input directory: {0}")]
    ReadInputDir(std::io::Error),
    #[error("No archival, images or restricted source for entry")]
    MissingSource,
    #[error("Source has no file stem")]
    MissingStem,
    #[error("Failed to decode image: {0}")]
    DecodeImage(image::ImageError),
    #[error("Image has no pixels")]
    EmptyImage,
    #[error("Failed to encode tile: {0}")]
    EncodeTile(image::ImageError),
    #[error("Failed to create directory: {0}")]
    CreateDir(std::io::Error),
    #[error("Failed to write output: {0}")]
    WriteOutput(std::io::Error),
    #[error("Output exceeds the 4 GiB limit of classic TIFF")]
    OutputTooLarge,
    #[error("Failed to walk directory: {0}")]
    Walk(walkdir::Error),
    #[error("Conversion task failed: {0}")]
    Join(tokio::task::JoinError),
    #[error("Failed to serialize graph: {0}")]
    SerializeGraph(std::io::Error),
    #[error("Failed to write graph: {0}")]
    WriteGraph(std::io::Error),
}
