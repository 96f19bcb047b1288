use thiserror::Error;

/// Invalid splitter or fragmentation parameters. Lists every violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("invalid configuration: {}", .violations.join("; "))]
    Invalid { violations: Vec<String> },
}

impl ConfigurationError {
    pub fn violations(&self) -> &[String] {
        match self {
            ConfigurationError::Invalid { violations } => violations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("splitter failed: {0}")]
    Failed(String),
}

/// Raised by a table render strategy; consumed by the fallback ladder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("table has no cells")]
    EmptyTable,
    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRows { row: usize, expected: usize, found: usize },
    #[error("merge at R{row}C{col} exceeds the {rows}x{cols} grid")]
    MergeOutOfBounds { row: usize, col: usize, rows: usize, cols: usize },
    #[error("header labels rejected: {0}")]
    InvalidHeader(String),
}

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a valid office package: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("xml error: {0}")]
    Xml(String),
    #[error("missing package part: {0}")]
    MissingPart(String),
    #[error("workbook error: {0}")]
    Workbook(String),
    #[error("unsupported format: {0}")]
    Unsupported(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Invalid(#[from] ConfigurationError),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("enrichment failed: {0}")]
    Enrichment(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("vector sink error: {0}")]
    Sink(String),
}

/// Top-level error of [`crate::chunk_office_file`].
#[derive(Debug, Error)]
pub enum ChunkFileError {
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
