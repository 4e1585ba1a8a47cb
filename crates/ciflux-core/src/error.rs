use thiserror::Error;

#[derive(Error, Debug)]
pub enum CiError {
    /// The root of a pipeline definition must be a mapping.
    #[error("Invalid pipeline definition: {0}")]
    InvalidInput(String),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CiError>;
