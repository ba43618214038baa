use thiserror::Error;

#[derive(Debug, Error)]
pub enum LhaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LhaError {
    /// Short, stable error code for structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            LhaError::Config(_) => "CONFIG_ERROR",
            LhaError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, LhaError>;
