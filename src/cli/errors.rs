use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid listen address: {addr}")]
    InvalidListenAddress { addr: String },

    #[error("{failed} of {total} indices failed")]
    IndexReportIncomplete { failed: usize, total: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Library(#[from] skyfuse::Error),
}
