//! Error types for comper

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComperError {
    #[error("transport clock has been disposed and cannot be restarted")]
    ClockDisposed,
}

pub type Result<T> = std::result::Result<T, ComperError>;
