use hold::HoldError;
use thiserror::Error;

use crate::machine::DraftRejection;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error(transparent)]
    Hold(#[from] HoldError),

    #[error(transparent)]
    ValidationFailed(#[from] DraftRejection),

    /// The hold is converted but the booking store did not take the record.
    #[error("booking recorder failed: {0:#}")]
    Recorder(anyhow::Error),
}

impl BookingError {
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::Hold(e) => e.kind(),
            BookingError::ValidationFailed(_) => "validationFailed",
            BookingError::Recorder(_) => "recorderFailed",
        }
    }
}
