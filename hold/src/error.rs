use thiserror::Error;

use crate::model::CarId;

/// Recoverable hold outcomes. None of these are fatal to the service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HoldError {
    /// Another room already holds the car. Deliberately says nothing about who.
    #[error("car {car_id} is currently held by another customer")]
    Conflict { car_id: CarId },

    #[error("no active hold for car {car_id}")]
    NotFound { car_id: CarId },

    #[error("the hold on car {car_id} belongs to another session")]
    Forbidden { car_id: CarId },
}

impl HoldError {
    /// Stable machine-readable tag for wire responses.
    pub fn kind(&self) -> &'static str {
        match self {
            HoldError::Conflict { .. } => "conflict",
            HoldError::NotFound { .. } => "notFound",
            HoldError::Forbidden { .. } => "forbidden",
        }
    }

    pub fn car_id(&self) -> &str {
        match self {
            HoldError::Conflict { car_id }
            | HoldError::NotFound { car_id }
            | HoldError::Forbidden { car_id } => car_id,
        }
    }
}
