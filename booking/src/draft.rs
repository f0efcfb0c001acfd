use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use hold::CarId;
use serde::{Deserialize, Serialize};

use crate::fulfillment::{FulfillmentState, FulfillmentType};

/// Booking flow steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Search,
    Car,
    Dates,
    Confirm,
}

impl Step {
    pub fn next(self) -> Option<Step> {
        match self {
            Step::Search => Some(Step::Car),
            Step::Car => Some(Step::Dates),
            Step::Dates => Some(Step::Confirm),
            Step::Confirm => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::Search => "Search",
            Step::Car => "Car",
            Step::Dates => "Dates",
            Step::Confirm => "Confirm",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RentalDuration {
    #[serde(rename = "12hours")]
    TwelveHours,
    #[serde(rename = "24hours")]
    TwentyFourHours,
}

impl RentalDuration {
    pub fn hours(self) -> u32 {
        match self {
            RentalDuration::TwelveHours => 12,
            RentalDuration::TwentyFourHours => 24,
        }
    }
}

/// In-progress booking. Fields fill in as the customer moves forward.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    pub car_id: Option<CarId>,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub duration: Option<RentalDuration>,
    pub fulfillment: Option<FulfillmentState>,
    /// Minor currency units.
    pub delivery_fee: Option<u64>,
}

impl BookingDraft {
    pub fn is_delivery(&self) -> bool {
        self.fulfillment
            .as_ref()
            .is_some_and(|f| f.kind == FulfillmentType::Delivery)
    }

    pub(crate) fn has_schedule(&self) -> bool {
        self.start_date.is_some()
            && self.end_date.is_some()
            && self.start_time.is_some()
            && self.duration.is_some()
    }
}
