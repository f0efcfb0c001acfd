//! Booking draft state machine.
//!
//! Steps move forward one at a time and only when the guard for the next
//! step passes; moving back to any earlier step is always allowed and keeps
//! what the customer already entered. Every refusal is a [`DraftRejection`]
//! whose message can be shown to the customer as is.
//
//  Pure: no async, no IO. Hold state is passed in through `GuardContext`.

use chrono::{NaiveDate, NaiveTime};
use hold::{CarId, HoldSnapshot, HoldStatus, RoomKey};
use thiserror::Error;
use tracing::debug;

use crate::availability::UnavailableDateSet;
use crate::draft::{BookingDraft, RentalDuration, Step};
use crate::fulfillment::{FulfillmentState, FulfillmentType, validate};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftRejection {
    #[error("Select a car to continue")]
    NoCarSelected,

    #[error("Choose your dates, start time and rental duration")]
    ScheduleIncomplete,

    #[error("Return date must be on or after the pickup date")]
    EndBeforeStart,

    #[error("Pickup date cannot be in the past")]
    StartInPast,

    #[error("The car is unavailable on {}", join_dates(.dates))]
    DatesUnavailable { dates: Vec<NaiveDate> },

    #[error("{reason}")]
    Fulfillment { reason: &'static str },

    #[error("Your hold on this car has ended; reserve it again to continue")]
    HoldNotActive,

    #[error("This car is being reserved by another customer")]
    HeldElsewhere,

    #[error("Cannot skip ahead from {from} to {to}")]
    SkipAhead { from: Step, to: Step },

    #[error("{to} is not an earlier step than {from}")]
    NotEarlier { from: Step, to: Step },

    #[error("The booking is already at the final step")]
    AtFinalStep,

    #[error("Finish the {step} step before submitting")]
    NotReadyToSubmit { step: Step },
}

fn join_dates(dates: &[NaiveDate]) -> String {
    dates
        .iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outside facts the guards need.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    pub today: NaiveDate,
    pub unavailable: &'a UnavailableDateSet,
    /// Hold on the draft's car as seen by the draft's room.
    pub hold: Option<&'a HoldSnapshot>,
}

/// One customer session's draft and where it is in the flow.
#[derive(Debug, Clone)]
pub struct DraftMachine {
    room: RoomKey,
    step: Step,
    draft: BookingDraft,
}

impl DraftMachine {
    pub fn new(room: RoomKey) -> Self {
        Self {
            room,
            step: Step::Search,
            draft: BookingDraft::default(),
        }
    }

    pub fn room(&self) -> &RoomKey {
        &self.room
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    pub fn car_id(&self) -> Option<&str> {
        self.draft.car_id.as_deref()
    }

    pub fn into_draft(self) -> BookingDraft {
        self.draft
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.draft.location = Some(location.into());
    }

    /// Returns the previously selected car when this replaces it.
    pub fn select_car(&mut self, car_id: impl Into<CarId>) -> Option<CarId> {
        let car_id = car_id.into();
        match self.draft.car_id.replace(car_id.clone()) {
            Some(prev) if prev != car_id => Some(prev),
            _ => None,
        }
    }

    pub fn set_schedule(
        &mut self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        start_time: NaiveTime,
        duration: RentalDuration,
    ) {
        self.draft.start_date = Some(start_date);
        self.draft.end_date = Some(end_date);
        self.draft.start_time = Some(start_time);
        self.draft.duration = Some(duration);
    }

    /// Switching to pickup clears any delivery fee.
    pub fn set_fulfillment(&mut self, fulfillment: FulfillmentState) {
        if fulfillment.kind == FulfillmentType::Pickup {
            self.draft.delivery_fee = None;
        }
        self.draft.fulfillment = Some(fulfillment);
    }

    pub fn set_delivery_fee(&mut self, fee: Option<u64>) {
        self.draft.delivery_fee = fee;
    }

    /// Check the guard for entering `target`, without moving.
    pub fn check(&self, target: Step, ctx: &GuardContext<'_>) -> Result<(), DraftRejection> {
        match target {
            Step::Search => Ok(()),
            Step::Car => self.check_car(),
            Step::Dates => self.check_dates(ctx),
            Step::Confirm => self.check_confirm(ctx),
        }
    }

    /// Every guard up to and including `Confirm`; used right before submit.
    pub fn check_ready(&self, ctx: &GuardContext<'_>) -> Result<(), DraftRejection> {
        if self.step != Step::Confirm {
            return Err(DraftRejection::NotReadyToSubmit { step: self.step });
        }

        self.check_car()?;
        self.check_dates(ctx)?;
        self.check_confirm(ctx)
    }

    /// Move to the next step if its guard passes.
    pub fn advance(&mut self, ctx: &GuardContext<'_>) -> Result<Step, DraftRejection> {
        let next = self.step.next().ok_or(DraftRejection::AtFinalStep)?;
        self.check(next, ctx)?;

        debug!(room = %self.room, from = %self.step, to = %next, "draft advanced");
        self.step = next;
        Ok(next)
    }

    /// Return to `target`, which must not be later than the current step.
    pub fn go_back(&mut self, target: Step) -> Result<Step, DraftRejection> {
        if target > self.step {
            return Err(DraftRejection::NotEarlier {
                from: self.step,
                to: target,
            });
        }

        debug!(room = %self.room, from = %self.step, to = %target, "draft moved back");
        self.step = target;
        Ok(target)
    }

    /// Jump straight to `target`: backwards freely, forwards by one step.
    pub fn move_to(&mut self, target: Step, ctx: &GuardContext<'_>) -> Result<Step, DraftRejection> {
        if target <= self.step {
            return self.go_back(target);
        }

        if Some(target) != self.step.next() {
            return Err(DraftRejection::SkipAhead {
                from: self.step,
                to: target,
            });
        }

        self.advance(ctx)
    }

    fn check_car(&self) -> Result<(), DraftRejection> {
        if self.draft.car_id.is_none() {
            return Err(DraftRejection::NoCarSelected);
        }
        Ok(())
    }

    fn check_dates(&self, ctx: &GuardContext<'_>) -> Result<(), DraftRejection> {
        if !self.draft.has_schedule() {
            return Err(DraftRejection::ScheduleIncomplete);
        }

        let (Some(start), Some(end)) = (self.draft.start_date, self.draft.end_date) else {
            return Err(DraftRejection::ScheduleIncomplete);
        };

        if end < start {
            return Err(DraftRejection::EndBeforeStart);
        }

        if start < ctx.today {
            return Err(DraftRejection::StartInPast);
        }

        let blocked = ctx.unavailable.filter_future(ctx.today).conflicts(start, end);
        if !blocked.is_empty() {
            return Err(DraftRejection::DatesUnavailable { dates: blocked });
        }

        Ok(())
    }

    fn check_confirm(&self, ctx: &GuardContext<'_>) -> Result<(), DraftRejection> {
        let check = validate(self.draft.fulfillment.as_ref());
        if !check.valid {
            return Err(DraftRejection::Fulfillment {
                reason: check.reason.unwrap_or_default(),
            });
        }

        match ctx.hold {
            Some(snap) if snap.is_active_for_caller() => Ok(()),
            Some(snap) if snap.status == HoldStatus::Active => Err(DraftRejection::HeldElsewhere),
            Some(snap) if snap.status == HoldStatus::Converted && snap.held_by_caller != Some(true) => {
                Err(DraftRejection::HeldElsewhere)
            }
            _ => Err(DraftRejection::HoldNotActive),
        }
    }
}
