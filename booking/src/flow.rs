//! BookingFlow
//!
//! Links one customer's draft to the hold manager. The two never share
//! state; the flow looks the hold up by the draft's car id each time.
//!
//!   • entering `Car` or `Dates` claims the car (a renewal if already held)
//!   • entering `Confirm` needs the room's hold to still be active
//!   • submit converts the hold, then hands the booking to the recorder
//!   • abandon releases the hold

use std::sync::Arc;
use std::time::Duration;

use common::logger::warn_if_slow;
use common::time::Clock;
use hold::broadcast::RoomBroadcaster;
use hold::{Hold, HoldError, HoldManager};
use tracing::{error, info, instrument, warn};

use crate::availability::UnavailableDateSet;
use crate::draft::Step;
use crate::error::BookingError;
use crate::machine::{DraftMachine, DraftRejection, GuardContext};
use crate::recorder::{BookingRecorder, SubmittedBooking};

pub struct BookingFlow<B: RoomBroadcaster, R: BookingRecorder> {
    holds: Arc<HoldManager<B>>,
    recorder: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<B: RoomBroadcaster, R: BookingRecorder> BookingFlow<B, R> {
    pub fn new(holds: Arc<HoldManager<B>>, recorder: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self {
            holds,
            recorder,
            clock,
        }
    }

    /// Pick (or switch) the car. Switching lets go of the old car's hold and,
    /// past `Car`, puts the draft back on `Car` so the next advance claims the
    /// new one.
    #[instrument(skip(self, machine), target = "flow", fields(room = %machine.room()))]
    pub async fn select_car(
        &self,
        machine: &mut DraftMachine,
        car_id: &str,
    ) -> Result<(), BookingError> {
        if let Some(previous) = machine.select_car(car_id) {
            match self.holds.release(&previous, machine.room()).await {
                Ok(()) | Err(HoldError::NotFound { .. }) => {}
                Err(e) => warn!(previous = %previous, error = %e, "could not release previous car"),
            }
            if machine.step() > Step::Car {
                machine.go_back(Step::Car)?;
            }
        }
        Ok(())
    }

    /// Move the draft one step forward, claiming or checking the hold as needed.
    #[instrument(skip(self, machine, unavailable), target = "flow", fields(room = %machine.room(), step = %machine.step()))]
    pub async fn advance(
        &self,
        machine: &mut DraftMachine,
        unavailable: &UnavailableDateSet,
    ) -> Result<Step, BookingError> {
        let target = machine.step().next().ok_or(DraftRejection::AtFinalStep)?;
        let today = self.clock.today();

        match target {
            Step::Car | Step::Dates => {
                let ctx = GuardContext {
                    today,
                    unavailable,
                    hold: None,
                };
                machine.check(target, &ctx)?;
                self.claim_for(machine).await?;
                Ok(machine.advance(&ctx)?)
            }
            Step::Confirm | Step::Search => {
                let snapshot = match machine.car_id() {
                    Some(car_id) => self.holds.inspect_for(car_id, machine.room()).await,
                    None => None,
                };
                let ctx = GuardContext {
                    today,
                    unavailable,
                    hold: snapshot.as_ref(),
                };
                Ok(machine.advance(&ctx)?)
            }
        }
    }

    /// Convert the hold and record the booking. The draft is done afterwards.
    #[instrument(skip(self, machine, unavailable), target = "flow", fields(room = %machine.room()))]
    pub async fn submit(
        &self,
        machine: &DraftMachine,
        unavailable: &UnavailableDateSet,
    ) -> Result<SubmittedBooking, BookingError> {
        let car_id = machine.car_id().ok_or(DraftRejection::NoCarSelected)?;

        let snapshot = self.holds.inspect_for(car_id, machine.room()).await;
        machine.check_ready(&GuardContext {
            today: self.clock.today(),
            unavailable,
            hold: snapshot.as_ref(),
        })?;

        let hold = self.holds.convert(car_id, machine.room()).await?;
        let booking = SubmittedBooking::new(&hold, machine.draft().clone());

        // No hold lock is held here; the recorder may be slow.
        let recorded = warn_if_slow(
            "record_booking",
            Duration::from_millis(500),
            self.recorder.record_booking(&booking),
        )
        .await;

        if let Err(e) = recorded {
            error!(
                car_id = %car_id,
                hold_id = %booking.hold_id,
                error = ?e,
                "hold converted but booking was not recorded"
            );
            return Err(BookingError::Recorder(e));
        }

        info!(car_id = %car_id, hold_id = %booking.hold_id, "booking submitted");
        Ok(booking)
    }

    /// Customer walked away: give the car back if we still hold it.
    #[instrument(skip(self, machine), target = "flow", fields(room = %machine.room()))]
    pub async fn abandon(&self, machine: DraftMachine) -> Result<(), BookingError> {
        let Some(car_id) = machine.car_id() else {
            return Ok(());
        };

        match self.holds.release(car_id, machine.room()).await {
            Ok(()) | Err(HoldError::NotFound { .. }) => {
                info!(car_id = %car_id, "draft abandoned");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn claim_for(&self, machine: &DraftMachine) -> Result<Hold, BookingError> {
        let car_id = machine.car_id().ok_or(DraftRejection::NoCarSelected)?;
        Ok(self.holds.claim(car_id, machine.room()).await?)
    }
}
