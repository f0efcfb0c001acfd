pub mod availability;
pub mod draft;
pub mod error;
pub mod flow;
pub mod fulfillment;
pub mod machine;
pub mod recorder;

pub use availability::{UnavailableDateSet, filter_future};
pub use draft::{BookingDraft, RentalDuration, Step};
pub use error::BookingError;
pub use flow::BookingFlow;
pub use fulfillment::{FulfillmentCheck, FulfillmentState, FulfillmentType, validate};
pub use machine::{DraftMachine, DraftRejection, GuardContext};
pub use recorder::{BookingRecorder, SubmittedBooking};
