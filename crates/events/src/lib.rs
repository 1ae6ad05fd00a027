//! Lagooz communication delivery.
//!
//! - [`delivery`]: the [`CommunicationDelivery`] collaborator that hands a
//!   persisted communication to its recipients (in-app rows, plus email when
//!   SMTP is configured), and [`send_now`] which claims a communication as
//!   sent before delivering it and releases the claim if delivery fails.
//! - [`ScheduledDispatcher`]: background loop that sends scheduled
//!   communications once they fall due.

pub mod delivery;
pub mod dispatcher;

pub use delivery::email::{EmailConfig, EmailDelivery};
pub use delivery::{
    send_now, CommunicationDelivery, DeliveryError, DeliveryReport, OnFailure, StandardDelivery,
};
pub use dispatcher::{DispatchSummary, ScheduledDispatcher};
