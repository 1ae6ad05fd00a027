//! Row structs and DTOs, one module per table group.

pub mod branch;
pub mod communication;
pub mod communication_attachment;
pub mod communication_recipient;
pub mod position;
pub mod recipient;
pub mod school_class;
pub mod user;
