pub mod communication;
pub mod error;
pub mod roles;
pub mod targeting;
pub mod types;
