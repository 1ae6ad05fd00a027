//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Writes that take part in a
//! caller's transaction accept any `PgExecutor` instead.

pub mod branch_repo;
pub mod communication_attachment_repo;
pub mod communication_recipient_repo;
pub mod communication_repo;
pub mod position_repo;
pub mod recipient_repo;
pub mod school_class_repo;
pub mod user_repo;

pub use branch_repo::BranchRepo;
pub use communication_attachment_repo::CommunicationAttachmentRepo;
pub use communication_recipient_repo::CommunicationRecipientRepo;
pub use communication_repo::CommunicationRepo;
pub use position_repo::PositionRepo;
pub use recipient_repo::RecipientRepo;
pub use school_class_repo::SchoolClassRepo;
pub use user_repo::UserRepo;
