//! Recipient targeting: filter criteria, the form that edits them, and the
//! engine that turns them into the set of users a caller may address.

pub mod controller;
pub mod criteria;
pub mod predicate;
pub mod snapshot;
pub mod visibility;

pub use criteria::{ClassSlot, CriteriaError, FilterCriteria};
pub use predicate::{resolve, CallerContext, EmptyReason, RecipientPredicate};
pub use snapshot::{SavedFilterData, SavedFilterFields};
