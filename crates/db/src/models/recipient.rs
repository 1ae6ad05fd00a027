//! Candidate recipient rows returned by the resolution queries.

use lagooz_core::targeting::controller::{Candidate, ProfilePicture};
use lagooz_core::types::DbId;
use sqlx::FromRow;

/// One resolved recipient, joined with its branch name.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RecipientRow {
    pub id: DbId,
    pub branch_name: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub profile_picture: Option<String>,
}

impl From<RecipientRow> for Candidate {
    fn from(row: RecipientRow) -> Self {
        Candidate {
            id: row.id,
            branch_name: row.branch_name,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            profile_picture: row
                .profile_picture
                .filter(|p| !p.is_empty())
                .map(|url| ProfilePicture { url }),
        }
    }
}
