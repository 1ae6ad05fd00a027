pub mod communications;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /communications/recipients                 filtered candidate list (GET)
/// /communications/recipients/{id}            single candidate (GET)
/// /communications                            submit (POST, multipart)
/// /communications/drafts                     list drafts (GET)
/// /communications/drafts/delete-all          delete all drafts (POST)
/// /communications/drafts/{id}                edit payload (GET), re-submit (POST),
///                                            delete (DELETE)
/// /communications/scheduled                  scheduled list (GET, staff-like only)
/// /communications/outbox                     sent list (GET)
/// /communications/outbox/delete-all          hide all sent (POST)
/// /communications/outbox/{id}                detail with replies (GET), hide (DELETE)
/// /communications/inbox                      received list (GET)
/// /communications/inbox/delete-all           delete all received (POST)
/// /communications/inbox/{id}                 delete (DELETE)
/// /communications/inbox/{id}/read            mark read and open (POST)
/// /communications/inbox/{id}/reply           reply (POST, JSON)
/// /communications/attachments/{id}           download (GET, sender or recipient)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/communications", communications::router())
}
