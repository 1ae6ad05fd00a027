//! Route definitions for recipient targeting and communications.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{attachments, communications, mailbox, recipients};
use crate::state::AppState;

/// Routes mounted at `/communications`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(communications::submit))
        .route("/recipients", get(recipients::list_recipients))
        .route("/recipients/{id}", get(recipients::get_recipient))
        .route("/drafts", get(mailbox::list_drafts))
        .route("/drafts/delete-all", post(communications::delete_all_drafts))
        .route(
            "/drafts/{id}",
            get(communications::edit_draft)
                .post(communications::resubmit_draft)
                .delete(communications::delete_draft),
        )
        .route("/scheduled", get(mailbox::list_scheduled))
        .route("/outbox", get(mailbox::list_outbox))
        .route("/outbox/delete-all", post(mailbox::delete_all_outbox))
        .route(
            "/outbox/{id}",
            get(mailbox::get_outbox_item).delete(mailbox::delete_outbox_item),
        )
        .route("/inbox", get(mailbox::list_inbox))
        .route("/inbox/delete-all", post(mailbox::delete_all_inbox))
        .route("/inbox/{id}", delete(mailbox::delete_inbox_item))
        .route("/inbox/{id}/read", post(mailbox::read_inbox_item))
        .route("/inbox/{id}/reply", post(mailbox::reply_to_inbox_item))
        .route("/attachments/{id}", get(attachments::download_attachment))
}
