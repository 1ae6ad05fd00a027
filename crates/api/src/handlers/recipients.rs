//! Handlers for the recipient query endpoints.
//!
//! An incomplete filter is not an error: the response is an empty list and
//! the client explains which field to fill in.

use axum::extract::{Path, Query, State};
use axum::Json;
use lagooz_core::error::CoreError;
use lagooz_core::targeting::controller::Candidate;
use lagooz_core::targeting::FilterCriteria;
use lagooz_core::types::DbId;
use lagooz_db::repositories::RecipientRepo;

use super::{load_caller, predicate_for};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

fn criteria_from_query(params: &[(String, String)]) -> AppResult<FilterCriteria> {
    FilterCriteria::from_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .map(FilterCriteria::normalized)
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// GET /api/v1/communications/recipients
///
/// Candidates matching the filter query for the calling user, ordered by id.
pub async fn list_recipients(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<Json<DataResponse<Vec<Candidate>>>> {
    let criteria = criteria_from_query(&params)?;
    let caller = load_caller(&state, &auth).await?;
    let predicate = predicate_for(&state, &caller, &criteria).await?;

    if let Some(reason) = predicate.empty_reason() {
        tracing::debug!(user_id = caller.user.id, ?reason, "Recipient filters incomplete");
    }

    let rows = RecipientRepo::resolve(&state.pool, &predicate).await?;
    tracing::debug!(user_id = caller.user.id, count = rows.len(), "Resolved recipients");

    Ok(Json(DataResponse {
        data: rows.into_iter().map(Candidate::from).collect(),
    }))
}

/// GET /api/v1/communications/recipients/{id}
///
/// One candidate, if the same filter query would list them.
pub async fn get_recipient(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<Json<DataResponse<Candidate>>> {
    let criteria = criteria_from_query(&params)?;
    let caller = load_caller(&state, &auth).await?;
    let predicate = predicate_for(&state, &caller, &criteria).await?;

    let row = RecipientRepo::find_in_scope(&state.pool, &predicate, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Recipient",
            id,
        }))?;

    Ok(Json(DataResponse { data: row.into() }))
}
