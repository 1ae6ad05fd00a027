//! Role-based access control extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use lagooz_core::error::CoreError;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires a staff, branch_admin or superadmin token. Rejects with 403 otherwise.
///
/// ```ignore
/// async fn scheduled(RequireStaffLike(user): RequireStaffLike) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireStaffLike(pub AuthUser);

impl FromRequestParts<AppState> for RequireStaffLike {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.role.is_staff_like() {
            return Err(AppError::Core(CoreError::Forbidden(
                "Staff, branch admin or superadmin role required".into(),
            )));
        }
        Ok(RequireStaffLike(user))
    }
}
