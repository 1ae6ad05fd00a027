pub mod attachments;
pub mod communications;
pub mod mailbox;
pub mod recipients;

use lagooz_core::error::CoreError;
use lagooz_core::roles::UserRole;
use lagooz_core::targeting::{resolve, CallerContext, FilterCriteria, RecipientPredicate};
use lagooz_db::models::user::User;
use lagooz_db::repositories::{PositionRepo, RecipientRepo, UserRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// The authenticated user as the directory currently knows them.
pub struct Caller {
    pub user: User,
    pub role: UserRole,
    pub context: CallerContext,
}

/// Reload the token's user. Inactive or role-less accounts are refused.
pub async fn load_caller(state: &AppState, auth: &AuthUser) -> AppResult<Caller> {
    let user = UserRepo::find_active(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Account is inactive or does not exist".into(),
            ))
        })?;
    let role = user.user_role().ok_or_else(|| {
        AppError::Core(CoreError::Forbidden("Account has no recognised role".into()))
    })?;
    let context = RecipientRepo::caller_context(&state.pool, &user).await?;
    Ok(Caller {
        user,
        role,
        context,
    })
}

/// Resolve `criteria` for `caller`, looking up which positions are class-teacher
/// ones.
pub async fn predicate_for(
    state: &AppState,
    caller: &Caller,
    criteria: &FilterCriteria,
) -> AppResult<RecipientPredicate> {
    let class_teachers =
        PositionRepo::class_teacher_ids(&state.pool, &criteria.teaching_positions).await?;
    Ok(resolve(&caller.context, criteria, &class_teachers))
}
