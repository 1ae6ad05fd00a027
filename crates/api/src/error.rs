use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lagooz_core::communication::SubmissionErrors;
use lagooz_core::error::CoreError;
use lagooz_events::DeliveryError;
use serde::Serialize;

/// Error type returned by every handler.
///
/// Domain errors arrive as [`CoreError`]; the other variants belong to the
/// HTTP layer. Every variant renders as a JSON body with `error` and `code`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A synchronous send failed. The communication is back in drafts.
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Writing an attachment to the storage directory failed.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A compose form was rejected. Carries every problem found and the
    /// input as received so the client can redisplay it unchanged.
    #[error("Submission rejected")]
    Submission {
        errors: SubmissionErrors,
        submitted: serde_json::Value,
    },
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a SubmissionErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    submitted: Option<&'a serde_json::Value>,
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl AppError {
    fn status_code_message(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },
            AppError::Database(err) => classify_sqlx_error(err),
            AppError::Delivery(err) => {
                tracing::error!(error = %err, "Communication delivery failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DELIVERY_FAILED",
                    "The communication could not be sent and was returned to your drafts"
                        .to_string(),
                )
            }
            AppError::Storage(err) => {
                tracing::error!(error = %err, "Attachment storage failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "Attachments could not be stored".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Submission { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "SUBMISSION_INVALID",
                "The submission has errors".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error) = self.status_code_message();
        let (errors, submitted) = match &self {
            AppError::Submission { errors, submitted } => (Some(errors), Some(submitted)),
            _ => (None, None),
        };
        let body = ErrorBody {
            error,
            code,
            errors,
            submitted,
        };
        (status, Json(body)).into_response()
    }
}

/// Map a sqlx error to status, code and a client-safe message.
///
/// Named `uq_` unique violations and `ck_` check violations are conflicts
/// with existing data; anything else is logged and reported as internal.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    if let sqlx::Error::RowNotFound = err {
        return (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        );
    }

    if let sqlx::Error::Database(db_err) = err {
        let constraint = db_err.constraint().unwrap_or_default();
        match db_err.code().as_deref() {
            Some("23505") if constraint.starts_with("uq_") => {
                return (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    format!("Duplicate value violates unique constraint: {constraint}"),
                );
            }
            Some("23514") if constraint.starts_with("ck_") => {
                return (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    format!("Change conflicts with the current record state: {constraint}"),
                );
            }
            _ => {}
        }
    }

    tracing::error!(error = %err, "Database error");
    internal()
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn submission_echoes_errors_and_input() {
        let mut errors = SubmissionErrors::default();
        errors.non_field("Please select at least one recipient.");
        let (status, body) = render(AppError::Submission {
            errors,
            submitted: serde_json::json!({ "title": "Trip" }),
        })
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "SUBMISSION_INVALID");
        assert_eq!(body["errors"]["non_field_errors"][0], "Please select at least one recipient.");
        assert_eq!(body["submitted"]["title"], "Trip");
    }

    #[tokio::test]
    async fn plain_errors_carry_only_error_and_code() {
        let (status, body) = render(AppError::Core(CoreError::NotFound {
            entity: "Draft",
            id: 7,
        }))
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Draft with id 7 not found");
        assert!(body.get("errors").is_none());
        assert!(body.get("submitted").is_none());
    }

    #[tokio::test]
    async fn storage_failure_hides_the_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/srv/files");
        let (status, body) = render(AppError::Storage(io)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "STORAGE_ERROR");
        assert!(!body["error"].as_str().unwrap().contains("/srv"));
    }
}
