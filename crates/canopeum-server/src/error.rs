use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use canopeum::{InvitationError, NormalizeError};
use canopeum_db::queries::batch::is_composition_constraint;
use canopeum_db::queries::user::{EMAIL_UNIQUE, USERNAME_UNIQUE};
use canopeum_db::{DbError, RegistrationError};
use indexmap::IndexMap;
use thiserror::Error;

/// Field name to messages, in the order fields were checked.
pub type FieldErrors = IndexMap<String, Vec<String>>;

/// Constraint behind a second like of the same post.
const LIKE_PRIMARY_KEY: &str = "post_like_pkey";

/// Every way a request can fail, and the one place they become responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("invalid request: {0:?}")]
    Validation(FieldErrors),

    #[error("missing or invalid credentials")]
    Unauthorized,

    /// Wrong email or password on login.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("permission denied")]
    Forbidden,

    /// A domain rule said no; answered with a short code.
    #[error("conflict: {0}")]
    Conflict(&'static str),

    #[error("{constraint} already holds this reference")]
    DuplicateAssociation { constraint: String },

    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        ApiError::Validation(errors)
    }

    pub fn internal(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        ApiError::Internal(Box::new(e))
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::UniqueViolation { constraint } if is_composition_constraint(&constraint) => {
                ApiError::DuplicateAssociation { constraint }
            }
            DbError::UniqueViolation { constraint } => match constraint.as_str() {
                LIKE_PRIMARY_KEY => ApiError::Conflict("ALREADY_LIKED"),
                EMAIL_UNIQUE => ApiError::Conflict("EMAIL_TAKEN"),
                USERNAME_UNIQUE => ApiError::Conflict("USERNAME_TAKEN"),
                _ => ApiError::Conflict("ALREADY_EXISTS"),
            },
            DbError::ForeignKeyViolation { constraint } => {
                let field = constraint.strip_suffix("_fkey").unwrap_or(&constraint);
                ApiError::field(field, "Referenced object does not exist.")
            }
            other => ApiError::internal(other),
        }
    }
}

impl From<InvitationError> for ApiError {
    fn from(e: InvitationError) -> Self {
        ApiError::Conflict(e.code())
    }
}

impl From<RegistrationError> for ApiError {
    fn from(e: RegistrationError) -> Self {
        match e {
            RegistrationError::Invitation(e) => e.into(),
            RegistrationError::Db(e) => e.into(),
        }
    }
}

impl From<NormalizeError> for ApiError {
    fn from(e: NormalizeError) -> Self {
        match e {
            NormalizeError::Latitude(e) => ApiError::field("dms_latitude", e.to_string()),
            NormalizeError::Longitude(e) => ApiError::field("dms_longitude", e.to_string()),
            NormalizeError::Geocode(e) => ApiError::internal(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::field("non_field_errors", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::field("query", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            ApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, Json("INVALID_CREDENTIALS")).into_response()
            }
            ApiError::Forbidden => StatusCode::FORBIDDEN.into_response(),
            ApiError::Conflict(code) => (StatusCode::BAD_REQUEST, Json(code)).into_response(),
            ApiError::DuplicateAssociation { constraint } => {
                tracing::debug!(%constraint, "duplicate association");
                (StatusCode::CONFLICT, Json("DUPLICATE_ASSOCIATION")).into_response()
            }
            ApiError::Internal(e) => {
                let mut chain = e.to_string();
                let mut source = e.source();
                while let Some(cause) = source {
                    chain.push_str(": ");
                    chain.push_str(&cause.to_string());
                    source = cause.source();
                }
                tracing::error!(error = %chain, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "detail": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use canopeum::CoordinateError;

    async fn render(error: ApiError) -> (StatusCode, String) {
        let response = error.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn unique(constraint: &str) -> DbError {
        DbError::UniqueViolation {
            constraint: constraint.to_string(),
        }
    }

    #[tokio::test]
    async fn composition_duplicates_are_conflicts() {
        let (status, body) = render(unique("batch_fertilizer_unique").into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, r#""DUPLICATE_ASSOCIATION""#);
    }

    #[tokio::test]
    async fn known_unique_violations_become_codes() {
        for (constraint, code) in [
            ("post_like_pkey", r#""ALREADY_LIKED""#),
            ("user_email_lower_key", r#""EMAIL_TAKEN""#),
            ("user_username_key", r#""USERNAME_TAKEN""#),
        ] {
            let (status, body) = render(unique(constraint).into()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{constraint}");
            assert_eq!(body, code);
        }
    }

    #[tokio::test]
    async fn bad_reference_is_a_field_error() {
        let error: ApiError = DbError::ForeignKeyViolation {
            constraint: "batch_fertilizer_fertilizer_type_id_fkey".to_string(),
        }
        .into();
        let (status, body) = render(error).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        insta::assert_snapshot!(body, @r#"{"batch_fertilizer_fertilizer_type_id":["Referenced object does not exist."]}"#);
    }

    #[tokio::test]
    async fn malformed_dms_names_the_axis() {
        let error: ApiError = NormalizeError::Longitude(CoordinateError::MissingComponent {
            input: "nope".to_string(),
        })
        .into();
        let (status, body) = render(error).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.starts_with(r#"{"dms_longitude":["#), "{body}");
    }

    #[tokio::test]
    async fn invitation_errors_use_their_codes() {
        let (status, body) = render(InvitationError::Expired.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#""INVITATION_EXPIRED""#);
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let error = ApiError::internal(std::io::Error::other("disk on fire"));
        let (status, body) = render(error).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"detail":"internal server error"}"#);
    }
}
