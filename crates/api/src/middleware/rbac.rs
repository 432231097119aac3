//! Role-based access control extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use kovanent_core::error::CoreError;
use kovanent_core::roles::{ROLE_ADMIN, ROLE_HR};

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires the `hr` or `admin` role. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn list(RequireHr(user): RequireHr) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireHr(pub AuthUser);

impl FromRequestParts<AppState> for RequireHr {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != ROLE_HR && user.role != ROLE_ADMIN {
            return Err(AppError::Core(CoreError::Forbidden(
                "HR role required".into(),
            )));
        }
        Ok(RequireHr(user))
    }
}
