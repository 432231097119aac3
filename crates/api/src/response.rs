//! Shared response envelope types for API handlers.
//!
//! List endpoints wrap their payload in `{ "data": ... }`; single resources
//! are returned bare.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// ```ignore
/// Ok(Json(DataResponse { data: items }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
