// Request extractors that reject with BetError
//
// axum's own Json/Path/Query answer malformed input with plain-text bodies;
// these wrap them so every rejection renders as an `invalid_input` error.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};

use crate::errors::BetError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(BetError))]
pub struct Payload<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(BetError))]
pub struct PathParam<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(BetError))]
pub struct QueryParams<T>(pub T);

impl From<JsonRejection> for BetError {
    fn from(rejection: JsonRejection) -> Self {
        BetError::InvalidInput(format!("malformed request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for BetError {
    fn from(rejection: PathRejection) -> Self {
        BetError::InvalidInput(format!("malformed path: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for BetError {
    fn from(rejection: QueryRejection) -> Self {
        BetError::InvalidInput(format!("malformed query: {}", rejection.body_text()))
    }
}
