use axum::{
    Json,
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use chrono::{Local, NaiveDate, Utc};
use serde::Serialize;

use crate::{error::AppError, models::UserId};

pub const USER_HEADER: &str = "x-user-id";

/// The signed-in user, resolved by the auth layer in front of this service.
#[derive(Clone, Copy, Debug)]
pub struct CurrentUser(pub UserId);

fn user_from_parts(parts: &Parts) -> Result<Option<UserId>, AppError> {
    let Some(value) = parts.headers.get(USER_HEADER) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .map(Some)
        .ok_or(AppError::MissingUser)
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_from_parts(parts)?
            .map(CurrentUser)
            .ok_or(AppError::MissingUser)
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(user_from_parts(parts)?.map(CurrentUser))
    }
}

#[derive(Serialize)]
pub struct Reply<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Reply<T>> {
    Json(Reply {
        success: true,
        data,
    })
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
