//! Response helpers handlers return from their verb methods.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: MetaCount,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

/// Bare JSON body, 200.
pub fn json<T: Serialize>(data: T) -> Response {
    Json(data).into_response()
}

/// `{ "data": ... }` with the given status.
pub fn one<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(SuccessOne { data })).into_response()
}

/// `{ "data": [...], "meta": { "count": n } }`, 200.
pub fn many<T: Serialize>(data: Vec<T>) -> Response {
    let count = data.len() as u64;
    Json(SuccessMany {
        data,
        meta: MetaCount { count },
    })
    .into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// 303 See Other, so a POST form lands on a GET.
pub fn redirect(url: &str) -> Response {
    match HeaderValue::from_str(url) {
        Ok(location) => (StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "invalid redirect target").into_response(),
    }
}

/// Attach a `Set-Cookie` header. Values that are not valid header text are dropped.
pub fn with_cookie(mut response: Response, cookie: &str) -> Response {
    if let Ok(v) = HeaderValue::from_str(cookie) {
        response.headers_mut().append(header::SET_COOKIE, v);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redirect_is_see_other() {
        let r = redirect("/users/1");
        assert_eq!(r.status(), StatusCode::SEE_OTHER);
        assert_eq!(r.headers()[header::LOCATION], "/users/1");
        assert_eq!(redirect("/bad\nheader").status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn cookie_is_appended() {
        let r = with_cookie(one(StatusCode::CREATED, json!({"id": 1})), "token=abc; Path=/");
        assert_eq!(r.status(), StatusCode::CREATED);
        assert_eq!(r.headers()[header::SET_COOKIE], "token=abc; Path=/");
    }
}
