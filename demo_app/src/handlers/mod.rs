mod home;
mod session;
mod user;

use basic_sdk::{AppError, Facade, HandlerRegistry, RowData};
use serde_json::Value;

pub fn registry() -> HandlerRegistry {
    HandlerRegistry::new()
        .register("Home", home::Home::new)
        .register("User", user::User::new)
        .register("Session", session::Session::new)
}

/// Form fields, or the JSON body when no form was sent.
fn payload(facade: &Facade) -> Result<RowData, AppError> {
    let request = facade.request();
    if !request.form().is_empty() {
        return Ok(request
            .form()
            .iter()
            .filter(|(k, _)| !k.starts_with('_'))
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect());
    }
    if request.body().is_empty() {
        return Ok(RowData::new());
    }
    request.json()
}

fn parse_id(arg: Option<&str>) -> Result<i64, AppError> {
    let raw = arg.ok_or_else(|| AppError::BadRequest("missing id".into()))?;
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("invalid id: {}", raw)))
}
