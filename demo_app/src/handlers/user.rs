//! `/users`: list, show, sign up, rename, close account.

use super::{parse_id, payload};
use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::Response;
use basic_sdk::service::auth::{strip_sensitive, USERS_TABLE};
use basic_sdk::service::{RequestValidator, Rules, ValidationRule};
use basic_sdk::{columns, response, AppError, Facade, Filter, Handler, RowData};
use serde_json::{json, Value};
use std::sync::Arc;

/// Columns a signed-in user may change on their own row.
const EDITABLE: [&str; 1] = ["name"];

pub struct User {
    facade: Arc<Facade>,
}

impl User {
    pub fn new(facade: Arc<Facade>) -> Self {
        User { facade }
    }

    /// The signed-in user, who must be `id`.
    async fn require_self(&self, id: i64) -> Result<Value, AppError> {
        let user = self
            .facade
            .is_auth()
            .await?
            .ok_or_else(|| AppError::Unauthorized("sign in first".into()))?;
        if user.get("id").and_then(Value::as_i64) != Some(id) {
            return Err(AppError::Unauthorized("not your account".into()));
        }
        Ok(user)
    }
}

#[async_trait]
impl Handler for User {
    async fn read(&self, arg: Option<&str>) -> Result<Response, AppError> {
        if arg.is_none() {
            let users: Vec<Value> = self
                .facade
                .select(USERS_TABLE, &Filter::new())
                .await?
                .into_iter()
                .map(strip_sensitive)
                .collect();
            return Ok(response::many(users));
        }
        let id = parse_id(arg)?;
        let user = self
            .facade
            .read(USERS_TABLE, &columns([("id", json!(id))]))
            .await?
            .map(strip_sensitive)
            .ok_or_else(|| AppError::NotFound(format!("user {}", id)))?;
        if self.facade.is_ajax() {
            return Ok(response::one(StatusCode::OK, user));
        }
        self.facade.render("user/show", &json!({ "user": user })).await
    }

    /// Sign up and start a session.
    async fn create(&self, _arg: Option<&str>) -> Result<Response, AppError> {
        let session = self.facade.sign_up(payload(&self.facade)?).await?;
        let cookie = self.facade.session_cookie(&session).await;
        Ok(response::with_cookie(response::one(StatusCode::CREATED, session), &cookie))
    }

    async fn update(&self, arg: Option<&str>) -> Result<Response, AppError> {
        let id = parse_id(arg)?;
        self.require_self(id).await?;
        let data: RowData = payload(&self.facade)?
            .into_iter()
            .filter(|(k, _)| EDITABLE.contains(&k.as_str()))
            .collect();
        if data.is_empty() {
            return Err(AppError::Validation(format!("nothing to change; editable: {}", EDITABLE.join(", "))));
        }
        let rules = Rules::from([("name".to_string(), ValidationRule::required().max_length(80))]);
        RequestValidator::validate(&data, &rules)?;
        self.facade
            .update(USERS_TABLE, &data, &columns([("id", json!(id))]))
            .await?;
        if self.facade.is_ajax() {
            return Ok(response::no_content());
        }
        Ok(self.facade.redirect(&format!("/users/{}", id)))
    }

    /// Close the account. Sessions go with it.
    async fn delete(&self, arg: Option<&str>) -> Result<Response, AppError> {
        let id = parse_id(arg)?;
        self.require_self(id).await?;
        self.facade
            .delete(USERS_TABLE, &columns([("id", json!(id))]))
            .await?;
        let cookie = self.facade.clear_session_cookie().await;
        Ok(response::with_cookie(response::no_content(), &cookie))
    }
}
