use super::payload;
use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::Response;
use basic_sdk::service::Credentials;
use basic_sdk::{response, AppError, Facade, Handler};
use serde_json::Value;
use std::sync::Arc;

pub struct Session {
    facade: Arc<Facade>,
}

impl Session {
    pub fn new(facade: Arc<Facade>) -> Self {
        Session { facade }
    }
}

#[async_trait]
impl Handler for Session {
    /// Who is signed in.
    async fn read(&self, _arg: Option<&str>) -> Result<Response, AppError> {
        match self.facade.is_auth().await? {
            Some(user) => Ok(response::one(StatusCode::OK, user)),
            None => Err(AppError::Unauthorized("not signed in".into())),
        }
    }

    async fn create(&self, _arg: Option<&str>) -> Result<Response, AppError> {
        let data = payload(&self.facade)?;
        let field = |k: &str| data.get(k).and_then(Value::as_str).unwrap_or_default().to_string();
        let credentials = Credentials {
            email: field("email"),
            password: field("password"),
        };
        let session = self.facade.sign_in(&credentials).await?;
        let cookie = self.facade.session_cookie(&session).await;
        if self.facade.is_ajax() {
            return Ok(response::with_cookie(response::one(StatusCode::CREATED, session), &cookie));
        }
        Ok(response::with_cookie(self.facade.redirect("/"), &cookie))
    }

    async fn delete(&self, _arg: Option<&str>) -> Result<Response, AppError> {
        self.facade.sign_out().await?;
        let cookie = self.facade.clear_session_cookie().await;
        Ok(response::with_cookie(self.facade.redirect("/"), &cookie))
    }
}
