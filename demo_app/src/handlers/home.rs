use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use basic_sdk::{AppError, Facade, Handler};
use serde_json::{json, Value};
use std::sync::Arc;

pub struct Home {
    facade: Arc<Facade>,
}

impl Home {
    pub fn new(facade: Arc<Facade>) -> Self {
        Home { facade }
    }
}

#[async_trait]
impl Handler for Home {
    async fn read(&self, _arg: Option<&str>) -> Result<Response, AppError> {
        let user = self.facade.is_auth().await?;
        let first_name = user
            .as_ref()
            .and_then(|u| u.get("name"))
            .and_then(Value::as_str)
            .map(|name| self.facade.first_word(name).to_string());
        let data = json!({
            "user": user,
            "first_name": first_name,
            "greeting": self.facade.i18n("greeting").await?,
        });
        if self.facade.is_ajax() {
            return Ok(self.facade.json(data));
        }
        self.facade.render("home", &data).await
    }

    async fn not_found(&self) -> Result<Response, AppError> {
        let path = self.facade.request().path().to_string();
        tracing::info!(path = %path, "page not found");
        if self.facade.is_ajax() {
            return Err(AppError::NotFound(path));
        }
        let html = self.facade.view("not_found", &json!({ "path": path })).await?;
        Ok((StatusCode::NOT_FOUND, Html(html)).into_response())
    }
}
