//! Facade: the one object a handler talks to.
//!
//! Built once per request from the shared config, the pool and the request snapshot.
//! Every collaborator is constructed on first use and kept for the rest of the request;
//! the facade itself only forwards.

use crate::case;
use crate::config::AppConfig;
use crate::dispatcher;
use crate::error::AppError;
use crate::extractors::IncomingRequest;
use crate::handlers::HandlerRegistry;
use crate::migration::{Migration, MigrationReport};
use crate::response;
use crate::service::{
    Auth, Credentials, Download, I18n, ImageInfo, ImageService, Mail, RawResponse, Session, Sheet, SheetRows,
    Upload, UploadOutcome, View,
};
use crate::sql::{Filter, RowData};
use crate::store::CrudStore;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct Facade {
    config: Arc<AppConfig>,
    pool: PgPool,
    request: IncomingRequest,
    store: OnceCell<CrudStore>,
    auth: OnceCell<Auth>,
    mail: OnceCell<Mail>,
    image: OnceCell<ImageService>,
    upload: OnceCell<Upload>,
    sheet: OnceCell<Sheet>,
    download: OnceCell<Download>,
    view: OnceCell<View>,
    migration: OnceCell<Migration>,
}

impl Facade {
    pub fn new(config: Arc<AppConfig>, pool: PgPool, request: IncomingRequest) -> Self {
        Facade {
            config,
            pool,
            request,
            store: OnceCell::new(),
            auth: OnceCell::new(),
            mail: OnceCell::new(),
            image: OnceCell::new(),
            upload: OnceCell::new(),
            sheet: OnceCell::new(),
            download: OnceCell::new(),
            view: OnceCell::new(),
            migration: OnceCell::new(),
        }
    }

    /// Route the request and run the handler. Errors become their HTTP rendering.
    pub async fn start(self: &Arc<Self>, registry: &HandlerRegistry) -> Response {
        match dispatcher::dispatch(Arc::clone(self), registry).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn request(&self) -> &IncomingRequest {
        &self.request
    }

    pub fn method(&self) -> &str {
        self.request.method()
    }

    pub fn segment(&self, i: usize) -> Option<&str> {
        self.request.segment(i)
    }

    pub fn segments(&self) -> &[String] {
        self.request.segments()
    }

    pub fn is_ajax(&self) -> bool {
        self.request.is_ajax()
    }

    /// Served from a `.dev` host.
    pub fn is_dev(&self) -> bool {
        self.request
            .host()
            .and_then(|h| h.rsplit('.').next())
            .is_some_and(|tld| tld.eq_ignore_ascii_case("dev"))
    }

    /// Language for views and i18n: `Accept-Language`, else the configured default.
    pub fn lang(&self) -> String {
        self.request
            .preferred_language()
            .unwrap_or_else(|| self.config.http.default_lang.clone())
    }

    fn path(&self, p: &Path) -> PathBuf {
        self.config.paths.resolve(p)
    }

    // --- CRUD ---

    pub async fn store(&self) -> &CrudStore {
        self.store
            .get_or_init(|| async { CrudStore::new(self.pool.clone(), self.config.database.schema.clone()) })
            .await
    }

    pub async fn count(&self, table: &str, filter: &Filter) -> Result<i64, AppError> {
        self.store().await.count(table, filter).await
    }

    pub async fn create(&self, table: &str, data: &RowData) -> Result<Value, AppError> {
        self.store().await.create(table, data).await
    }

    pub async fn read(&self, table: &str, filter: &Filter) -> Result<Option<Value>, AppError> {
        self.store().await.read(table, filter).await
    }

    pub async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Value>, AppError> {
        self.store().await.select(table, filter).await
    }

    pub async fn update(&self, table: &str, data: &RowData, filter: &Filter) -> Result<bool, AppError> {
        self.store().await.update(table, data, filter).await
    }

    pub async fn update_all(&self, table: &str, data: &RowData) -> Result<bool, AppError> {
        self.store().await.update_all(table, data).await
    }

    pub async fn delete(&self, table: &str, filter: &Filter) -> Result<bool, AppError> {
        self.store().await.delete(table, filter).await
    }

    pub async fn delete_all(&self, table: &str) -> Result<bool, AppError> {
        self.store().await.delete_all(table).await
    }

    /// Raw statement; the caller owns injection safety.
    pub async fn query(&self, raw: &str) -> Result<Vec<Value>, AppError> {
        self.store().await.query(raw).await
    }

    // --- auth ---

    async fn auth(&self) -> &Auth {
        self.auth
            .get_or_init(|| async { Auth::new(self.config.http.session_cookie.clone()) })
            .await
    }

    pub async fn is_auth(&self) -> Result<Option<Value>, AppError> {
        let store = self.store().await;
        self.auth().await.is_authenticated(store, &self.request).await
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AppError> {
        let store = self.store().await;
        self.auth().await.sign_in(store, credentials).await
    }

    pub async fn sign_up(&self, data: RowData) -> Result<Session, AppError> {
        let store = self.store().await;
        self.auth().await.sign_up(store, data).await
    }

    pub async fn sign_out(&self) -> Result<bool, AppError> {
        let store = self.store().await;
        self.auth().await.sign_out(store, &self.request).await
    }

    pub async fn session_cookie(&self, session: &Session) -> String {
        self.auth().await.cookie(session)
    }

    pub async fn clear_session_cookie(&self) -> String {
        self.auth().await.clear_cookie()
    }

    // --- mail ---

    pub async fn send(&self, to: &str, subject: &str, html: &str, plain: Option<&str>) -> Result<(), AppError> {
        let mail = self
            .mail
            .get_or_try_init(|| async {
                match &self.config.smtp {
                    Some(smtp) => Mail::new(smtp),
                    None => Err(AppError::collaborator("mail", "SMTP is not configured")),
                }
            })
            .await?;
        mail.send(to, subject, html, plain).await
    }

    // --- image ---

    async fn image(&self) -> &ImageService {
        self.image.get_or_init(|| async { ImageService }).await
    }

    pub async fn image_info(&self, path: &Path) -> Result<ImageInfo, AppError> {
        self.image().await.info(&self.path(path)).await
    }

    pub async fn image_resize(&self, src: &Path, dst: &Path, max_width: u32, max_height: u32) -> Result<ImageInfo, AppError> {
        let (src, dst) = (self.path(src), self.path(dst));
        self.image().await.resize(&src, &dst, max_width, max_height).await
    }

    pub async fn image_crop(&self, src: &Path, dst: &Path, corners: (u32, u32, u32, u32)) -> Result<ImageInfo, AppError> {
        let (src, dst) = (self.path(src), self.path(dst));
        let (x1, y1, x2, y2) = corners;
        self.image().await.crop(&src, &dst, x1, y1, x2, y2).await
    }

    pub async fn image_thumbnail(&self, src: &Path, dst: &Path, width: u32, height: u32) -> Result<ImageInfo, AppError> {
        let (src, dst) = (self.path(src), self.path(dst));
        self.image().await.thumbnail(&src, &dst, width, height).await
    }

    pub async fn image_auto_orient(&self, src: &Path, dst: Option<&Path>) -> Result<ImageInfo, AppError> {
        let src = self.path(src);
        let dst = dst.map(|d| self.path(d));
        self.image().await.auto_orient(&src, dst.as_deref()).await
    }

    // --- upload ---

    pub async fn upload(&self, field: &str, allowed_exts: &[&str]) -> Result<UploadOutcome, AppError> {
        let upload = self
            .upload
            .get_or_init(|| async {
                Upload::new(self.config.paths.uploads_dir(), self.config.http.max_upload_bytes)
            })
            .await;
        upload.handle(&self.request, field, allowed_exts).await
    }

    // --- sheet ---

    async fn sheet(&self) -> &Sheet {
        self.sheet.get_or_init(|| async { Sheet }).await
    }

    pub async fn sheet_to_array(&self, path: &Path) -> Result<SheetRows, AppError> {
        self.sheet().await.to_array(&self.path(path)).await
    }

    pub async fn array_to_sheet(&self, rows: &[Vec<String>], path: &Path) -> Result<(), AppError> {
        self.sheet().await.to_sheet(rows, &self.path(path)).await
    }

    // --- download ---

    async fn download(&self) -> Result<&Download, AppError> {
        self.download
            .get_or_try_init(|| async { Download::new(self.config.http.user_agent.clone()) })
            .await
    }

    /// `user_agent` of `None` sends the configured `http.user_agent`.
    pub async fn get(
        &self,
        url: &str,
        user_agent: Option<&str>,
        cookies: &[(String, String)],
    ) -> Result<RawResponse, AppError> {
        self.download().await?.get(url, user_agent, cookies).await
    }

    pub async fn post(
        &self,
        url: &str,
        params: &[(String, String)],
        user_agent: Option<&str>,
        cookies: &[(String, String)],
    ) -> Result<RawResponse, AppError> {
        self.download().await?.post(url, params, user_agent, cookies).await
    }

    // --- views ---

    async fn views(&self) -> Result<&View, AppError> {
        self.view
            .get_or_try_init(|| async {
                let i18n = I18n::load(&self.config.paths.i18n_file()).await?;
                Ok::<_, AppError>(View::new(self.config.paths.views_dir(), i18n, self.lang()))
            })
            .await
    }

    /// Rendered template as a string.
    pub async fn view(&self, name: &str, data: &Value) -> Result<String, AppError> {
        self.views().await?.view(name, data).await
    }

    /// Rendered template as an HTML response.
    pub async fn render(&self, name: &str, data: &Value) -> Result<Response, AppError> {
        let html = self.view(name, data).await?;
        Ok(axum::response::Html(html).into_response())
    }

    pub async fn i18n(&self, key: &str) -> Result<String, AppError> {
        Ok(self.views().await?.i18n(key))
    }

    pub fn first_word<'a>(&self, phrase: &'a str) -> &'a str {
        case::first_word(phrase)
    }

    pub fn slug(&self, text: &str, set: bool) -> String {
        case::slug(text, set)
    }

    pub fn json<T: Serialize>(&self, data: T) -> Response {
        response::json(data)
    }

    pub fn redirect(&self, url: &str) -> Response {
        response::redirect(url)
    }

    // --- table lifecycle ---

    async fn migration(&self) -> &Migration {
        self.migration
            .get_or_init(|| async {
                Migration::new(
                    self.pool.clone(),
                    self.config.database.schema.clone(),
                    self.config.paths.tables_dir(),
                )
            })
            .await
    }

    pub async fn migrate_all(&self) -> Result<MigrationReport, AppError> {
        self.migration().await.migrate_all().await
    }

    pub async fn drop_all(&self) -> Result<MigrationReport, AppError> {
        self.migration().await.drop_all().await
    }

    pub async fn truncate_all(&self) -> Result<MigrationReport, AppError> {
        self.migration().await.truncate_all().await
    }
}
