//! Immutable per-request snapshot: path segments, verb, override verb, form fields, uploaded files.

use crate::dispatcher::extract_segments;
use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart},
    http::{header, HeaderMap, HeaderName, HeaderValue},
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Form field carrying the verb for clients that can only send GET/POST.
pub const METHOD_OVERRIDE_FIELD: &str = "_method";

/// Header alternative to [`METHOD_OVERRIDE_FIELD`]. The form field wins when both are present.
pub const METHOD_OVERRIDE_HEADER: &str = "x-http-method-override";

/// One file part of a multipart body.
#[derive(Clone, Debug)]
pub struct UploadedPart {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Clone, Debug, Default)]
pub struct IncomingRequest {
    method: String,
    path: String,
    segments: Vec<String>,
    headers: HeaderMap,
    query: HashMap<String, String>,
    form: HashMap<String, String>,
    files: Vec<UploadedPart>,
    body: Bytes,
}

impl IncomingRequest {
    /// Synthetic request (CLI entry points, tests). `path` may carry a query string.
    pub fn new(method: &str, path: &str) -> Self {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p, parse_pairs(q).unwrap_or_default()),
            None => (path, HashMap::new()),
        };
        IncomingRequest {
            method: method.to_string(),
            path: path.to_string(),
            segments: extract_segments(path),
            query,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(n), Ok(v)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            self.headers.append(n, v);
        }
        self
    }

    pub fn with_form(mut self, key: &str, value: &str) -> Self {
        self.form.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_file(mut self, part: UploadedPart) -> Self {
        self.files.push(part);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Transport verb as sent (e.g. "GET").
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Verb from `_method` or the override header, if any.
    pub fn override_verb(&self) -> Option<&str> {
        self.form
            .get(METHOD_OVERRIDE_FIELD)
            .map(String::as_str)
            .or_else(|| self.header(METHOD_OVERRIDE_HEADER))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn segment(&self, i: usize) -> Option<&str> {
        self.segments.get(i).map(String::as_str)
    }

    pub fn is_ajax(&self) -> bool {
        self.header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Host name without port.
    pub fn host(&self) -> Option<&str> {
        let host = self.header(header::HOST.as_str())?;
        Some(host.rsplit_once(':').map(|(h, _)| h).unwrap_or(host))
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.to_string())
    }

    /// Primary language subtag of the first `Accept-Language` entry, lowercased.
    pub fn preferred_language(&self) -> Option<String> {
        let raw = self.header(header::ACCEPT_LANGUAGE.as_str())?;
        let first = raw.split(',').next()?.split(';').next()?.trim();
        let lang = first.split('-').next()?.trim().to_ascii_lowercase();
        (!lang.is_empty() && lang != "*").then_some(lang)
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn form(&self) -> &HashMap<String, String> {
        &self.form
    }

    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form.get(key).map(String::as_str)
    }

    pub fn files(&self) -> &[UploadedPart] {
        &self.files
    }

    pub fn file(&self, field: &str) -> Option<&UploadedPart> {
        self.files.iter().find(|f| f.field == field)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decode the raw body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_slice(&self.body).map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))
    }
}

fn parse_pairs(raw: &str) -> Result<HashMap<String, String>, AppError> {
    if raw.is_empty() {
        return Ok(HashMap::new());
    }
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_str(raw).map_err(|e| AppError::BadRequest(format!("malformed form data: {}", e)))?;
    Ok(pairs.into_iter().collect())
}

#[async_trait]
impl<S> FromRequest<S> for IncomingRequest
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: axum::extract::Request, state: &S) -> Result<Self, Self::Rejection> {
        let method = req.method().as_str().to_string();
        let path = req.uri().path().to_string();
        let query = parse_pairs(req.uri().query().unwrap_or(""))?;
        let headers = req.headers().clone();
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        let mut form = HashMap::new();
        let mut files = Vec::new();
        let mut body = Bytes::new();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?
            {
                let name = field.name().unwrap_or("").to_string();
                let file_name = field.file_name().map(str::to_string);
                let part_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|e| AppError::BadRequest(e.body_text()))?;
                match file_name {
                    Some(file_name) => files.push(UploadedPart {
                        field: name,
                        file_name,
                        content_type: part_type,
                        data,
                    }),
                    None => {
                        form.insert(name, String::from_utf8_lossy(&data).into_owned());
                    }
                }
            }
        } else {
            body = Bytes::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            if content_type.starts_with("application/x-www-form-urlencoded") {
                let raw = std::str::from_utf8(&body)
                    .map_err(|_| AppError::BadRequest("form body is not UTF-8".into()))?;
                form = parse_pairs(raw)?;
            }
        }

        Ok(IncomingRequest {
            method,
            segments: extract_segments(&path),
            path,
            headers,
            query,
            form,
            files,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_override_wins_over_header() {
        let req = IncomingRequest::new("POST", "/users/1")
            .with_header(METHOD_OVERRIDE_HEADER, "PUT")
            .with_form(METHOD_OVERRIDE_FIELD, "DELETE");
        assert_eq!(req.override_verb(), Some("DELETE"));

        let req = IncomingRequest::new("POST", "/users/1").with_header(METHOD_OVERRIDE_HEADER, " PUT ");
        assert_eq!(req.override_verb(), Some("PUT"));

        let req = IncomingRequest::new("POST", "/users/1").with_form(METHOD_OVERRIDE_FIELD, "");
        assert_eq!(req.override_verb(), None);
    }

    #[test]
    fn synthetic_request_splits_query() {
        let req = IncomingRequest::new("GET", "/posts/7?page=2&q=a%20b");
        assert_eq!(req.path(), "/posts/7");
        assert_eq!(req.segments(), ["posts", "7"]);
        assert_eq!(req.query().get("q").map(String::as_str), Some("a b"));
    }

    #[test]
    fn headers_derive_flags() {
        let req = IncomingRequest::new("GET", "/")
            .with_header("x-requested-with", "XMLHttpRequest")
            .with_header("host", "shop.dev:8080")
            .with_header("cookie", "a=1; token=abc")
            .with_header("accept-language", "pt-BR,pt;q=0.9,en;q=0.8");
        assert!(req.is_ajax());
        assert_eq!(req.host(), Some("shop.dev"));
        assert_eq!(req.cookie("token").as_deref(), Some("abc"));
        assert_eq!(req.preferred_language().as_deref(), Some("pt"));
    }
}
