//! Outbound HTTP fetches.

use crate::error::AppError;
use reqwest::header::{COOKIE, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use std::borrow::Cow;

/// Status, headers and the body exactly as received.
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Body as text. Invalid UTF-8 is replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone)]
pub struct Download {
    client: Client,
    user_agent: String,
}

fn download_err(e: impl std::fmt::Display) -> AppError {
    AppError::collaborator("download", e)
}

fn check_url(url: &str) -> Result<(), AppError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("URL must start with http:// or https://: {}", url)))
    }
}

/// `a=1; b=2`.
pub fn cookie_header(cookies: &[(String, String)]) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    Some(
        cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

impl Download {
    pub fn new(user_agent: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder().build().map_err(download_err)?;
        Ok(Download {
            client,
            user_agent: user_agent.into(),
        })
    }

    /// `user_agent` overrides the configured one for this call.
    pub async fn get(
        &self,
        url: &str,
        user_agent: Option<&str>,
        cookies: &[(String, String)],
    ) -> Result<RawResponse, AppError> {
        check_url(url)?;
        let request = self.prepare(self.client.get(url), user_agent, cookies);
        Self::execute(request).await
    }

    /// Sends `params` as a url-encoded form.
    pub async fn post(
        &self,
        url: &str,
        params: &[(String, String)],
        user_agent: Option<&str>,
        cookies: &[(String, String)],
    ) -> Result<RawResponse, AppError> {
        check_url(url)?;
        let request = self.prepare(self.client.post(url).form(params), user_agent, cookies);
        Self::execute(request).await
    }

    fn prepare(&self, request: RequestBuilder, user_agent: Option<&str>, cookies: &[(String, String)]) -> RequestBuilder {
        let request = request.header(USER_AGENT, user_agent.unwrap_or(&self.user_agent));
        match cookie_header(cookies) {
            Some(cookie) => request.header(COOKIE, cookie),
            None => request,
        }
    }

    async fn execute(request: RequestBuilder) -> Result<RawResponse, AppError> {
        let response = request.send().await.map_err(download_err)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("<invalid>").to_string()))
            .collect();
        let body = response.bytes().await.map_err(download_err)?.to_vec();
        tracing::debug!(status, bytes = body.len(), "download finished");
        Ok(RawResponse { status, headers, body })
    }
}

/// One-shot loopback HTTP server for tests.
#[cfg(test)]
pub(crate) mod test_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn content_length(head: &str) -> usize {
        head.lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Answers one request with `body`; the handle yields the lowercased request it saw.
    pub(crate) async fn serve_once(body: &'static [u8]) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/file.bin", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut seen = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                if let Some(end) = seen.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&seen[..end]).to_lowercase();
                    if seen.len() >= end + 4 + content_length(&head) {
                        break;
                    }
                }
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                seen.extend_from_slice(&buf[..n]);
            }
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/octet-stream\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&seen).to_lowercase()
        });
        (url, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::test_server::serve_once;
    use super::*;

    #[test]
    fn joins_cookies() {
        let cookies = vec![("a".to_string(), "1".to_string()), ("token".to_string(), "x".to_string())];
        assert_eq!(cookie_header(&cookies).as_deref(), Some("a=1; token=x"));
        assert_eq!(cookie_header(&[]), None);
    }

    #[tokio::test]
    async fn binary_body_is_kept_byte_for_byte() {
        let payload: &'static [u8] = &[0x89, b'P', b'N', b'G', 0xff, 0xfe, 0x00, 0x01];
        let (url, server) = serve_once(payload).await;
        let d = Download::new("default-agent").unwrap();
        let res = d.get(&url, None, &[]).await.unwrap();
        assert_eq!(res.status, 200);
        assert_eq!(res.body, payload);
        assert_eq!(res.header("Content-Type"), Some("application/octet-stream"));
        let head = server.await.unwrap();
        assert!(head.contains("user-agent: default-agent"), "{head}");
    }

    #[tokio::test]
    async fn per_call_agent_and_cookies_are_sent() {
        let (url, server) = serve_once(b"ok").await;
        let d = Download::new("default-agent").unwrap();
        let cookies = vec![("sid".to_string(), "abc".to_string())];
        let params = vec![("q".to_string(), "1".to_string())];
        let res = d.post(&url, &params, Some("crawler/2.0"), &cookies).await.unwrap();
        assert_eq!(res.text(), "ok");
        let head = server.await.unwrap();
        assert!(head.starts_with("post /file.bin"), "{head}");
        assert!(head.contains("user-agent: crawler/2.0"), "{head}");
        assert!(head.contains("cookie: sid=abc"), "{head}");
    }

    #[tokio::test]
    async fn rejects_non_http_urls() {
        let d = Download::new("test-agent").unwrap();
        let err = d.get("file:///etc/passwd", None, &[]).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
