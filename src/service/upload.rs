//! Store uploaded files under the uploads directory.

use crate::error::AppError;
use crate::extractors::{IncomingRequest, UploadedPart};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize)]
pub struct StoredFile {
    pub field: String,
    pub original_name: String,
    pub stored_name: String,
    pub path: PathBuf,
    pub size: usize,
    pub content_type: Option<String>,
}

#[derive(Clone, Debug)]
pub enum UploadOutcome {
    Stored(StoredFile),
    /// Every reason the file was refused.
    Rejected(Vec<String>),
}

pub struct Upload {
    dir: PathBuf,
    max_bytes: usize,
}

impl Upload {
    pub fn new(dir: PathBuf, max_bytes: usize) -> Self {
        Upload { dir, max_bytes }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store the file sent in `field` if its extension is one of `allowed_exts`
    /// (case-insensitive; empty allows any).
    pub async fn handle(
        &self,
        request: &IncomingRequest,
        field: &str,
        allowed_exts: &[&str],
    ) -> Result<UploadOutcome, AppError> {
        let part = request.file(field);
        let errors = check(part, field, allowed_exts, self.max_bytes);
        let part = match part {
            Some(part) if errors.is_empty() => part,
            _ => {
                tracing::warn!(field, ?errors, "upload rejected");
                return Ok(UploadOutcome::Rejected(errors));
            }
        };

        let ext = extension(&part.file_name).unwrap_or_default();
        let stored_name = format!("{}.{}", uuid::Uuid::new_v4(), ext);
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(&stored_name);
        tokio::fs::write(&path, &part.data).await?;
        tracing::debug!(field, path = %path.display(), size = part.data.len(), "upload stored");

        Ok(UploadOutcome::Stored(StoredFile {
            field: field.to_string(),
            original_name: part.file_name.clone(),
            stored_name,
            path,
            size: part.data.len(),
            content_type: part.content_type.clone(),
        }))
    }
}

fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

pub fn check(part: Option<&UploadedPart>, field: &str, allowed_exts: &[&str], max_bytes: usize) -> Vec<String> {
    let Some(part) = part else {
        return vec![format!("no file sent in {}", field)];
    };
    let mut errors = Vec::new();
    if part.data.is_empty() {
        errors.push(format!("{} is empty", part.file_name));
    }
    if part.data.len() > max_bytes {
        errors.push(format!("{} exceeds {} bytes", part.file_name, max_bytes));
    }
    let ext = extension(&part.file_name);
    match ext {
        None => errors.push(format!("{} has no extension", part.file_name)),
        Some(ext) if !allowed_exts.is_empty() && !allowed_exts.iter().any(|a| a.eq_ignore_ascii_case(&ext)) => {
            errors.push(format!("extension .{} is not allowed", ext))
        }
        Some(_) => {}
    }
    errors
}
