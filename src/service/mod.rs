//! Collaborators the facade builds on first use.

pub mod auth;
pub mod download;
pub mod image;
pub mod mail;
pub mod sheet;
pub mod upload;
pub mod validation;
pub mod view;

pub use auth::{Auth, Credentials, Session};
pub use download::{Download, RawResponse};
pub use image::{ImageInfo, ImageService};
pub use mail::Mail;
pub use sheet::{Sheet, SheetRows};
pub use upload::{StoredFile, Upload, UploadOutcome};
pub use validation::{RequestValidator, Rules, ValidationRule};
pub use view::{I18n, View};
