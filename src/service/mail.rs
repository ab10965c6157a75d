//! Outgoing mail over SMTP.

use crate::config::SmtpConfig;
use crate::error::AppError;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

#[derive(Clone)]
pub struct Mail {
    host: String,
    port: u16,
    credentials: Option<Credentials>,
    from: Mailbox,
}

fn mail_err(e: impl std::fmt::Display) -> AppError {
    AppError::collaborator("mail", e)
}

impl Mail {
    pub fn new(smtp: &SmtpConfig) -> Result<Self, AppError> {
        let from = match &smtp.from_name {
            Some(name) if !name.is_empty() => format!("{} <{}>", name, smtp.from_email),
            _ => smtp.from_email.clone(),
        };
        let from = from
            .parse::<Mailbox>()
            .map_err(|e| mail_err(format!("invalid from address: {e}")))?;
        let credentials = (!smtp.username.is_empty())
            .then(|| Credentials::new(smtp.username.clone(), smtp.password.clone()));
        Ok(Mail {
            host: smtp.host.clone(),
            port: smtp.port,
            credentials,
            from,
        })
    }

    /// HTML only, or multipart/alternative when `plain` is given.
    pub fn message(&self, to: &str, subject: &str, html: &str, plain: Option<&str>) -> Result<Message, AppError> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| mail_err(format!("invalid to address: {e}")))?;
        let builder = Message::builder().from(self.from.clone()).to(to).subject(subject);
        let message = match plain {
            Some(plain) => builder.multipart(MultiPart::alternative_plain_html(plain.to_string(), html.to_string())),
            None => builder.header(ContentType::TEXT_HTML).body(html.to_string()),
        };
        message.map_err(|e| mail_err(format!("failed to build email: {e}")))
    }

    pub async fn send(&self, to: &str, subject: &str, html: &str, plain: Option<&str>) -> Result<(), AppError> {
        let message = self.message(to, subject, html, plain)?;
        let mut builder = SmtpTransport::relay(&self.host)
            .map_err(|e| mail_err(format!("SMTP relay error: {e}")))?
            .port(self.port);
        if let Some(credentials) = &self.credentials {
            builder = builder.credentials(credentials.clone());
        }
        let mailer = builder.build();

        tokio::task::spawn_blocking(move || mailer.send(&message))
            .await
            .map_err(|e| mail_err(format!("mail task failed: {e}")))?
            .map_err(|e| mail_err(format!("failed to send email: {e}")))?;
        tracing::debug!(to, subject, "mail sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from_email: "noreply@example.com".into(),
            from_name: Some("Shop".into()),
        }
    }

    #[test]
    fn builds_html_and_alternative_bodies() {
        let mail = Mail::new(&smtp()).unwrap();
        let html_only = String::from_utf8(mail.message("a@b.io", "Hi", "<b>x</b>", None).unwrap().formatted()).unwrap();
        assert!(html_only.contains("Content-Type: text/html"));
        assert!(html_only.contains("From: Shop <noreply@example.com>"));

        let both = String::from_utf8(mail.message("a@b.io", "Hi", "<b>x</b>", Some("x")).unwrap().formatted()).unwrap();
        assert!(both.contains("multipart/alternative"));
        assert!(both.contains("text/plain"));
    }

    #[test]
    fn bad_recipient_is_collaborator_error() {
        let mail = Mail::new(&smtp()).unwrap();
        let err = mail.message("not an address", "Hi", "x", None).unwrap_err();
        assert!(matches!(err, AppError::Collaborator { service: "mail", .. }));
    }
}
