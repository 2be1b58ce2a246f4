//! Send a converted report by email.
//!
//! Credentials come from the environment, optionally seeded from a `.env`
//! file: `EMAIL_SENDER`, `EMAIL_PASSWORD`, `SMTP_SERVER`, `SMTP_PORT`.
//! Delivery uses SMTP with implicit TLS (SMTPS) and needs the `mail`
//! feature; credential loading is always available.

use crate::error::Pdf2XlsxError;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Body file read when the caller does not name one.
pub const DEFAULT_BODY_FILE: &str = "email.txt";

/// Subject used when the caller does not give one.
pub const DEFAULT_SUBJECT: &str = "Test email";

const VAR_SENDER: &str = "EMAIL_SENDER";
const VAR_PASSWORD: &str = "EMAIL_PASSWORD";
const VAR_SERVER: &str = "SMTP_SERVER";
const VAR_PORT: &str = "SMTP_PORT";

/// SMTP account settings.
#[derive(Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub sender: String,
    pub password: String,
    pub smtp_server: String,
    pub smtp_port: u16,
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("sender", &self.sender)
            .field("password", &"<redacted>")
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .finish()
    }
}

impl MailConfig {
    /// Read the four variables from the process environment.
    pub fn from_env() -> Result<Self, Pdf2XlsxError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load `dir/.env` (a missing file is fine; variables already set in
    /// the environment win), then read the environment.
    pub fn from_env_file(dir: &Path) -> Result<Self, Pdf2XlsxError> {
        let env_path = dir.join(".env");
        match dotenvy::from_path(&env_path) {
            Ok(()) => debug!("Loaded {}", env_path.display()),
            Err(e) if e.not_found() => debug!("No .env in {}", dir.display()),
            Err(e) => {
                return Err(Pdf2XlsxError::InvalidConfig(format!(
                    "Cannot read {}: {}",
                    env_path.display(),
                    e
                )))
            }
        }
        Self::from_env()
    }

    /// Build from any variable source; empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Pdf2XlsxError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Pdf2XlsxError::MissingCredential {
                    var: var.to_string(),
                })
        };

        let sender = required(VAR_SENDER)?;
        let password = required(VAR_PASSWORD)?;
        let smtp_server = required(VAR_SERVER)?;
        let port = required(VAR_PORT)?;
        let smtp_port = port.parse::<u16>().map_err(|_| {
            Pdf2XlsxError::InvalidConfig(format!("{VAR_PORT} must be a port number, got '{port}'"))
        })?;

        Ok(Self {
            sender,
            password,
            smtp_server,
            smtp_port,
        })
    }
}

/// One message to send.
#[derive(Debug, Clone)]
pub struct Email {
    pub recipient: String,
    pub subject: String,
    /// Plain-text file holding the body.
    pub body_path: PathBuf,
}

impl Email {
    /// Defaults: body from [`DEFAULT_BODY_FILE`], subject [`DEFAULT_SUBJECT`].
    pub fn to(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            subject: DEFAULT_SUBJECT.to_string(),
            body_path: PathBuf::from(DEFAULT_BODY_FILE),
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn body_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.body_path = path.into();
        self
    }

    fn read_body(&self) -> Result<String, Pdf2XlsxError> {
        std::fs::read_to_string(&self.body_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Pdf2XlsxError::FileNotFound {
                path: self.body_path.clone(),
            },
            std::io::ErrorKind::PermissionDenied => Pdf2XlsxError::PermissionDenied {
                path: self.body_path.clone(),
            },
            _ => Pdf2XlsxError::Mail(format!("Cannot read {}: {}", self.body_path.display(), e)),
        })
    }
}

/// Send `email` through the account in `config`.
#[cfg(feature = "mail")]
pub async fn send_email(config: &MailConfig, email: &Email) -> Result<(), Pdf2XlsxError> {
    use lettre::message::header::ContentType;
    use lettre::message::Mailbox;
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{Message, SmtpTransport, Transport};

    let body = email.read_body()?;
    let from: Mailbox = config
        .sender
        .parse()
        .map_err(|e| Pdf2XlsxError::InvalidConfig(format!("{VAR_SENDER}: {e}")))?;
    let to: Mailbox = email
        .recipient
        .parse()
        .map_err(|e| Pdf2XlsxError::InvalidConfig(format!("Recipient '{}': {e}", email.recipient)))?;

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(body)
        .map_err(|e| Pdf2XlsxError::Mail(e.to_string()))?;

    let mailer = SmtpTransport::relay(&config.smtp_server)
        .map_err(|e| Pdf2XlsxError::Mail(e.to_string()))?
        .port(config.smtp_port)
        .credentials(Credentials::new(config.sender.clone(), config.password.clone()))
        .build();

    let recipient = email.recipient.clone();
    tokio::task::spawn_blocking(move || mailer.send(&message))
        .await
        .map_err(|e| Pdf2XlsxError::Internal(format!("Mail task panicked: {}", e)))?
        .map_err(|e| Pdf2XlsxError::Mail(e.to_string()))?;

    tracing::info!("Email sent to {}", recipient);
    Ok(())
}

/// Send `email` through the account in `config`.
#[cfg(not(feature = "mail"))]
pub async fn send_email(_config: &MailConfig, email: &Email) -> Result<(), Pdf2XlsxError> {
    email.read_body()?;
    Err(Pdf2XlsxError::Mail(
        "mail support is not compiled in; rebuild with --features mail".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn full() -> HashMap<String, String> {
        vars(&[
            ("EMAIL_SENDER", "reports@example.com"),
            ("EMAIL_PASSWORD", "hunter2"),
            ("SMTP_SERVER", "smtp.example.com"),
            ("SMTP_PORT", "465"),
        ])
    }

    #[test]
    fn reads_all_four_variables() {
        let env = full();
        let config = MailConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.sender, "reports@example.com");
        assert_eq!(config.smtp_port, 465);
    }

    #[test]
    fn missing_or_empty_variable_is_named() {
        let mut env = full();
        env.insert("SMTP_SERVER".into(), "  ".into());
        match MailConfig::from_lookup(|k| env.get(k).cloned()).unwrap_err() {
            Pdf2XlsxError::MissingCredential { var } => assert_eq!(var, "SMTP_SERVER"),
            other => panic!("unexpected {other:?}"),
        }

        let mut env = full();
        env.remove("EMAIL_PASSWORD");
        assert!(matches!(
            MailConfig::from_lookup(|k| env.get(k).cloned()),
            Err(Pdf2XlsxError::MissingCredential { .. })
        ));
    }

    #[test]
    fn non_numeric_port_is_invalid() {
        let mut env = full();
        env.insert("SMTP_PORT".into(), "smtps".into());
        assert!(matches!(
            MailConfig::from_lookup(|k| env.get(k).cloned()),
            Err(Pdf2XlsxError::InvalidConfig(_))
        ));
    }

    #[test]
    fn debug_redacts_password() {
        let env = full();
        let config = MailConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn email_defaults() {
        let email = Email::to("a@example.com");
        assert_eq!(email.subject, "Test email");
        assert_eq!(email.body_path, PathBuf::from("email.txt"));
    }

    #[tokio::test]
    async fn missing_body_fails_before_connecting() {
        let env = full();
        let config = MailConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        let email = Email::to("a@example.com").body_path("/no/such/body.txt");
        let err = send_email(&config, &email).await.unwrap_err();
        assert!(matches!(err, Pdf2XlsxError::FileNotFound { .. }));
    }
}
