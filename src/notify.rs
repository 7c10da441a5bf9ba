use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info, warn};

use crate::config::SmtpConfig;

pub const CONFIRMATION_SUBJECT: &str = "Admission Application Confirmation";

/// Sends the confirmation that carries an applicant's application ID.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_confirmation(
        &self,
        to: &str,
        application_id: &str,
        name: &str,
    ) -> anyhow::Result<()>;
}

pub fn from_config(cfg: Option<&SmtpConfig>) -> anyhow::Result<std::sync::Arc<dyn Notifier>> {
    match cfg {
        Some(smtp) => {
            info!(host = %smtp.host, port = smtp.port, "smtp notifier enabled");
            Ok(std::sync::Arc::new(SmtpNotifier::new(smtp)?))
        }
        None => {
            info!("SMTP_HOST not set; confirmation emails are only logged");
            Ok(std::sync::Arc::new(LogNotifier))
        }
    }
}

/// Relays without a configured username are used unauthenticated.
fn smtp_credentials(cfg: &SmtpConfig) -> Option<Credentials> {
    if cfg.username.trim().is_empty() {
        return None;
    }
    Some(Credentials::new(cfg.username.clone(), cfg.password.clone()))
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    logo_path: PathBuf,
}

impl SmtpNotifier {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .context("smtp relay")?
            .port(cfg.port);
        if let Some(credentials) = smtp_credentials(cfg) {
            builder = builder.credentials(credentials);
        }
        let transport = builder.build();
        let from = cfg
            .from
            .parse::<Mailbox>()
            .with_context(|| format!("invalid sender address {:?}", cfg.from))?;
        Ok(Self {
            transport,
            from,
            logo_path: cfg.logo_path.clone(),
        })
    }

    async fn logo(&self) -> Option<Vec<u8>> {
        match tokio::fs::read(&self.logo_path).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(path = %self.logo_path.display(), error = %e, "logo unavailable; sending without it");
                None
            }
        }
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_confirmation(
        &self,
        to: &str,
        application_id: &str,
        name: &str,
    ) -> anyhow::Result<()> {
        let recipient = to
            .parse::<Mailbox>()
            .with_context(|| format!("invalid recipient {to:?}"))?;
        let logo = self.logo().await;
        let html = SinglePart::html(confirmation_html(name, application_id, logo.is_some()));

        let body = match logo {
            Some(bytes) => MultiPart::related().singlepart(html).singlepart(
                Attachment::new_inline("logo".to_string()).body(bytes, ContentType::parse("image/png")?),
            ),
            None => MultiPart::related().singlepart(html),
        };

        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(CONFIRMATION_SUBJECT)
            .multipart(body)
            .context("build confirmation email")?;

        self.transport
            .send(message)
            .await
            .context("smtp send")?;
        debug!(%to, %application_id, "confirmation email sent");
        Ok(())
    }
}

/// Used when no SMTP relay is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_confirmation(
        &self,
        to: &str,
        application_id: &str,
        name: &str,
    ) -> anyhow::Result<()> {
        info!(%to, %application_id, %name, "confirmation email (not sent, smtp disabled)");
        Ok(())
    }
}

pub fn confirmation_html(name: &str, application_id: &str, with_logo: bool) -> String {
    let logo = if with_logo {
        r#"<img src="cid:logo" alt="Institution Logo" width="150" style="margin-bottom: 20px;"/>"#
    } else {
        ""
    };
    format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif;">
    {logo}
    <p>Hello <strong>{name}</strong>,</p>
    <p>Thank you for applying to our institution!</p>
    <p><strong>Your Application ID:</strong> {application_id}</p>
    <p>Use this ID to check your admission status on our website.</p>
    <br>
    <p>Best regards,<br>Admissions Team</p>
  </body>
</html>
"#,
        name = escape_html(name),
        application_id = escape_html(application_id),
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_greets_applicant_and_carries_id() {
        let html = confirmation_html("Asha Rao", "ADM20251006001", true);
        assert!(html.contains("Hello <strong>Asha Rao</strong>"));
        assert!(html.contains("ADM20251006001"));
        assert!(html.contains("cid:logo"));
    }

    #[test]
    fn html_omits_logo_and_escapes_markup() {
        let html = confirmation_html("<script>x</script>", "ADM20251006001", false);
        assert!(!html.contains("cid:logo"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    fn smtp_config(username: &str) -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: username.into(),
            password: "secret".into(),
            from: "admissions@example.com".into(),
            logo_path: PathBuf::from("static/logo.png"),
        }
    }

    #[test]
    fn credentials_only_when_username_configured() {
        assert!(smtp_credentials(&smtp_config("")).is_none());
        assert!(smtp_credentials(&smtp_config("mailer")).is_some());
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        LogNotifier
            .send_confirmation("a@x.com", "ADM20251006001", "A")
            .await
            .unwrap();
    }
}
