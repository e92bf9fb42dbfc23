use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::domain::error::{Error, ErrorKind};
use crate::domain::gateways::Mailer;

const SMTP_TIMEOUT: Duration = Duration::from_secs(5);
const SEND_ATTEMPTS: u32 = 3;
const RETRY_SPACING: Duration = Duration::from_millis(500);

/// Transporte SMTP con reintentos internos (3 intentos, 500 ms entre ellos).
/// El correo es fire-and-forget: el worker loguea el error final, nunca lo
/// propaga hacia el request original.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        sender: &str,
    ) -> Result<Self, Error> {
        const OP: &str = "mailer.new";

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| Error::internal(OP, e))?
            .port(port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        let sender = sender
            .parse::<Mailbox>()
            .map_err(|e| Error::invalid(OP, format!("invalid sender address: {e}")))?;

        Ok(Self { transport, sender })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        recipient: &str,
        template_file: &str,
        template_data: &serde_json::Value,
    ) -> Result<(), Error> {
        const OP: &str = "mailer.send";

        let (subject, plain, html) = render_template(template_file, template_data)?;

        let to = recipient
            .parse::<Mailbox>()
            .map_err(|e| Error::invalid(OP, format!("invalid recipient address: {e}")))?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(plain, html))
            .map_err(|e| Error::internal(OP, e))?;

        let mut last_err = None;
        for attempt in 1..=SEND_ATTEMPTS {
            match self.transport.send(message.clone()).await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    last_err = Some(e);
                    if attempt < SEND_ATTEMPTS {
                        tokio::time::sleep(RETRY_SPACING).await;
                    }
                }
            }
        }

        let mut err = Error::new(ErrorKind::Internal, OP, "mail delivery failed");
        if let Some(source) = last_err {
            err = err.with_source(source);
        }
        Err(err)
    }
}

/// Render mínimo de plantillas conocidas: (subject, texto plano, html).
///
/// El render "real" de plantillas es un colaborador externo; aquí solo vive
/// el set que el backend encola.
fn render_template(
    template_file: &str,
    data: &serde_json::Value,
) -> Result<(String, String, String), Error> {
    const OP: &str = "mailer.render_template";

    match template_file {
        "user_welcome.tmpl" => {
            let name = data.get("name").and_then(|v| v.as_str()).unwrap_or("there");
            let token = data
                .get("verification_token")
                .and_then(|v| v.as_str())
                .unwrap_or_default();

            let subject = "Welcome to the marketplace".to_string();
            let plain = format!(
                "Hi {name},\n\nYour verification code is {token}.\nIt expires in 15 minutes.\n"
            );
            let html = format!(
                "<p>Hi {name},</p><p>Your verification code is <strong>{token}</strong>.</p>\
                 <p>It expires in 15 minutes.</p>"
            );
            Ok((subject, plain, html))
        }
        other => Err(Error::invalid(
            OP,
            format!("unknown mail template: {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_welcome_template_includes_code() {
        let data = json!({"name": "Asha", "verification_token": "482910"});
        let (subject, plain, html) = render_template("user_welcome.tmpl", &data).unwrap();

        assert!(!subject.is_empty());
        assert!(plain.contains("Asha"));
        assert!(plain.contains("482910"));
        assert!(html.contains("482910"));
    }

    #[test]
    fn test_render_unknown_template_rejected() {
        let err = render_template("missing.tmpl", &json!({})).unwrap_err();
        assert!(err.is_kind(crate::domain::error::ErrorKind::Invalid));
    }
}
