use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{error, info};

use crate::mail_sender::template::render_template;
use crate::mail_sender::{Recipient, SendResult, SendStatus};
use crate::settings::{Account, SubmissionConfig};

// Owns at most one authenticated SMTP session, mirroring the scraper's
// connect / use / disconnect lifecycle on the submission side.
pub struct MailSender {
    config: SubmissionConfig,
    session: Option<SmtpSession>,
}

struct SmtpSession {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl MailSender {
    pub fn new(config: SubmissionConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    // STARTTLS upgrade, then authenticate. The transport connects lazily, so
    // probe it here: a bad credential pair must fail connect, not the first
    // send.
    pub async fn connect(&mut self, account: &Account) -> Result<()> {
        let from: Mailbox = account
            .email
            .parse()
            .with_context(|| format!("invalid sender address '{}'", account.email))?;

        let credentials = Credentials::new(account.email.clone(), account.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.server)
            .context("cannot configure the SMTP relay")?
            .port(self.config.port)
            .credentials(credentials)
            .build();

        let reachable = transport
            .test_connection()
            .await
            .with_context(|| format!("SMTP connection to {} failed", self.config.server))?;
        if !reachable {
            bail!("SMTP server {} did not accept the connection", self.config.server);
        }

        info!(
            "-- connected to {}:{} as {}",
            self.config.server, self.config.port, account.email
        );
        self.session = Some(SmtpSession { transport, from });
        Ok(())
    }

    // One message, one attempt. Attachment files are read at send time and
    // left untouched; their lifecycle belongs to the caller.
    pub async fn send_one(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachments: &[PathBuf],
        is_html: bool,
    ) -> Result<()> {
        let session = self
            .session
            .as_ref()
            .context("not connected to the SMTP server")?;

        let message = build_message(&session.from, to, subject, body, attachments, is_html).await?;

        session
            .transport
            .send(message)
            .await
            .with_context(|| format!("sending to {} failed", to))?;

        info!("-- mail sent to {}", to);
        Ok(())
    }

    pub async fn send_bulk(
        &self,
        recipients: &[Recipient],
        subject_template: &str,
        body_template: &str,
        attachments: &[PathBuf],
    ) -> Result<Vec<SendResult>> {
        self.session
            .as_ref()
            .context("not connected to the SMTP server")?;

        run_bulk(recipients, subject_template, body_template, |to, subject, body| async move {
            self.send_one(&to, &subject, &body, attachments, false).await
        })
        .await
    }

    // Best-effort teardown; dropping the transport closes its connections
    pub async fn disconnect(&mut self) {
        if self.session.take().is_some() {
            info!("-- SMTP session closed");
        }
    }
}

// The bulk loop, with the transport behind a closure: one result row per
// recipient, in input order, and a failed row never stops the remaining ones.
pub(crate) async fn run_bulk<F, Fut>(
    recipients: &[Recipient],
    subject_template: &str,
    body_template: &str,
    mut send: F,
) -> Result<Vec<SendResult>>
where
    F: FnMut(String, String, String) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    // A table without the column at all is a caller mistake, distinct from a
    // stray row missing its address
    if !recipients.is_empty() && recipients.iter().all(|r| r.email().is_none()) {
        bail!("recipient table has no 'email' column");
    }

    let mut results = Vec::with_capacity(recipients.len());

    for recipient in recipients {
        let name = recipient.name().to_string();

        let result = match recipient.email() {
            None => {
                error!("skipping a recipient row without an 'email' field");
                SendResult {
                    email: "Unknown".to_string(),
                    name,
                    status: SendStatus::Failed,
                    message: "row has no 'email' field".to_string(),
                }
            }
            Some(email) => {
                let subject = render_template(subject_template, recipient);
                let body = render_template(body_template, recipient);

                match send(email.to_string(), subject, body).await {
                    Ok(()) => SendResult {
                        email: email.to_string(),
                        name,
                        status: SendStatus::Sent,
                        message: "sent successfully".to_string(),
                    },
                    Err(e) => {
                        error!("sending to {} failed: {:#}", email, e);
                        SendResult {
                            email: email.to_string(),
                            name,
                            status: SendStatus::Failed,
                            message: format!("{:#}", e),
                        }
                    }
                }
            }
        };

        results.push(result);
    }

    Ok(results)
}

// multipart/mixed: one text part plus one base64 part per attachment
pub(crate) async fn build_message(
    from: &Mailbox,
    to: &str,
    subject: &str,
    body: &str,
    attachments: &[PathBuf],
    is_html: bool,
) -> Result<Message> {
    let to_mailbox: Mailbox = to
        .parse()
        .with_context(|| format!("invalid recipient address '{}'", to))?;

    let builder = Message::builder()
        .from(from.clone())
        .to(to_mailbox)
        .subject(subject);

    let body_part = if is_html {
        SinglePart::html(body.to_string())
    } else {
        SinglePart::plain(body.to_string())
    };

    let mut parts = MultiPart::mixed().singlepart(body_part);
    for path in attachments {
        parts = parts.singlepart(load_attachment(path).await?);
    }

    builder
        .multipart(parts)
        .context("cannot assemble the MIME message")
}

async fn load_attachment(path: &Path) -> Result<SinglePart> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read attachment {}", path.display()))?;

    // Attach under the file name only, directories stripped
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let content_type =
        ContentType::parse("application/octet-stream").unwrap_or(ContentType::TEXT_PLAIN);
    Ok(Attachment::new(filename).body(data, content_type))
}
