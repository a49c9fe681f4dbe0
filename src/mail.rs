//! SMTP mail sender
//!
//! Plain-text mail with optional file attachments. The body is base64
//! transfer-encoded so non-ASCII text survives any relay.

use lettre::message::header::{ContentTransferEncoding, ContentType};
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{AsyncSmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::Message;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{MessageError, Result};

/// SMTP port that speaks TLS from the first byte; other ports upgrade with
/// STARTTLS when the server offers it
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// Connect and per-command timeout of an SMTP session
const SMTP_TIMEOUT: Duration = Duration::from_secs(60);

const AUTH_MECHANISMS: &[Mechanism] = &[Mechanism::Plain, Mechanism::Login];

/// Split a comma-separated recipient list
///
/// Splitting an empty string yields a single empty recipient, which later
/// fails address parsing; it is not dropped.
pub fn split_recipients(list: &str) -> Vec<String> {
    list.split(',').map(|s| s.trim().to_string()).collect()
}

/// A plain-text mail
#[derive(Debug, Clone, Default)]
pub struct MailMessage {
    pub subject: String,
    /// Display name shown next to the sending account
    pub from_alias: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

impl MailMessage {
    /// Build a mail from comma-separated To and Cc lists
    pub fn new(subject: &str, from_alias: &str, to_list: &str, cc_list: &str, body: &str) -> Self {
        Self {
            subject: subject.to_string(),
            from_alias: from_alias.to_string(),
            to: split_recipients(to_list),
            cc: split_recipients(cc_list),
            body: body.to_string(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.attachments.extend(paths.into_iter().map(Into::into));
        self
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| MessageError::InvalidAddress(format!("{:?}: {}", address, e)))
}

async fn load_attachment(path: &Path) -> Result<SinglePart> {
    let content = fs::read(path).await?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());

    debug!("Attaching {:?} ({} bytes)", path, content.len());
    Ok(Attachment::new(filename).body(content, ContentType::parse("application/octet-stream")?))
}

/// SMTP account used to send mail
#[derive(Clone)]
pub struct Mailer {
    host: String,
    port: u16,
    account: String,
    password: String,
}

impl Mailer {
    pub fn new(host: &str, port: u16, account: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            account: account.to_string(),
            password: password.to_string(),
        }
    }

    /// Send a plain-text mail
    pub async fn send_text(
        &self,
        subject: &str,
        from_alias: &str,
        to: &str,
        cc: &str,
        body: &str,
    ) -> Result<()> {
        self.send(&MailMessage::new(subject, from_alias, to, cc, body))
            .await
    }

    /// Send a plain-text mail with files read from local paths
    pub async fn send_text_with_attachments(
        &self,
        subject: &str,
        from_alias: &str,
        to: &str,
        cc: &str,
        body: &str,
        file_paths: &[PathBuf],
    ) -> Result<()> {
        let mail = MailMessage::new(subject, from_alias, to, cc, body)
            .with_attachments(file_paths.iter().cloned());
        self.send(&mail).await
    }

    /// Build and deliver `mail` in one SMTP session
    pub async fn send(&self, mail: &MailMessage) -> Result<()> {
        let message = self.build_message(mail).await?;

        let mut conn = self.connect().await?;
        if let Err(e) = self.deliver(&mut conn, &message).await {
            conn.abort().await;
            return Err(e);
        }
        conn.quit().await?;

        info!(
            to = ?mail.to,
            subject = %mail.subject,
            attachments = mail.attachments.len(),
            "Mail sent"
        );
        Ok(())
    }

    /// Open a session: implicit TLS on 465, otherwise plain with an
    /// opportunistic STARTTLS upgrade
    async fn connect(&self) -> Result<AsyncSmtpConnection> {
        let hello = ClientId::default();
        let implicit_tls = if self.port == IMPLICIT_TLS_PORT {
            Some(TlsParameters::new(self.host.clone())?)
        } else {
            None
        };

        let mut conn = AsyncSmtpConnection::connect_tokio1(
            (self.host.as_str(), self.port),
            Some(SMTP_TIMEOUT),
            &hello,
            implicit_tls,
            None,
        )
        .await?;

        if conn.can_starttls() {
            debug!("Upgrading SMTP session to {} with STARTTLS", self.host);
            conn.starttls(TlsParameters::new(self.host.clone())?, &hello)
                .await?;
        }
        Ok(conn)
    }

    async fn deliver(&self, conn: &mut AsyncSmtpConnection, message: &Message) -> Result<()> {
        if conn.server_info().get_auth_mechanism(AUTH_MECHANISMS).is_some() {
            let credentials = Credentials::new(self.account.clone(), self.password.clone());
            conn.auth(AUTH_MECHANISMS, &credentials).await?;
        } else {
            debug!("SMTP server {} offers no AUTH, sending unauthenticated", self.host);
        }

        conn.send(message.envelope(), &message.formatted()).await?;
        Ok(())
    }

    /// Assemble the MIME message, reading attachments from disk
    pub async fn build_message(&self, mail: &MailMessage) -> Result<Message> {
        let account = self.account.parse().map_err(|e| {
            MessageError::Mail(format!("invalid sender account {:?}: {}", self.account, e))
        })?;
        let from = Mailbox::new(Some(mail.from_alias.clone()), account);

        let mut builder = Message::builder().from(from).subject(mail.subject.clone());
        for to in &mail.to {
            builder = builder.to(parse_mailbox(to)?);
        }
        for cc in &mail.cc {
            builder = builder.cc(parse_mailbox(cc)?);
        }

        let text = SinglePart::builder()
            .header(ContentType::TEXT_PLAIN)
            .header(ContentTransferEncoding::Base64)
            .body(mail.body.clone());

        let message = if mail.attachments.is_empty() {
            builder.singlepart(text)?
        } else {
            let mut parts = MultiPart::mixed().singlepart(text);
            for path in &mail.attachments {
                parts = parts.singlepart(load_attachment(path).await?);
            }
            builder.multipart(parts)?
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// What a loopback relay saw during one session
    struct Session {
        commands: Vec<String>,
        rcpt_count: usize,
        data: String,
    }

    /// Accept one plain-text SMTP session on 127.0.0.1, answering EHLO with
    /// `extensions` (no STARTTLS unless listed)
    async fn spawn_relay(extensions: &'static [&'static str]) -> (u16, JoinHandle<Session>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();
            let mut session = Session {
                commands: Vec::new(),
                rcpt_count: 0,
                data: String::new(),
            };
            let mut in_data = false;

            write.write_all(b"220 localhost ESMTP\r\n").await.unwrap();
            while let Some(line) = lines.next_line().await.unwrap() {
                if in_data {
                    if line == "." {
                        in_data = false;
                        write.write_all(b"250 2.0.0 queued\r\n").await.unwrap();
                    } else {
                        session.data.push_str(&line);
                        session.data.push('\n');
                    }
                    continue;
                }

                let verb = line.get(..4).unwrap_or_default().to_ascii_uppercase();
                session.commands.push(verb.clone());
                let reply = match verb.as_str() {
                    "EHLO" => {
                        let mut reply = String::from("250-localhost\r\n");
                        for (i, ext) in extensions.iter().enumerate() {
                            let sep = if i + 1 == extensions.len() { ' ' } else { '-' };
                            reply.push_str(&format!("250{}{}\r\n", sep, ext));
                        }
                        if extensions.is_empty() {
                            reply = String::from("250 localhost\r\n");
                        }
                        reply
                    }
                    "AUTH" => "235 2.7.0 accepted\r\n".to_string(),
                    "MAIL" => "250 2.1.0 ok\r\n".to_string(),
                    "RCPT" => {
                        session.rcpt_count += 1;
                        "250 2.1.5 ok\r\n".to_string()
                    }
                    "DATA" => {
                        in_data = true;
                        "354 end with <CRLF>.<CRLF>\r\n".to_string()
                    }
                    "QUIT" => {
                        write.write_all(b"221 2.0.0 bye\r\n").await.unwrap();
                        break;
                    }
                    _ => "502 5.5.2 not implemented\r\n".to_string(),
                };
                write.write_all(reply.as_bytes()).await.unwrap();
            }
            session
        });

        (port, handle)
    }

    fn mailer() -> Mailer {
        Mailer::new("smtp.example.com", 465, "noreply@example.com", "pw")
    }

    fn formatted(message: &Message) -> String {
        String::from_utf8(message.formatted()).unwrap()
    }

    #[test]
    fn test_split_recipients() {
        assert_eq!(split_recipients("a@x.com,b@x.com"), vec!["a@x.com", "b@x.com"]);
        assert_eq!(split_recipients("a@x.com"), vec!["a@x.com"]);
    }

    #[test]
    fn test_split_empty_yields_one_empty_recipient() {
        assert_eq!(split_recipients(""), vec![String::new()]);

        let mail = MailMessage::new("s", "Ops", "a@x.com", "", "body");
        assert_eq!(mail.cc, vec![String::new()]);
    }

    #[tokio::test]
    async fn test_two_to_recipients() {
        let mail = MailMessage::new("Report", "Ops", "a@x.com,b@x.com", "c@x.com", "hi");
        let message = mailer().build_message(&mail).await.unwrap();

        assert_eq!(message.envelope().to().len(), 3);
        let raw = formatted(&message);
        assert!(raw.contains("To: a@x.com, b@x.com"));
        assert!(raw.contains("Cc: c@x.com"));
        assert!(raw.contains("Subject: Report"));
    }

    #[tokio::test]
    async fn test_from_uses_alias() {
        let mail = MailMessage::new("Report", "Ops", "a@x.com", "c@x.com", "hi");
        let message = mailer().build_message(&mail).await.unwrap();
        assert!(formatted(&message).contains("From: Ops <noreply@example.com>"));
    }

    #[tokio::test]
    async fn test_empty_cc_fails_to_build() {
        let mail = MailMessage::new("Report", "Ops", "a@x.com", "", "hi");
        let err = mailer().build_message(&mail).await.unwrap_err();
        assert!(matches!(err, MessageError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn test_no_cc_builds() {
        let mut mail = MailMessage::new("Report", "Ops", "a@x.com", "", "hi");
        mail.cc.clear();
        let message = mailer().build_message(&mail).await.unwrap();
        assert!(!formatted(&message).contains("Cc:"));
    }

    #[tokio::test]
    async fn test_body_is_base64() {
        let mail = MailMessage::new("周报", "Ops", "a@x.com", "c@x.com", "你好，世界");
        let message = mailer().build_message(&mail).await.unwrap();
        let raw = formatted(&message);
        assert!(raw.contains("Content-Transfer-Encoding: base64"));
        assert!(!raw.contains("你好"));
    }

    #[tokio::test]
    async fn test_attachments_are_included() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "id,name").unwrap();

        let mail = MailMessage::new("Report", "Ops", "a@x.com", "c@x.com", "see attached")
            .with_attachments([path]);
        let message = mailer().build_message(&mail).await.unwrap();
        let raw = formatted(&message);
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("report.csv"));
    }

    #[tokio::test]
    async fn test_send_through_relay_without_starttls_or_auth() {
        let (port, relay) = spawn_relay(&["8BITMIME"]).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, "id,name\n").unwrap();

        Mailer::new("127.0.0.1", port, "noreply@example.com", "pw")
            .send_text_with_attachments(
                "Report",
                "Ops",
                "a@x.com,b@x.com",
                "c@x.com",
                "see attached",
                &[path],
            )
            .await
            .unwrap();

        let session = relay.await.unwrap();
        assert_eq!(session.rcpt_count, 3);
        assert!(!session.commands.iter().any(|c| c == "AUTH" || c == "STAR"));
        assert!(session.commands.iter().any(|c| c == "DATA"));
        assert!(session.data.contains("Subject: Report"));
        assert!(session.data.contains("report.csv"));
    }

    #[tokio::test]
    async fn test_send_authenticates_when_offered() {
        let (port, relay) = spawn_relay(&["8BITMIME", "AUTH PLAIN LOGIN"]).await;

        let mut mail = MailMessage::new("Report", "Ops", "a@x.com", "", "hi");
        mail.cc.clear();
        Mailer::new("127.0.0.1", port, "noreply@example.com", "pw")
            .send(&mail)
            .await
            .unwrap();

        let session = relay.await.unwrap();
        assert_eq!(session.commands.first().map(String::as_str), Some("EHLO"));
        assert!(session.commands.iter().any(|c| c == "AUTH"));
        assert_eq!(session.rcpt_count, 1);
    }

    #[tokio::test]
    async fn test_refused_connection_is_mail_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = Mailer::new("127.0.0.1", port, "noreply@example.com", "pw")
            .send_text("Report", "Ops", "a@x.com", "c@x.com", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, MessageError::Mail(_)));
    }

    #[tokio::test]
    async fn test_missing_attachment_is_io_error() {
        let mail = MailMessage::new("Report", "Ops", "a@x.com", "c@x.com", "hi")
            .with_attachments(["/nonexistent/report.csv"]);
        let err = mailer().build_message(&mail).await.unwrap_err();
        assert!(matches!(err, MessageError::Io(_)));
    }
}
