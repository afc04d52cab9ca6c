use async_trait::async_trait;
use lettre::{
    Transport as _,
    address::{Address, Envelope},
    message::Mailbox,
    transport::smtp::{authentication::Credentials, extension::ClientId},
};
use missive_common::{MailMessage, Session, TlsMode, outgoing};

use crate::{error::TransportError, transport::Transport};

/// SMTP transport backed by `lettre`.
///
/// A connection is opened per message from the batch's [`Session`]. The
/// exchange itself is blocking and runs on the blocking thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpTransport;

impl SmtpTransport {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn connect(session: &Session) -> Result<lettre::SmtpTransport, TransportError> {
        let builder = match session.tls {
            TlsMode::None => lettre::SmtpTransport::builder_dangerous(&session.host),
            TlsMode::StartTls => lettre::SmtpTransport::starttls_relay(&session.host)
                .map_err(|e| TransportError::Build(format!("STARTTLS relay error: {e}")))?,
            TlsMode::Wrapper => lettre::SmtpTransport::relay(&session.host)
                .map_err(|e| TransportError::Build(format!("TLS relay error: {e}")))?,
        };

        let mut builder = builder
            .port(session.port)
            .timeout(Some(session.timeout()));

        if let Some(helo) = &session.helo {
            builder = builder.hello_name(ClientId::Domain(helo.clone()));
        }

        if let Some(credentials) = &session.credentials {
            builder = builder.credentials(Credentials::new(
                credentials.username.clone(),
                credentials.password.clone(),
            ));
        }

        Ok(builder.build())
    }

    fn parse_address(address: &str) -> Result<Address, TransportError> {
        address
            .parse::<Mailbox>()
            .map(|mailbox| mailbox.email)
            .map_err(|e| TransportError::InvalidAddress(format!("{address}: {e}")))
    }

    fn envelope(message: &MailMessage) -> Result<Envelope, TransportError> {
        let from = Self::parse_address(&message.from)?;
        let to = message
            .recipients()
            .map(Self::parse_address)
            .collect::<Result<Vec<_>, _>>()?;

        Envelope::new(Some(from), to).map_err(|e| TransportError::InvalidAddress(e.to_string()))
    }
}

fn classify(error: &lettre::transport::smtp::Error) -> TransportError {
    if error.is_permanent() || error.is_transient() {
        TransportError::Rejected(error.to_string())
    } else {
        TransportError::Connection(error.to_string())
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send(&self, message: &MailMessage, session: &Session) -> Result<(), TransportError> {
        let envelope = Self::envelope(message)?;
        let transport = Self::connect(session)?;
        let raw = message.to_rfc822();

        tokio::task::spawn_blocking(move || transport.send_raw(&envelope, raw.as_bytes()))
            .await
            .map_err(|e| TransportError::Internal(format!("SMTP task failed: {e}")))?
            .map_err(|e| classify(&e))?;

        outgoing!(
            level = DEBUG,
            message_id = %message.id(),
            server = %session.address(),
            "Message accepted"
        );

        Ok(())
    }
}
