use serde::{Deserialize, Serialize};

use crate::MessageId;

/// A fully formed outgoing message.
///
/// Composition happens before a message reaches the pipeline; the pipeline
/// only persists, reloads and transmits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    id: MessageId,
    pub from: String,
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    pub subject: String,
    /// Additional headers, rendered in order after the standard ones
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Value of the `X-MailType` header, if any
    #[serde(default)]
    pub mail_type: Option<String>,
    pub body: String,
}

impl MailMessage {
    #[must_use]
    pub fn builder() -> MailMessageBuilder {
        MailMessageBuilder::default()
    }

    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Every envelope recipient: To, Cc and Bcc
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(String::as_str)
    }

    /// Render the message in RFC 5322 form with CRLF line endings.
    ///
    /// Bcc recipients are part of the envelope only and are never rendered.
    #[must_use]
    pub fn to_rfc822(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 256);

        push_header(&mut out, "Message-ID", &format!("<{}@missive>", self.id));
        push_header(&mut out, "From", &self.from);
        if !self.to.is_empty() {
            push_header(&mut out, "To", &self.to.join(", "));
        }
        if !self.cc.is_empty() {
            push_header(&mut out, "Cc", &self.cc.join(", "));
        }
        push_header(&mut out, "Subject", &self.subject);
        if let Some(mail_type) = &self.mail_type {
            push_header(&mut out, "X-MailType", mail_type);
        }
        for (name, value) in &self.headers {
            push_header(&mut out, name, value);
        }
        out.push_str("\r\n");

        for line in self.body.lines() {
            // Dot stuffing is the transport's job, only normalise line endings here
            out.push_str(line);
            out.push_str("\r\n");
        }

        out
    }
}

fn push_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    // Header values must not smuggle in extra header lines
    out.extend(value.chars().filter(|c| *c != '\r' && *c != '\n'));
    out.push_str("\r\n");
}

#[derive(Debug, Default)]
pub struct MailMessageBuilder {
    id: Option<MessageId>,
    from: String,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    subject: String,
    headers: Vec<(String, String)>,
    mail_type: Option<String>,
    body: String,
}

impl MailMessageBuilder {
    /// Use a specific id instead of generating one
    #[must_use]
    pub const fn id(mut self, id: MessageId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    #[must_use]
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to.push(to.into());
        self
    }

    #[must_use]
    pub fn cc(mut self, cc: impl Into<String>) -> Self {
        self.cc.push(cc.into());
        self
    }

    #[must_use]
    pub fn bcc(mut self, bcc: impl Into<String>) -> Self {
        self.bcc.push(bcc.into());
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn mail_type(mut self, mail_type: impl Into<String>) -> Self {
        self.mail_type = Some(mail_type.into());
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn build(self) -> MailMessage {
        MailMessage {
            id: self.id.unwrap_or_else(MessageId::generate),
            from: self.from,
            to: self.to,
            cc: self.cc,
            bcc: self.bcc,
            subject: self.subject,
            headers: self.headers,
            mail_type: self.mail_type,
            body: self.body,
        }
    }
}
