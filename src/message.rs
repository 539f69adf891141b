//! The message sent by the client
//!
//! A single HTML part with a minimal header block. The rendered form is the
//! exact payload written after `DATA`, before dot-stuffing.

use std::fmt::Write;

use crate::error::{self, Error};

/// Subject, body and recipients of one submission
///
/// Deserializing goes through [`Envelope::new`], so it checks the same things.
#[derive(PartialEq, Eq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "EnvelopeFields"))]
pub struct Envelope {
    subject: String,
    body: String,
    recipients: Vec<String>,
}

impl Envelope {
    /// Creates an envelope
    ///
    /// There must be at least one recipient, and neither the recipients nor
    /// the subject may contain a line break.
    pub fn new<S, B, R>(subject: S, body: B, recipients: R) -> Result<Envelope, Error>
    where
        S: Into<String>,
        B: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        let subject = subject.into();
        let recipients: Vec<String> = recipients.into_iter().map(Into::into).collect();

        if recipients.is_empty() {
            return Err(error::envelope("no recipient"));
        }
        if let Some(recipient) = recipients
            .iter()
            .find(|r| r.is_empty() || has_line_break(r))
        {
            return Err(error::envelope(format!(
                "invalid recipient {}",
                recipient.escape_debug()
            )));
        }
        if has_line_break(&subject) {
            return Err(error::envelope("line break in subject"));
        }

        Ok(Envelope {
            subject,
            body: body.into(),
            recipients,
        })
    }

    /// The subject line
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The HTML body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Recipients, in declaration order
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Renders the message sent on behalf of `from`
    pub fn render(&self, from: &str) -> String {
        let mut message = String::with_capacity(128 + self.subject.len() + self.body.len());

        // Writing to a String cannot fail
        let _ = write!(message, "From: {from}\r\n");
        let _ = write!(message, "To: {}\r\n", self.recipients.join(","));
        let _ = write!(message, "Subject: {}\r\n", self.subject);
        message.push_str("MIME-version: 1.0;\r\n");
        message.push_str("Content-Type: text/html; charset=\"UTF-8\";\r\n");
        message.push_str("\r\n");
        message.push_str(&self.body);

        message
    }
}

/// An envelope as it was serialized, not checked yet
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct EnvelopeFields {
    subject: String,
    body: String,
    recipients: Vec<String>,
}

#[cfg(feature = "serde")]
impl TryFrom<EnvelopeFields> for Envelope {
    type Error = Error;

    fn try_from(fields: EnvelopeFields) -> Result<Self, Self::Error> {
        Envelope::new(fields.subject, fields.body, fields.recipients)
    }
}

pub(crate) fn has_line_break(s: &str) -> bool {
    s.contains(['\r', '\n'])
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::Envelope;

    #[test]
    fn render_two_recipients() {
        let envelope = Envelope::new("S", "B", ["a@x.com", "b@x.com"]).unwrap();

        assert_eq!(
            envelope.render("U"),
            "From: U\r\n\
             To: a@x.com,b@x.com\r\n\
             Subject: S\r\n\
             MIME-version: 1.0;\r\n\
             Content-Type: text/html; charset=\"UTF-8\";\r\n\
             \r\n\
             B"
        );
    }

    #[test]
    fn body_is_kept_verbatim() {
        let body = "<h1>Hello</h1>\r\n.\r\nbye";
        let envelope = Envelope::new("Dynamic HTML Email", body, vec!["kris@example.com"]).unwrap();

        assert!(envelope.render("alice@gmail.com").ends_with("\r\n\r\n<h1>Hello</h1>\r\n.\r\nbye"));
        assert_eq!(envelope.recipients(), ["kris@example.com".to_owned()]);
    }

    #[test]
    fn invalid_envelopes() {
        let none: [&str; 0] = [];
        assert!(Envelope::new("S", "B", none).unwrap_err().is_envelope());
        assert!(Envelope::new("S", "B", ["a@x.com\r\nRCPT TO:<c@x.com>"])
            .unwrap_err()
            .is_envelope());
        assert!(Envelope::new("S", "B", [""]).unwrap_err().is_envelope());
        assert!(Envelope::new("S\r\nBcc: c@x.com", "B", ["a@x.com"])
            .unwrap_err()
            .is_envelope());
    }

    #[test]
    #[cfg(feature = "serde")]
    fn deserialized_envelopes_are_checked() {
        use super::EnvelopeFields;

        let fields = |recipients: &[&str]| EnvelopeFields {
            subject: "S".to_owned(),
            body: "B".to_owned(),
            recipients: recipients.iter().map(|r| (*r).to_owned()).collect(),
        };

        assert!(Envelope::try_from(fields(&[])).unwrap_err().is_envelope());
        assert!(Envelope::try_from(fields(&["a@x.com\r\nRCPT TO:<c@x.com>"]))
            .unwrap_err()
            .is_envelope());
        assert_eq!(
            Envelope::try_from(fields(&["a@x.com"])).unwrap(),
            Envelope::new("S", "B", ["a@x.com"]).unwrap()
        );
    }
}
