//! Error and result type for the client

use std::{error::Error as StdError, fmt};

use crate::{response::Code, BoxError};

// Inspired by https://github.com/seanmonstar/reqwest/blob/a8566383168c0ef06c21f38cbc9213af6ff6db31/src/error.rs

/// The Errors that may occur when configuring a client or submitting an email
///
/// Every operation reports the first failing stage only. The lower level cause
/// (an SMTP reply, a network error, a TLS error...) is available through
/// [`std::error::Error::source`].
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: source.map(Into::into),
            }),
        }
    }

    /// Returns true if the connection URL could not be parsed
    pub fn is_parse(&self) -> bool {
        matches!(self.inner.kind, Kind::Parse)
    }

    /// Returns true if the connection URL carries no password
    pub fn is_missing_secret(&self) -> bool {
        matches!(self.inner.kind, Kind::MissingSecret)
    }

    /// Returns true if the connection URL scheme names an unknown provider
    pub fn is_unsupported_provider(&self) -> bool {
        matches!(self.inner.kind, Kind::UnsupportedProvider(_))
    }

    /// The scheme that was rejected, for unsupported provider errors
    pub fn scheme(&self) -> Option<&str> {
        match self.inner.kind {
            Kind::UnsupportedProvider(ref scheme) => Some(scheme),
            _ => None,
        }
    }

    /// Returns true if the envelope was rejected before connecting
    pub fn is_envelope(&self) -> bool {
        matches!(self.inner.kind, Kind::Envelope)
    }

    /// Returns true if the connection to the server could not be established
    pub fn is_connection(&self) -> bool {
        matches!(self.inner.kind, Kind::Connection)
    }

    /// Returns true if the upgrade to TLS failed
    pub fn is_tls(&self) -> bool {
        matches!(self.inner.kind, Kind::Tls)
    }

    /// Returns true if authentication failed
    pub fn is_auth(&self) -> bool {
        matches!(self.inner.kind, Kind::Auth)
    }

    /// Returns true if the server rejected the sender
    pub fn is_sender_rejected(&self) -> bool {
        matches!(self.inner.kind, Kind::SenderRejected)
    }

    /// Returns true if the server rejected a recipient
    pub fn is_recipient_rejected(&self) -> bool {
        matches!(self.inner.kind, Kind::RecipientRejected(_))
    }

    /// The recipient that was rejected, for recipient errors
    pub fn recipient(&self) -> Option<&str> {
        match self.inner.kind {
            Kind::RecipientRejected(ref recipient) => Some(recipient),
            _ => None,
        }
    }

    /// Returns true if opening or writing the message data failed
    pub fn is_data_transfer(&self) -> bool {
        matches!(self.inner.kind, Kind::DataTransfer)
    }

    /// Returns true if the server misbehaved while closing the session
    pub fn is_protocol(&self) -> bool {
        matches!(self.inner.kind, Kind::Protocol)
    }

    /// Returns true if the error is from response
    pub fn is_response(&self) -> bool {
        self.any_kind(|kind| matches!(kind, Kind::Response))
    }

    /// Returns true if the error is from client
    pub fn is_client(&self) -> bool {
        self.any_kind(|kind| matches!(kind, Kind::Client))
    }

    /// Returns true if the error is a transient SMTP error
    pub fn is_transient(&self) -> bool {
        self.any_kind(|kind| matches!(kind, Kind::Transient(_)))
    }

    /// Returns true if the error is a permanent SMTP error
    pub fn is_permanent(&self) -> bool {
        self.any_kind(|kind| matches!(kind, Kind::Permanent(_)))
    }

    /// Returns true if the error is caused by a timeout
    pub fn is_timeout(&self) -> bool {
        let mut source = self.source();

        while let Some(err) = source {
            if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
                return io_err.kind() == std::io::ErrorKind::TimedOut;
            }

            source = err.source();
        }

        false
    }

    /// Returns the status code, if the error was generated from a response.
    ///
    /// Stage errors wrap the reply that caused them, so the whole source
    /// chain is searched.
    pub fn status(&self) -> Option<Code> {
        let mut current = Some(self);

        while let Some(err) = current {
            match err.inner.kind {
                Kind::Transient(code) | Kind::Permanent(code) => return Some(code),
                _ => current = err.inner_source(),
            }
        }

        None
    }

    fn any_kind(&self, f: impl Fn(&Kind) -> bool) -> bool {
        let mut current = Some(self);

        while let Some(err) = current {
            if f(&err.inner.kind) {
                return true;
            }
            current = err.inner_source();
        }

        false
    }

    fn inner_source(&self) -> Option<&Error> {
        self.inner
            .source
            .as_ref()
            .and_then(|source| source.downcast_ref::<Error>())
    }
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// Malformed connection URL
    Parse,
    /// No password in the connection URL
    MissingSecret,
    /// Unknown provider scheme
    UnsupportedProvider(String),
    /// Invalid envelope
    Envelope,
    /// Dialing, greeting or EHLO failed
    Connection,
    /// STARTTLS or the TLS handshake failed
    Tls,
    /// AUTH failed
    Auth,
    /// MAIL FROM rejected
    SenderRejected,
    /// RCPT TO rejected, for the contained recipient
    RecipientRejected(String),
    /// DATA or message content rejected
    DataTransfer,
    /// Unexpected reply while closing the session
    Protocol,
    /// Transient SMTP error, 4xx reply code
    ///
    /// [RFC 5321, section 4.2.1](https://tools.ietf.org/html/rfc5321#section-4.2.1)
    Transient(Code),
    /// Permanent SMTP error, 5xx reply code
    ///
    /// [RFC 5321, section 4.2.1](https://tools.ietf.org/html/rfc5321#section-4.2.1)
    Permanent(Code),
    /// Error parsing a response
    Response,
    /// Internal client error
    Client,
    /// Underlying network i/o error
    Network,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("smtp_submit::Error");

        builder.field("kind", &self.inner.kind);

        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }

        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            Kind::Parse => f.write_str("invalid connection url")?,
            Kind::MissingSecret => f.write_str("password is required")?,
            Kind::UnsupportedProvider(ref scheme) => write!(f, "unknown scheme: {scheme}")?,
            Kind::Envelope => f.write_str("invalid envelope")?,
            Kind::Connection => f.write_str("connection error")?,
            Kind::Tls => f.write_str("tls error")?,
            Kind::Auth => f.write_str("authentication error")?,
            Kind::SenderRejected => f.write_str("sender rejected")?,
            Kind::RecipientRejected(ref recipient) => {
                write!(f, "recipient rejected ({recipient})")?;
            }
            Kind::DataTransfer => f.write_str("data transfer error")?,
            Kind::Protocol => f.write_str("protocol error")?,
            Kind::Response => f.write_str("response error")?,
            Kind::Client => f.write_str("internal client error")?,
            Kind::Network => f.write_str("network error")?,
            Kind::Transient(ref code) => {
                write!(f, "transient error ({code})")?;
            }
            Kind::Permanent(ref code) => {
                write!(f, "permanent error ({code})")?;
            }
        };

        if let Some(ref e) = self.inner.source {
            write!(f, ": {e}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| {
            let r: &(dyn std::error::Error + 'static) = &**e;
            r
        })
    }
}

pub(crate) fn code(c: Code, s: Option<String>) -> Error {
    if c.is_transient() {
        Error::new(Kind::Transient(c), s)
    } else if c.is_permanent() {
        Error::new(Kind::Permanent(c), s)
    } else {
        client("Unknown error code")
    }
}

pub(crate) fn parse<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Parse, Some(e))
}

pub(crate) fn missing_secret() -> Error {
    Error::new(Kind::MissingSecret, None::<BoxError>)
}

pub(crate) fn unsupported_provider(scheme: &str) -> Error {
    Error::new(Kind::UnsupportedProvider(scheme.to_owned()), None::<BoxError>)
}

pub(crate) fn envelope<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Envelope, Some(e))
}

pub(crate) fn connection<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Connection, Some(e))
}

pub(crate) fn tls<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Tls, Some(e))
}

pub(crate) fn auth<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Auth, Some(e))
}

pub(crate) fn sender<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::SenderRejected, Some(e))
}

pub(crate) fn recipient<E: Into<BoxError>>(recipient: &str, e: E) -> Error {
    Error::new(Kind::RecipientRejected(recipient.to_owned()), Some(e))
}

pub(crate) fn data<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::DataTransfer, Some(e))
}

pub(crate) fn protocol<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Protocol, Some(e))
}

pub(crate) fn response<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Response, Some(e))
}

pub(crate) fn client<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Client, Some(e))
}

pub(crate) fn network<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Network, Some(e))
}
