//! SASL authentication
//!
//! Only `PLAIN` ([RFC 4616](https://tools.ietf.org/html/rfc4616)) is
//! implemented. It sends identity and secret in a single initial response, so
//! it is only ever used over an encrypted connection.

use std::fmt::{self, Debug, Display, Formatter};

/// Mechanisms used when none are configured
pub const DEFAULT_MECHANISMS: &[Mechanism] = &[Mechanism::Plain];

/// Identity and secret of an account
///
/// The identity is the full sender address, `username@host`.
#[derive(PartialEq, Eq, Clone, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Credentials {
    identity: String,
    secret: String,
}

impl Credentials {
    /// Creates credentials
    pub fn new(identity: String, secret: String) -> Credentials {
        Credentials { identity, secret }
    }

    /// The identity used to authenticate, also the sender address
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The password
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl<S, T> From<(S, T)> for Credentials
where
    S: Into<String>,
    T: Into<String>,
{
    fn from((identity, secret): (S, T)) -> Self {
        Credentials::new(identity.into(), secret.into())
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// A SASL mechanism
#[derive(PartialEq, Eq, Copy, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum Mechanism {
    /// `PLAIN`
    Plain,
}

impl Mechanism {
    /// Name of the mechanism, as advertised after `AUTH` in the EHLO reply
    pub fn name(self) -> &'static str {
        match self {
            Mechanism::Plain => "PLAIN",
        }
    }

    /// Looks up an advertised mechanism, ignoring case
    pub(crate) fn from_name(name: &str) -> Option<Mechanism> {
        match name.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Mechanism::Plain),
            _ => None,
        }
    }

    /// The initial response, before base64 encoding
    ///
    /// For `PLAIN` this is an empty authorization identity, then the
    /// authentication identity and the secret, separated by NUL bytes.
    pub fn initial_response(self, credentials: &Credentials) -> String {
        match self {
            Mechanism::Plain => format!("\0{}\0{}", credentials.identity, credentials.secret),
        }
    }
}

impl Display for Mechanism {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{Credentials, Mechanism};

    #[test]
    fn plain_initial_response() {
        let credentials = Credentials::new("alice@gmail.com".to_owned(), "secret".to_owned());

        assert_eq!(
            Mechanism::Plain.initial_response(&credentials),
            "\u{0}alice@gmail.com\u{0}secret"
        );
    }

    #[test]
    fn mechanism_names() {
        assert_eq!(Mechanism::from_name("PLAIN"), Some(Mechanism::Plain));
        assert_eq!(Mechanism::from_name("plain"), Some(Mechanism::Plain));
        assert_eq!(Mechanism::from_name("LOGIN"), None);
        assert_eq!(Mechanism::Plain.to_string(), "PLAIN");
    }

    #[test]
    fn debug_hides_secret() {
        let credentials = Credentials::from(("alice@gmail.com", "hunter2"));
        let debug = format!("{credentials:?}");

        assert!(debug.contains("alice@gmail.com"));
        assert!(!debug.contains("hunter2"));
    }
}
