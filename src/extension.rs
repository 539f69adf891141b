//! What the server said about itself in its EHLO reply, and what we say about
//! ourselves

use std::{
    fmt::{self, Display, Formatter},
    net::Ipv4Addr,
};

use crate::{
    authentication::Mechanism,
    error::{self, Error},
    response::Response,
};

/// The name sent with `EHLO`
#[derive(PartialEq, Eq, Clone, Debug)]
#[non_exhaustive]
pub enum ClientId {
    /// A host name
    Domain(String),
    /// An address literal, when the host has no usable name
    Address(Ipv4Addr),
}

impl Default for ClientId {
    /// The local hostname, or `[127.0.0.1]`
    fn default() -> Self {
        #[cfg(feature = "hostname")]
        if let Some(name) = hostname::get().ok().and_then(|name| name.into_string().ok()) {
            return ClientId::Domain(name);
        }
        ClientId::Address(Ipv4Addr::LOCALHOST)
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ClientId::Domain(name) => f.write_str(name),
            ClientId::Address(address) => write!(f, "[{address}]"),
        }
    }
}

/// Server name and the extensions the client makes use of
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct ServerInfo {
    name: String,
    starttls: bool,
    eight_bit_mime: bool,
    smtp_utf8: bool,
    mechanisms: Vec<Mechanism>,
}

impl ServerInfo {
    /// Reads an EHLO reply
    ///
    /// The first line holds the server name, every following line an
    /// extension keyword and its parameters. Unknown keywords are skipped.
    pub fn from_response(response: &Response) -> Result<ServerInfo, Error> {
        let name = response
            .first_word()
            .ok_or_else(|| error::response("EHLO reply without server name"))?;
        let mut info = ServerInfo {
            name: name.to_owned(),
            ..ServerInfo::default()
        };

        for line in response.message().skip(1) {
            let mut words = line.split_whitespace();
            let Some(keyword) = words.next() else {
                continue;
            };

            match keyword.to_ascii_uppercase().as_str() {
                "STARTTLS" => info.starttls = true,
                "8BITMIME" => info.eight_bit_mime = true,
                "SMTPUTF8" => info.smtp_utf8 = true,
                "AUTH" => info.mechanisms.extend(words.filter_map(Mechanism::from_name)),
                _ => {}
            }
        }

        Ok(info)
    }

    /// A HELO reply only carries the server name
    pub fn from_helo_response(response: &Response) -> ServerInfo {
        ServerInfo {
            name: response.first_word().unwrap_or_default().to_owned(),
            ..ServerInfo::default()
        }
    }

    /// The name the server gave
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `STARTTLS`, [RFC 3207](https://tools.ietf.org/html/rfc3207)
    pub fn supports_starttls(&self) -> bool {
        self.starttls
    }

    /// `8BITMIME`, [RFC 6152](https://tools.ietf.org/html/rfc6152)
    pub fn supports_8bitmime(&self) -> bool {
        self.eight_bit_mime
    }

    /// `SMTPUTF8`, [RFC 6531](https://tools.ietf.org/html/rfc6531)
    pub fn supports_smtputf8(&self) -> bool {
        self.smtp_utf8
    }

    /// The first of `mechanisms` the server accepts
    pub fn get_auth_mechanism(&self, mechanisms: &[Mechanism]) -> Option<Mechanism> {
        mechanisms
            .iter()
            .copied()
            .find(|mechanism| self.mechanisms.contains(mechanism))
    }
}

impl Display for ServerInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        let flags = [
            (self.starttls, "STARTTLS"),
            (self.eight_bit_mime, "8BITMIME"),
            (self.smtp_utf8, "SMTPUTF8"),
        ];
        for (_, keyword) in flags.iter().filter(|(supported, _)| *supported) {
            write!(f, " {keyword}")?;
        }
        for mechanism in &self.mechanisms {
            write!(f, " AUTH={mechanism}")?;
        }
        Ok(())
    }
}
