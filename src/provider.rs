//! Known mail providers
//!
//! The scheme of a connection URL selects the provider, which decides the
//! submission server to talk to. Supporting another provider means adding a
//! variant and an entry in [`Provider::ALL`].

use std::fmt::{self, Display, Formatter};

/// A mail provider that can be selected by a connection URL scheme
#[derive(PartialEq, Eq, Copy, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum Provider {
    /// Google mail, `google://`
    Google,
}

impl Provider {
    /// Every supported provider
    pub const ALL: &'static [Provider] = &[Provider::Google];

    /// The connection URL scheme selecting this provider
    pub fn scheme(self) -> &'static str {
        match self {
            Provider::Google => "google",
        }
    }

    /// Hostname of the provider's submission server
    pub fn hostname(self) -> &'static str {
        match self {
            Provider::Google => "smtp.gmail.com",
        }
    }

    /// Looks up the provider for a connection URL scheme
    pub fn from_scheme(scheme: &str) -> Option<Provider> {
        Self::ALL
            .iter()
            .copied()
            .find(|provider| provider.scheme() == scheme)
    }
}

impl Display for Provider {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}
