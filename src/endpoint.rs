// src/endpoint.rs

//! Realm server endpoints.
//!
//! An endpoint is written as `scheme://authority[/path]`. The scheme picks
//! the bus backend; the authority is handed to it. Paths are accepted and
//! ignored, since realm server URLs are often copied from a browser.

use std::fmt;

use url::Url;

use crate::{PublishError, Result};

/// Port assumed for `http://` endpoints that do not name one.
pub const DEFAULT_REALM_PORT: u16 = 8080;

/// Supported endpoint schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// In-process realm server registered under a name.
    Memory,
    /// Realm server reached over plain TCP.
    Tcp,
    /// Realm server URL; spoken to over the TCP wire protocol.
    Http,
    /// Realm server URL requiring TLS.
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        // ---
        match self {
            Scheme::Memory => "memory",
            Scheme::Tcp => "tcp",
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// A parsed realm server endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    scheme: Scheme,
    authority: String,
    raw: String,
}

impl Endpoint {
    /// Parse an endpoint string.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::InvalidEndpoint`] if the string is not a URL,
    /// uses an unknown scheme, has no host, carries userinfo, or has a port
    /// that is not a number in range.
    ///
    /// # Example
    ///
    /// ```
    /// use realm_publisher::{Endpoint, Scheme};
    ///
    /// let ep = Endpoint::parse("http://localhost:8080/realm").unwrap();
    /// assert_eq!(ep.scheme(), Scheme::Http);
    /// assert_eq!(ep.authority(), "localhost:8080");
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        // ---
        let raw = input.trim();
        let invalid = |why: &str| PublishError::InvalidEndpoint(format!("{why}: {raw:?}"));

        if raw.is_empty() {
            return Err(invalid("endpoint is empty"));
        }

        let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
        let scheme = match url.scheme() {
            "memory" => Scheme::Memory,
            "tcp" => Scheme::Tcp,
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            _ => return Err(invalid("unsupported scheme")),
        };

        // Special schemes drop a port equal to their well-known default, so
        // web URLs are read back under an opaque scheme that keeps it.
        let url = match scheme {
            Scheme::Http | Scheme::Https => {
                let rest = &raw[url.scheme().len()..];
                Url::parse(&format!("realm{rest}")).map_err(|e| invalid(&e.to_string()))?
            }
            Scheme::Memory | Scheme::Tcp => url,
        };

        if !url.username().is_empty() || url.password().is_some() {
            return Err(invalid("credentials belong in the publish configuration"));
        }
        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host,
            _ => return Err(invalid("missing host or realm name")),
        };

        let authority = match (scheme, url.port()) {
            (Scheme::Memory, None) => host.to_owned(),
            (Scheme::Memory, Some(_)) => return Err(invalid("memory realm takes no port")),
            (Scheme::Tcp, None) => return Err(invalid("tcp endpoint needs a port")),
            (_, Some(port)) => format!("{host}:{port}"),
            (Scheme::Http | Scheme::Https, None) => format!("{host}:{DEFAULT_REALM_PORT}"),
        };

        Ok(Self {
            scheme,
            authority,
            raw: raw.to_owned(),
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Host and port for network schemes, realm name for `memory`.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// The endpoint exactly as given (trimmed).
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}


impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for Endpoint {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self> {
        Endpoint::parse(s)
    }
}
