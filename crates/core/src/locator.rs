//! Locator parsing and scheme normalization
//!
//! Locators follow `[<credential-hint>+]*<transport>://[authority/]path`.
//! The authority of a federation locator is really the first segment of a
//! namespace path, so it is folded back into the path.

use std::fmt;
use std::path::PathBuf;

use url::Url;

use crate::error::{Error, Result};

/// Transport schemes understood by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// `stash://` federation namespace
    Stash,
    /// `osdf://` federation namespace
    Osdf,
    /// `file://` local filesystem
    File,
    /// No scheme at all: a bare path
    Bare,
}

impl Transport {
    /// Parse a transport scheme, returning `None` for anything outside the accepted set
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "stash" => Some(Transport::Stash),
            "osdf" => Some(Transport::Osdf),
            "file" => Some(Transport::File),
            "" => Some(Transport::Bare),
            _ => None,
        }
    }

    /// Whether this transport addresses the federated namespace
    pub fn is_federation(&self) -> bool {
        matches!(self, Transport::Stash | Transport::Osdf)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Stash => "stash",
            Transport::Osdf => "osdf",
            Transport::File => "file",
            Transport::Bare => "",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a compound scheme into `(transport, credential_hint)`
///
/// The transport is always the last `+`-separated piece; everything before it,
/// joined back with `+`, names the credential to use.
pub fn split_scheme(scheme: &str) -> (&str, String) {
    match scheme.rsplit_once('+') {
        Some((hint, transport)) => (transport, hint.to_string()),
        None => (scheme, String::new()),
    }
}

/// A parsed source or destination locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    raw: String,
    transport: Transport,
    credential_hint: String,
    host: Option<String>,
    path: String,
}

impl Locator {
    /// Parse and validate a raw locator string
    ///
    /// Fails with [`Error::UnrecognizedScheme`] when the transport is not one of
    /// `stash`, `osdf`, `file` or empty. No I/O happens here.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::InvalidLocator {
                locator: raw.to_string(),
                message: "locator cannot be empty".to_string(),
            });
        }

        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                return Ok(Self {
                    raw: raw.to_string(),
                    transport: Transport::Bare,
                    credential_hint: String::new(),
                    host: None,
                    path: raw.to_string(),
                });
            }
            Err(e) => {
                return Err(Error::InvalidLocator {
                    locator: raw.to_string(),
                    message: e.to_string(),
                });
            }
        };

        let (transport_scheme, credential_hint) = split_scheme(url.scheme());
        let transport =
            Transport::from_scheme(transport_scheme).ok_or_else(|| Error::UnrecognizedScheme {
                scheme: transport_scheme.to_string(),
                locator: raw.to_string(),
            })?;

        let decoded = urlencoding::decode(url.path())
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| url.path().to_string());

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .map(|h| h.to_string());

        let path = match &host {
            Some(h) => clean_path(&format!("/{h}/{decoded}")),
            None => clean_path(&decoded),
        };

        Ok(Self {
            raw: raw.to_string(),
            transport,
            credential_hint,
            host,
            path,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Credential name embedded in the scheme; empty when absent
    pub fn credential_hint(&self) -> &str {
        &self.credential_hint
    }

    /// Authority component before it was folded into the path
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The path as seen by the namespace layer: always rooted at `/`
    pub fn federation_path(&self) -> String {
        if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        }
    }

    /// The path as a local filesystem location
    pub fn local_path(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }

    /// Last path component, used when the destination is a directory
    pub fn file_name(&self) -> Option<&str> {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Collapse repeated separators and drop a trailing slash, keeping the root
fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let joined = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/");

    if rooted {
        format!("/{joined}")
    } else {
        joined
    }
}
