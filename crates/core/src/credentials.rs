//! Bearer token discovery
//!
//! Tokens may live in a number of places depending on how the job was
//! launched (WLCG token discovery, HTCondor credential directories, legacy
//! environment variables). The search order is fixed and the first hit wins.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Where a credential was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Explicit token file from configuration or `--token`
    Explicit(PathBuf),
    /// Literal value of `BEARER_TOKEN`
    BearerTokenEnv,
    /// File named by `BEARER_TOKEN_FILE`
    BearerTokenFile(PathBuf),
    /// `$XDG_RUNTIME_DIR/bt_u<uid>`
    RuntimeDir(PathBuf),
    /// `/tmp/bt_u<uid>`
    TempDir(PathBuf),
    /// File named by the legacy `TOKEN` variable
    LegacyTokenFile(PathBuf),
    /// HTCondor credential directory from `_CONDOR_CREDS`
    CondorCreds(PathBuf),
    /// `.condor_creds` relative to the working directory
    LocalCondorCreds(PathBuf),
}

impl CredentialSource {
    /// Path the token was read from, if it came from a file
    pub fn path(&self) -> Option<&Path> {
        match self {
            CredentialSource::BearerTokenEnv => None,
            CredentialSource::Explicit(p)
            | CredentialSource::BearerTokenFile(p)
            | CredentialSource::RuntimeDir(p)
            | CredentialSource::TempDir(p)
            | CredentialSource::LegacyTokenFile(p)
            | CredentialSource::CondorCreds(p)
            | CredentialSource::LocalCondorCreds(p) => Some(p),
        }
    }
}

/// An opaque bearer token and where it came from
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    source: CredentialSource,
}

impl Credential {
    pub fn new(token: impl Into<String>, source: CredentialSource) -> Self {
        Self {
            token: token.into(),
            source,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn source(&self) -> &CredentialSource {
        &self.source
    }
}

// Never print the token itself
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Anything able to produce a credential from a hint
#[cfg_attr(test, mockall::automock)]
pub trait TokenProvider: Send + Sync {
    fn resolve(&self, hint: &str) -> Result<Credential>;
}

/// Process facts consulted during discovery
///
/// Captured once so resolution does not read ambient process state.
#[derive(Debug, Clone, Default)]
pub struct TokenEnvironment {
    vars: HashMap<String, String>,
    uid: Option<u32>,
    temp_dir: PathBuf,
    working_dir: PathBuf,
}

const TOKEN_VARS: &[&str] = &[
    "BEARER_TOKEN",
    "BEARER_TOKEN_FILE",
    "XDG_RUNTIME_DIR",
    "TOKEN",
    "_CONDOR_CREDS",
];

impl TokenEnvironment {
    /// Snapshot the relevant environment of the current process
    pub fn from_process() -> Self {
        let vars = TOKEN_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|v| (name.to_string(), v)))
            .collect();

        Self {
            vars,
            uid: current_uid(),
            temp_dir: PathBuf::from("/tmp"),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Empty environment rooted at the given directories
    pub fn new(temp_dir: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            vars: HashMap::new(),
            uid: None,
            temp_dir: temp_dir.into(),
            working_dir: working_dir.into(),
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(|s| s.as_str())
    }
}

#[cfg(unix)]
fn current_uid() -> Option<u32> {
    // SAFETY: getuid has no preconditions and cannot fail
    Some(unsafe { libc::getuid() })
}

#[cfg(not(unix))]
fn current_uid() -> Option<u32> {
    None
}

#[derive(Deserialize)]
struct TokenJson {
    access_token: String,
}

/// Searches the standard token locations
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    explicit: Option<PathBuf>,
    env: TokenEnvironment,
}

impl CredentialResolver {
    pub fn new(explicit: Option<PathBuf>, env: TokenEnvironment) -> Self {
        Self { explicit, env }
    }

    /// Resolver for the current process
    pub fn from_process(explicit: Option<PathBuf>) -> Self {
        Self::new(explicit, TokenEnvironment::from_process())
    }

    /// Find where the token lives without reading a file token yet
    fn locate(&self, hint: &str) -> Result<Located> {
        if let Some(path) = &self.explicit {
            tracing::debug!(path = %path.display(), "Using token location from configuration");
            return Ok(Located::File(CredentialSource::Explicit(path.clone())));
        }

        if let Some(token) = self.env.var("BEARER_TOKEN") {
            return Ok(Located::Literal(token.to_string()));
        }

        if let Some(file) = self.env.var("BEARER_TOKEN_FILE") {
            let path = PathBuf::from(file);
            if path.exists() {
                return Ok(Located::File(CredentialSource::BearerTokenFile(path)));
            }
            tracing::warn!(
                path = %path.display(),
                "BEARER_TOKEN_FILE is set, but the file it points to does not exist"
            );
        }

        if let Some(uid) = self.env.uid {
            let name = format!("bt_u{uid}");

            if let Some(runtime_dir) = self.env.var("XDG_RUNTIME_DIR") {
                let path = Path::new(runtime_dir).join(&name);
                if path.exists() {
                    return Ok(Located::File(CredentialSource::RuntimeDir(path)));
                }
            }

            let path = self.env.temp_dir.join(&name);
            if path.exists() {
                return Ok(Located::File(CredentialSource::TempDir(path)));
            }
        }

        if let Some(file) = self.env.var("TOKEN") {
            let path = PathBuf::from(file);
            if path.exists() {
                return Ok(Located::File(CredentialSource::LegacyTokenFile(path)));
            }
            tracing::warn!(
                path = %path.display(),
                "TOKEN is set, but the file it points to does not exist"
            );
        }

        let file_name = if hint.is_empty() {
            "scitokens.use".to_string()
        } else {
            format!("{hint}.use")
        };

        if let Some(creds_dir) = self.env.var("_CONDOR_CREDS") {
            let path = Path::new(creds_dir).join(&file_name);
            if path.exists() {
                return Ok(Located::File(CredentialSource::CondorCreds(path)));
            }
            tracing::warn!(
                path = %path.display(),
                "_CONDOR_CREDS is set, but the credential file does not exist"
            );
        }

        let local = self.env.working_dir.join(".condor_creds").join(&file_name);
        if local.exists() {
            return Ok(Located::File(CredentialSource::LocalCondorCreds(local)));
        }

        tracing::error!(hint = hint, "Unable to find token file");
        Err(Error::CredentialNotFound(if hint.is_empty() {
            "no token in any standard location".to_string()
        } else {
            format!("no token named '{hint}' in any standard location")
        }))
    }
}

enum Located {
    Literal(String),
    File(CredentialSource),
}

impl TokenProvider for CredentialResolver {
    fn resolve(&self, hint: &str) -> Result<Credential> {
        let source = match self.locate(hint)? {
            Located::Literal(token) => {
                return Ok(Credential::new(token, CredentialSource::BearerTokenEnv));
            }
            Located::File(source) => source,
        };

        // Every file variant carries a path
        let path = source
            .path()
            .ok_or_else(|| Error::CredentialNotFound("token source has no path".to_string()))?;

        tracing::debug!(path = %path.display(), "Opening token file");
        let contents = std::fs::read_to_string(path).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Error reading token file");
            Error::Io(e)
        })?;

        let token = parse_token(&contents);
        if token.is_empty() {
            return Err(Error::CredentialNotFound(format!(
                "token file {} is empty",
                path.display()
            )));
        }

        Ok(Credential::new(token, source))
    }
}

/// Extract a token from either a JSON token response or a raw token file
pub fn parse_token(contents: &str) -> String {
    match serde_json::from_str::<TokenJson>(contents) {
        Ok(parsed) => parsed.access_token,
        Err(e) => {
            tracing::debug!(error = %e, "Token file is not JSON, treating contents as the token");
            contents.trim().to_string()
        }
    }
}
