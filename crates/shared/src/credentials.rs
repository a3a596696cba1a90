use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CREDENTIAL_ENV_KEY: &str = "GROQ_API_KEY";
pub const DEFAULT_SECRETS_FILE_PATH: &str = ".streamlit/secrets.toml";
pub const UNCONFIGURED_SOURCE_LABEL: &str = "unconfigured";

/// API credential for the completion endpoint. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank values.
    pub fn new(value: impl AsRef<str>) -> Option<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSourceKind {
    Environment,
    SecretsFile,
}

impl CredentialSourceKind {
    pub const fn default_order() -> &'static [CredentialSourceKind] {
        &[Self::Environment, Self::SecretsFile]
    }
}

#[derive(Debug, Error)]
#[error("unknown credential source: {0}")]
pub struct CredentialSourceParseError(String);

impl FromStr for CredentialSourceKind {
    type Err = CredentialSourceParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "env" | "environment" => Ok(Self::Environment),
            "secrets_file" | "secrets" => Ok(Self::SecretsFile),
            _ => Err(CredentialSourceParseError(value.to_string())),
        }
    }
}

/// One named place a credential may come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Environment { key: String },
    SecretsFile { path: PathBuf, key: String },
}

impl CredentialSource {
    pub fn label(&self) -> String {
        match self {
            Self::Environment { key } => format!("env:{key}"),
            Self::SecretsFile { path, .. } => format!("secrets_file:{}", path.display()),
        }
    }

    fn lookup(&self, env_lookup: &dyn Fn(&str) -> Option<String>) -> Option<Credential> {
        match self {
            Self::Environment { key } => env_lookup(key).and_then(Credential::new),
            Self::SecretsFile { path, key } => secrets_file_value(path, key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialResolution {
    pub credential: Option<Credential>,
    pub source: String,
}

impl CredentialResolution {
    pub fn is_configured(&self) -> bool {
        self.credential.is_some()
    }
}

/// Ordered credential lookup. The first source yielding a non-blank value wins.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    sources: Vec<CredentialSource>,
}

impl CredentialResolver {
    pub fn new(sources: Vec<CredentialSource>) -> Self {
        Self { sources }
    }

    pub fn from_order(
        order: &[CredentialSourceKind],
        key: &str,
        secrets_path: impl Into<PathBuf>,
    ) -> Self {
        let secrets_path = secrets_path.into();
        let sources = order
            .iter()
            .map(|kind| match kind {
                CredentialSourceKind::Environment => CredentialSource::Environment {
                    key: key.to_string(),
                },
                CredentialSourceKind::SecretsFile => CredentialSource::SecretsFile {
                    path: secrets_path.clone(),
                    key: key.to_string(),
                },
            })
            .collect();

        Self { sources }
    }

    pub fn sources(&self) -> &[CredentialSource] {
        &self.sources
    }

    pub fn resolve(&self) -> CredentialResolution {
        self.resolve_with(&|key| env::var(key).ok())
    }

    pub fn resolve_with(&self, env_lookup: &dyn Fn(&str) -> Option<String>) -> CredentialResolution {
        for source in &self.sources {
            if let Some(credential) = source.lookup(env_lookup) {
                return CredentialResolution {
                    credential: Some(credential),
                    source: source.label(),
                };
            }
        }

        CredentialResolution {
            credential: None,
            source: UNCONFIGURED_SOURCE_LABEL.to_string(),
        }
    }
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::from_order(
            CredentialSourceKind::default_order(),
            DEFAULT_CREDENTIAL_ENV_KEY,
            DEFAULT_SECRETS_FILE_PATH,
        )
    }
}

fn secrets_file_value(path: &Path, key: &str) -> Option<Credential> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "secrets file unavailable");
            return None;
        }
    };

    let table = match raw.parse::<toml::Table>() {
        Ok(table) => table,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "secrets file is not valid toml");
            return None;
        }
    };

    table
        .get(key)
        .and_then(toml::Value::as_str)
        .and_then(Credential::new)
}
