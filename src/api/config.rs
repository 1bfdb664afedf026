//! Purpose: Explicit connection configuration and project selection inputs.
//! Exports: `ClientConfig`, `ProjectRequest`, env variable names, `parse_env_bool`.
//! Role: Replaces ambient session state; every `Client` is built from one of these values.
//! Invariants: Nothing here reads the process environment unless `from_env` is called.
//! Invariants: Values from an env file never override the lookup it is layered under.
//! Invariants: Forced env use requires every value to come from the environment.
use crate::core::enums::{KechainEnv, ScopeStatus};
use crate::core::error::{Error, ErrorKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const KECHAIN_URL: &str = KechainEnv::Url.as_str();
pub const KECHAIN_TOKEN: &str = KechainEnv::Token.as_str();
pub const KECHAIN_USERNAME: &str = KechainEnv::Username.as_str();
pub const KECHAIN_PASSWORD: &str = KechainEnv::Password.as_str();
pub const KECHAIN_SCOPE: &str = KechainEnv::Scope.as_str();
pub const KECHAIN_SCOPE_ID: &str = KechainEnv::ScopeId.as_str();
pub const KECHAIN_SCOPE_STATUS: &str = KechainEnv::ScopeStatus.as_str();
pub const KECHAIN_CHECK_CERTIFICATES: &str = KechainEnv::CheckCertificates.as_str();
pub const KECHAIN_FORCE_ENV_USE: &str = KechainEnv::ForceEnvUse.as_str();

const INSUFFICIENT_ARGUMENTS: &str = "Error: insufficient arguments to connect to KE-chain";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientConfig {
    pub url: String,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub check_certificates: bool,
    pub ca_file: Option<PathBuf>,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            username: None,
            password: None,
            check_certificates: true,
            ca_file: None,
            user_agent: format!("kechain-rs/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_login(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_check_certificates(mut self, check: bool) -> Self {
        self.check_certificates = check;
        self
    }

    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.token.is_some() || (self.username.is_some() && self.password.is_some())
    }

    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from a variable lookup (process env, a dotenv map, a test fixture).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = non_empty(lookup(KECHAIN_URL)).ok_or_else(|| missing_env(KECHAIN_URL))?;
        let mut config = ClientConfig::new(url);
        config.token = non_empty(lookup(KECHAIN_TOKEN));
        config.username = non_empty(lookup(KECHAIN_USERNAME));
        config.password = non_empty(lookup(KECHAIN_PASSWORD));
        if let Some(raw) = non_empty(lookup(KECHAIN_CHECK_CERTIFICATES)) {
            config.check_certificates = parse_env_bool(&raw);
        }
        Ok(config)
    }
}

/// Inputs of `get_project`: where to connect and which scope to open.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProjectRequest {
    pub url: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub scope: Option<String>,
    pub scope_id: Option<String>,
    pub status: Option<ScopeStatus>,
    pub check_certificates: Option<bool>,
    /// A dotenv file layered under the lookup; variables already set win.
    pub env_filename: Option<PathBuf>,
}

impl ProjectRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the request against an environment lookup.
    ///
    /// When the lookup sets `KECHAIN_FORCE_ENV_USE`, explicit values are
    /// ignored and every required value must come from the environment.
    /// Otherwise explicit values win and the environment only fills gaps
    /// when no explicit url was given.
    pub fn resolve<F>(&self, lookup: F) -> Result<(ClientConfig, ScopeSelector), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_values = match &self.env_filename {
            Some(path) => read_env_file(path)?,
            None => HashMap::new(),
        };
        let env = |key: &str| lookup(key).or_else(|| file_values.get(key).cloned());

        let force_env = env(KECHAIN_FORCE_ENV_USE)
            .map(|raw| parse_env_bool(&raw))
            .unwrap_or(false);

        let request = if force_env {
            Self::from_forced_env(&env)?
        } else if self.url.is_none() && env(KECHAIN_URL).is_some() {
            self.merged_with_env(&env)
        } else {
            self.clone()
        };
        request.into_parts()
    }

    fn from_forced_env<F>(lookup: &F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = non_empty(lookup(KECHAIN_URL)).ok_or_else(|| missing_env(KECHAIN_URL))?;
        let token = non_empty(lookup(KECHAIN_TOKEN));
        let username = non_empty(lookup(KECHAIN_USERNAME));
        let password = non_empty(lookup(KECHAIN_PASSWORD));
        if token.is_none() && (username.is_none() || password.is_none()) {
            return Err(missing_env(KECHAIN_TOKEN));
        }
        let scope = non_empty(lookup(KECHAIN_SCOPE));
        let scope_id = non_empty(lookup(KECHAIN_SCOPE_ID));
        if scope.is_none() && scope_id.is_none() {
            return Err(missing_env(KECHAIN_SCOPE));
        }
        Ok(Self {
            url: Some(url),
            token,
            username,
            password,
            scope,
            scope_id,
            status: non_empty(lookup(KECHAIN_SCOPE_STATUS)).and_then(|raw| ScopeStatus::parse(&raw)),
            check_certificates: non_empty(lookup(KECHAIN_CHECK_CERTIFICATES))
                .map(|raw| parse_env_bool(&raw)),
            env_filename: None,
        })
    }

    fn merged_with_env<F>(&self, lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |explicit: &Option<String>, key: &str| {
            explicit.clone().or_else(|| non_empty(lookup(key)))
        };
        Self {
            url: pick(&self.url, KECHAIN_URL),
            token: pick(&self.token, KECHAIN_TOKEN),
            username: pick(&self.username, KECHAIN_USERNAME),
            password: pick(&self.password, KECHAIN_PASSWORD),
            scope: pick(&self.scope, KECHAIN_SCOPE),
            scope_id: pick(&self.scope_id, KECHAIN_SCOPE_ID),
            status: self.status.or_else(|| {
                non_empty(lookup(KECHAIN_SCOPE_STATUS)).and_then(|raw| ScopeStatus::parse(&raw))
            }),
            check_certificates: self.check_certificates.or_else(|| {
                non_empty(lookup(KECHAIN_CHECK_CERTIFICATES)).map(|raw| parse_env_bool(&raw))
            }),
            env_filename: None,
        }
    }

    fn into_parts(self) -> Result<(ClientConfig, ScopeSelector), Error> {
        let insufficient = || {
            Error::new(ErrorKind::Client)
                .with_message(INSUFFICIENT_ARGUMENTS)
                .with_hint("Provide a url, a token or username/password, and a scope or scope_id.")
        };
        let url = self.url.ok_or_else(insufficient)?;
        let mut config = ClientConfig::new(url);
        config.token = self.token;
        config.username = self.username;
        config.password = self.password;
        if let Some(check) = self.check_certificates {
            config.check_certificates = check;
        }
        if !config.has_credentials() {
            return Err(insufficient());
        }
        let selector = match (self.scope_id, self.scope) {
            (Some(id), _) => ScopeSelector::Id(id),
            (None, Some(name)) => ScopeSelector::Name(name),
            (None, None) => return Err(insufficient()),
        };
        Ok((config, selector.with_status(self.status)))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScopeSelector {
    Id(String),
    Name(String),
    NameWithStatus(String, ScopeStatus),
}

impl ScopeSelector {
    fn with_status(self, status: Option<ScopeStatus>) -> Self {
        match (self, status) {
            (ScopeSelector::Name(name), Some(status)) => ScopeSelector::NameWithStatus(name, status),
            (selector, _) => selector,
        }
    }
}

pub fn parse_env_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "ok" | "yes" | "on"
    )
}

/// Reads `KEY=value` pairs from a dotenv file without touching the process environment.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, Error> {
    let unreadable = |err: dotenvy::Error| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to read env file {}", path.display()))
            .with_hint("Check the env_filename path and its KEY=value lines.")
            .with_source(err)
    };
    dotenvy::from_path_iter(path)
        .map_err(unreadable)?
        .map(|item| item.map_err(unreadable))
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn missing_env(key: &str) -> Error {
    Error::new(ErrorKind::Client).with_message(format!("{key} should be provided as environment variable"))
}
