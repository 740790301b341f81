//! Script language tokens understood by the execution service.
//!
//! A [`ScriptLanguage`] can only be obtained through a [`LanguageRegistry`]
//! (or the named constructors for built-in tokens), so any value that
//! reaches the builder has already passed the membership test.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// Built-in tokens, as `(display name, wire token)`.
pub const BUILTIN_LANGUAGES: &[(&str, &str)] = &[
    ("Linux_Bash", "bash"),
    ("Windows_Cmd", "cmd"),
    ("DockerCompose", "docker-compose"),
    ("Scalaw", "scalaw"),
    ("Groovy", "groovy"),
    ("Javascript", "javascript"),
    ("Jython", "python"),
    ("Python", "cpython"),
    ("Ruby", "ruby"),
    ("Perl", "perl"),
    ("PowerShell", "powershell"),
    ("R", "R"),
];

/// A validated script language token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ScriptLanguage(String);

impl ScriptLanguage {
    fn builtin(token: &'static str) -> Self {
        Self(token.to_string())
    }

    pub fn bash() -> Self {
        Self::builtin("bash")
    }

    pub fn cmd() -> Self {
        Self::builtin("cmd")
    }

    pub fn docker_compose() -> Self {
        Self::builtin("docker-compose")
    }

    pub fn scalaw() -> Self {
        Self::builtin("scalaw")
    }

    pub fn groovy() -> Self {
        Self::builtin("groovy")
    }

    pub fn javascript() -> Self {
        Self::builtin("javascript")
    }

    /// Jython; the service calls this token `python`.
    pub fn jython() -> Self {
        Self::builtin("python")
    }

    /// CPython; the service calls this token `cpython`.
    pub fn python() -> Self {
        Self::builtin("cpython")
    }

    pub fn ruby() -> Self {
        Self::builtin("ruby")
    }

    pub fn perl() -> Self {
        Self::builtin("perl")
    }

    pub fn powershell() -> Self {
        Self::builtin("powershell")
    }

    pub fn r() -> Self {
        Self::builtin("R")
    }

    /// Validate `token` against the built-in registry.
    pub fn parse(token: &str) -> Result<Self> {
        LanguageRegistry::default().language(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScriptLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ScriptLanguage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// The set of language tokens accepted by this client.
///
/// Starts with [`BUILTIN_LANGUAGES`]; services with extra script engines
/// can `register` more tokens.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    tokens: BTreeSet<String>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self {
            tokens: BUILTIN_LANGUAGES
                .iter()
                .map(|(_, token)| token.to_string())
                .collect(),
        }
    }
}

impl LanguageRegistry {
    /// An empty registry, for services that support only what is registered.
    pub fn empty() -> Self {
        Self {
            tokens: BTreeSet::new(),
        }
    }

    /// Add a token. Returns `false` if it was already present.
    pub fn register(&mut self, token: &str) -> bool {
        self.tokens.insert(token.to_string())
    }

    pub fn is_supported(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    /// Turn `token` into a [`ScriptLanguage`], rejecting unknown tokens.
    pub fn language(&self, token: &str) -> Result<ScriptLanguage> {
        if self.is_supported(token) {
            Ok(ScriptLanguage(token.to_string()))
        } else {
            Err(Error::UnsupportedLanguage(token.to_string()))
        }
    }

    /// Registered tokens in sorted order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }
}
