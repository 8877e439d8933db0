//! Local input validation; failures never reach the provider

use std::sync::LazyLock;

use apppack_core::{EngineError, EngineResult};
use regex::Regex;

static EMAIL_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").ok());

static REPOSITORY_REGEX: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^https://(?P<host>github\.com|bitbucket\.org)/[\w.\-]+/[\w.\-]+?(\.git)?/?$").ok()
});

/// Source hosts the build service can pull from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    GitHub,
    Bitbucket,
}

impl RepositoryType {
    /// Token used by the template and by the build service's credential list
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryType::GitHub => "GITHUB",
            RepositoryType::Bitbucket => "BITBUCKET",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RepositoryType::GitHub => "GitHub",
            RepositoryType::Bitbucket => "Bitbucket",
        }
    }
}

/// Classify a repository URL by host
pub fn repository_type(url: &str) -> EngineResult<RepositoryType> {
    let captures = REPOSITORY_REGEX
        .as_ref()
        .and_then(|re| re.captures(url.trim()))
        .ok_or_else(|| {
            EngineError::user_input(format!(
                "unsupported repository URL '{}': expected https://github.com/<org>/<repo>.git or https://bitbucket.org/<org>/<repo>.git",
                url
            ))
        })?;
    match &captures["host"] {
        "github.com" => Ok(RepositoryType::GitHub),
        _ => Ok(RepositoryType::Bitbucket),
    }
}

pub fn email(address: &str) -> EngineResult<()> {
    if EMAIL_REGEX.as_ref().is_some_and(|re| re.is_match(address)) {
        Ok(())
    } else {
        Err(EngineError::user_input(format!(
            "'{}' is not a valid email address",
            address
        )))
    }
}

pub fn emails(addresses: &[String]) -> EngineResult<()> {
    addresses.iter().try_for_each(|a| email(a))
}
