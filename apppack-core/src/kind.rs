//! Kind - Capability trait specializing the driver for one resource kind

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::error::EngineResult;
use crate::params::{CodecError, Parameter};
use crate::protection::ProtectedResource;
use crate::provider::Gateway;
use crate::stack::{Capability, Stack};

/// Tag carried by every stack the engine creates
pub const OWNERSHIP_TAG: &str = "apppack";

/// Resource kinds, each with a fixed template and name template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StackType {
    Account,
    Region,
    Cluster,
    App,
    Pipeline,
    Database,
    Redis,
    CustomDomain,
    ReviewApp,
}

impl StackType {
    pub const ALL: [StackType; 9] = [
        StackType::Account,
        StackType::Region,
        StackType::Cluster,
        StackType::App,
        StackType::Pipeline,
        StackType::Database,
        StackType::Redis,
        StackType::CustomDomain,
        StackType::ReviewApp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StackType::Account => "account",
            StackType::Region => "region",
            StackType::Cluster => "cluster",
            StackType::App => "app",
            StackType::Pipeline => "pipeline",
            StackType::Database => "database",
            StackType::Redis => "redis",
            StackType::CustomDomain => "custom-domain",
            StackType::ReviewApp => "review-app",
        }
    }

    /// File name of the template artifact
    pub fn template_file(&self) -> String {
        format!("{}.json", self.as_str())
    }

    fn prefix(&self) -> &'static str {
        match self {
            StackType::Account => "apppack-account",
            StackType::Region => "apppack-region-",
            StackType::Cluster => "apppack-cluster-",
            StackType::App => "apppack-app-",
            StackType::Pipeline => "apppack-pipeline-",
            StackType::Database => "apppack-database-",
            StackType::Redis => "apppack-redis-",
            StackType::CustomDomain => "apppack-customdomain-",
            StackType::ReviewApp => "apppack-reviewapp-",
        }
    }

    /// Stack name for a resource of this kind
    ///
    /// Custom domains are slugged (`*.Example.com` becomes
    /// `wildcard-example-com`); review apps take `pipeline:pr`.
    pub fn stack_name(&self, name: &str) -> String {
        match self {
            StackType::Account => self.prefix().to_string(),
            StackType::CustomDomain => format!("{}{}", self.prefix(), domain_slug(name)),
            StackType::ReviewApp => match name.split_once(':') {
                Some((pipeline, pr)) => format!("{}{}{}", self.prefix(), pipeline, pr),
                None => format!("{}{}", self.prefix(), name),
            },
            _ => format!("{}{}", self.prefix(), name),
        }
    }

    /// Inverse of [`StackType::stack_name`] as far as the name template allows
    ///
    /// Custom-domain slugs and review-app names cannot be reversed exactly;
    /// the remainder after the prefix is returned for them.
    pub fn from_stack_name(stack_name: &str) -> Option<(StackType, String)> {
        if stack_name == StackType::Account.prefix() {
            return Some((StackType::Account, String::new()));
        }
        StackType::ALL
            .iter()
            .filter(|t| **t != StackType::Account)
            .find_map(|t| {
                stack_name
                    .strip_prefix(t.prefix())
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (*t, rest.to_string()))
            })
    }
}

impl fmt::Display for StackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StackType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redis" | "cache" => Ok(StackType::Redis),
            other => StackType::ALL
                .iter()
                .find(|t| t.as_str() == other)
                .copied()
                .ok_or_else(|| format!("unknown resource kind '{}'", other)),
        }
    }
}

/// Lowercase, `.` to `-`, `*` to `wildcard`
pub fn domain_slug(domain: &str) -> String {
    domain
        .to_lowercase()
        .replace('.', "-")
        .replace('*', "wildcard")
}

/// Template release channel
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Release {
    #[default]
    Latest,
    Version(String),
}

impl Release {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("latest") => Release::Latest,
            Some(v) => Release::Version(v.to_string()),
        }
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Release::Latest => write!(f, "latest"),
            Release::Version(v) => write!(f, "{}", v),
        }
    }
}

/// Template URL for a kind in a release channel
pub fn template_url(bucket: &str, stack_type: StackType, release: &Release) -> String {
    let url = format!(
        "https://s3.amazonaws.com/{}/latest/{}",
        bucket,
        stack_type.template_file()
    );
    match release {
        Release::Latest => url,
        Release::Version(v) => url.replacen("/latest/", &format!("/{}/", v), 1),
    }
}

/// Per-kind policy consumed by the stack driver
#[async_trait]
pub trait StackKind: Send + Sync {
    fn stack_type(&self) -> StackType;

    /// User-facing name of the resource
    fn name(&self) -> &str;

    fn stack_name(&self) -> String {
        self.stack_type().stack_name(self.name())
    }

    fn template_url(&self, bucket: &str, release: &Release) -> String {
        template_url(bucket, self.stack_type(), release)
    }

    /// Kind-specific tags; the driver adds the ownership tag
    fn tags(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::Iam]
    }

    /// Every parameter, encoded for the provider
    fn parameters(&self) -> Vec<Parameter>;

    /// Replace the record with values read from an existing stack
    fn import_parameters(&mut self, params: &[Parameter]) -> Result<(), CodecError>;

    /// Service role the provider assumes for mutations
    fn role_arn(&self) -> Option<String> {
        None
    }

    fn protected_resource(&self) -> Option<ProtectedResource> {
        None
    }

    /// Whether a DELETE_FAILED stack gets one more delete attempt
    fn retry_failed_delete(&self) -> bool {
        false
    }

    async fn post_create(&self, _gateway: &Gateway, _stack: &Stack) -> EngineResult<()> {
        Ok(())
    }

    async fn pre_delete(&self, _gateway: &Gateway, _stack: &Stack) -> EngineResult<()> {
        Ok(())
    }

    /// Runs after a completed delete, or with `None` when the stack was already gone
    async fn post_delete(&self, _gateway: &Gateway, _stack: Option<&Stack>) -> EngineResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_names() {
        assert_eq!(StackType::Account.stack_name("ignored"), "apppack-account");
        assert_eq!(
            StackType::Region.stack_name("us-east-1"),
            "apppack-region-us-east-1"
        );
        assert_eq!(
            StackType::Cluster.stack_name("apppack"),
            "apppack-cluster-apppack"
        );
        assert_eq!(StackType::App.stack_name("myapp"), "apppack-app-myapp");
        assert_eq!(
            StackType::Pipeline.stack_name("myapp"),
            "apppack-pipeline-myapp"
        );
        assert_eq!(StackType::Redis.stack_name("main"), "apppack-redis-main");
    }

    #[test]
    fn test_custom_domain_slug() {
        assert_eq!(
            StackType::CustomDomain.stack_name("*.Example.com"),
            "apppack-customdomain-wildcard-example-com"
        );
    }

    #[test]
    fn test_review_app_name() {
        assert_eq!(
            StackType::ReviewApp.stack_name("mypipe:42"),
            "apppack-reviewapp-mypipe42"
        );
    }

    #[test]
    fn test_from_stack_name() {
        assert_eq!(
            StackType::from_stack_name("apppack-redis-main"),
            Some((StackType::Redis, "main".to_string()))
        );
        assert_eq!(
            StackType::from_stack_name("apppack-account"),
            Some((StackType::Account, String::new()))
        );
        assert_eq!(StackType::from_stack_name("someone-elses-stack"), None);
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("custom-domain".parse::<StackType>(), Ok(StackType::CustomDomain));
        assert_eq!("cache".parse::<StackType>(), Ok(StackType::Redis));
        assert!("bucket".parse::<StackType>().is_err());
    }

    #[test]
    fn test_template_url_release() {
        assert_eq!(
            template_url("apppack-cloudformations", StackType::App, &Release::Latest),
            "https://s3.amazonaws.com/apppack-cloudformations/latest/app.json"
        );
        assert_eq!(
            template_url(
                "apppack-cloudformations",
                StackType::Database,
                &Release::parse(Some("v4.2.0"))
            ),
            "https://s3.amazonaws.com/apppack-cloudformations/v4.2.0/database.json"
        );
        assert_eq!(Release::parse(Some("latest")), Release::Latest);
    }
}
