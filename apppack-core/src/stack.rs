//! Stack - Provider-side stack model and status vocabulary

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::params::Parameter;

macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)*
            /// A status this build does not know about, kept verbatim
            Unknown(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $text,)*
                    $name::Unknown(s) => s.as_str(),
                }
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(match s {
                    $($text => $name::$variant,)*
                    other => $name::Unknown(other.to_string()),
                })
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                match s.parse() {
                    Ok(status) => status,
                    Err(never) => match never {},
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

status_enum! {
    /// Status of a stack as reported by the IaC service
    StackStatus {
        CreateInProgress => "CREATE_IN_PROGRESS",
        CreateFailed => "CREATE_FAILED",
        CreateComplete => "CREATE_COMPLETE",
        RollbackInProgress => "ROLLBACK_IN_PROGRESS",
        RollbackFailed => "ROLLBACK_FAILED",
        RollbackComplete => "ROLLBACK_COMPLETE",
        DeleteInProgress => "DELETE_IN_PROGRESS",
        DeleteFailed => "DELETE_FAILED",
        DeleteComplete => "DELETE_COMPLETE",
        UpdateInProgress => "UPDATE_IN_PROGRESS",
        UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
        UpdateComplete => "UPDATE_COMPLETE",
        UpdateFailed => "UPDATE_FAILED",
        UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
        UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
        UpdateRollbackCompleteCleanupInProgress => "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS",
        UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
        ReviewInProgress => "REVIEW_IN_PROGRESS",
        ImportInProgress => "IMPORT_IN_PROGRESS",
        ImportComplete => "IMPORT_COMPLETE",
        ImportRollbackInProgress => "IMPORT_ROLLBACK_IN_PROGRESS",
        ImportRollbackFailed => "IMPORT_ROLLBACK_FAILED",
        ImportRollbackComplete => "IMPORT_ROLLBACK_COMPLETE",
    }
}

impl StackStatus {
    /// The driver stops waiting once a stack reaches a terminal status
    pub fn is_terminal(&self) -> bool {
        let s = self.as_str();
        s.ends_with("_COMPLETE") || s.ends_with("_FAILED")
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            StackStatus::CreateComplete
                | StackStatus::UpdateComplete
                | StackStatus::DeleteComplete
                | StackStatus::ImportComplete
        )
    }

    pub fn is_in_progress(&self) -> bool {
        self.as_str().ends_with("_IN_PROGRESS")
    }
}

status_enum! {
    /// Status of a changeset
    ChangeSetStatus {
        CreatePending => "CREATE_PENDING",
        CreateInProgress => "CREATE_IN_PROGRESS",
        CreateComplete => "CREATE_COMPLETE",
        DeletePending => "DELETE_PENDING",
        DeleteInProgress => "DELETE_IN_PROGRESS",
        DeleteComplete => "DELETE_COMPLETE",
        DeleteFailed => "DELETE_FAILED",
        Failed => "FAILED",
    }
}

impl ChangeSetStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(
            self,
            ChangeSetStatus::CreatePending | ChangeSetStatus::CreateInProgress
        )
    }
}

/// IAM capabilities acknowledged on stack mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    Iam,
    NamedIam,
    AutoExpand,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Iam => "CAPABILITY_IAM",
            Capability::NamedIam => "CAPABILITY_NAMED_IAM",
            Capability::AutoExpand => "CAPABILITY_AUTO_EXPAND",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CAPABILITY_IAM" => Some(Capability::Iam),
            "CAPABILITY_NAMED_IAM" => Some(Capability::NamedIam),
            "CAPABILITY_AUTO_EXPAND" => Some(Capability::AutoExpand),
            _ => None,
        }
    }
}

/// A stack as described by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    pub stack_id: String,
    pub stack_name: String,
    pub status: StackStatus,
    pub status_reason: Option<String>,
    pub parameters: Vec<Parameter>,
    pub outputs: Vec<(String, String)>,
    pub tags: Vec<(String, String)>,
    pub capabilities: Vec<Capability>,
}

impl Stack {
    pub fn parameter(&self, key: &str) -> Option<&str> {
        crate::params::find(&self.parameters, key)
    }

    /// An output value; `~` marks an absent addon and reads as `None`
    pub fn output(&self, key: &str) -> Option<&str> {
        self.outputs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| *v != "~" && !v.is_empty())
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Stacks without `apppack=true` are not ours to touch
    pub fn is_owned(&self) -> bool {
        self.tag(crate::kind::OWNERSHIP_TAG) == Some("true")
    }
}

/// A resource inside a stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackResource {
    pub logical_id: String,
    pub status: String,
    pub reason: Option<String>,
}

/// Counts of stack resources by lifecycle bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceProgress {
    pub in_progress: usize,
    pub created: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl ResourceProgress {
    pub fn tally(resources: &[StackResource]) -> Self {
        let mut progress = Self::default();
        for resource in resources {
            let status = resource.status.as_str();
            if status.ends_with("_IN_PROGRESS") {
                progress.in_progress += 1;
            } else if status.ends_with("_FAILED") {
                progress.failed += 1;
            } else if status == "DELETE_COMPLETE" {
                progress.deleted += 1;
            } else if status.ends_with("_COMPLETE") {
                progress.created += 1;
            }
        }
        progress
    }
}

impl fmt::Display for ResourceProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in progress, {} complete, {} deleted, {} failed",
            self.in_progress, self.created, self.deleted, self.failed
        )
    }
}

/// First resource in a failed state, if any
pub fn first_failure(resources: &[StackResource]) -> Option<&StackResource> {
    resources.iter().find(|r| r.status.ends_with("_FAILED"))
}

/// Console link for a stack
pub fn stack_console_url(region: &str, stack_id: &str) -> String {
    format!(
        "https://{region}.console.aws.amazon.com/cloudformation/home?region={region}#/stacks/stackinfo?stackId={}",
        urlencoding::encode(stack_id)
    )
}

/// Console link for a changeset
pub fn change_set_console_url(region: &str, stack_id: &str, change_set_id: &str) -> String {
    format!(
        "https://{region}.console.aws.amazon.com/cloudformation/home?region={region}#/stacks/changesets/changes?stackId={}&changeSetId={}",
        urlencoding::encode(stack_id),
        urlencoding::encode(change_set_id)
    )
}
