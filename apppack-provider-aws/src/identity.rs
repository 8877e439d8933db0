//! Caller identity and the `--account` guard

use apppack_core::{ProviderError, ProviderResult};
use aws_sdk_sts::Client;

use crate::error::{sdk_error, text};

/// Who the loaded credentials belong to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
}

pub(crate) async fn caller_identity(client: &Client) -> ProviderResult<CallerIdentity> {
    let output = client
        .get_caller_identity()
        .send()
        .await
        .map_err(|e| sdk_error("GetCallerIdentity", e))?;
    Ok(CallerIdentity {
        account: text(output.account()),
        arn: text(output.arn()),
    })
}

/// Refuse to continue when the credentials are for a different account
pub fn check_account(identity: &CallerIdentity, expected: &str) -> ProviderResult<()> {
    let expected = expected.trim();
    if expected.is_empty() || identity.account == expected {
        return Ok(());
    }
    if !expected.chars().all(|c| c.is_ascii_digit()) {
        return Err(ProviderError::new(format!(
            "--account {} is not an account id; credentials are for account {}",
            expected, identity.account
        )));
    }
    Err(ProviderError::new(format!(
        "credentials are for account {} ({}), not {}",
        identity.account, identity.arn, expected
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> CallerIdentity {
        CallerIdentity {
            account: "123456789012".to_string(),
            arn: "arn:aws:iam::123456789012:user/ops".to_string(),
        }
    }

    #[test]
    fn test_matching_account() {
        assert!(check_account(&identity(), "123456789012").is_ok());
        assert!(check_account(&identity(), "").is_ok());
    }

    #[test]
    fn test_other_account_rejected() {
        let err = check_account(&identity(), "210987654321").unwrap_err();
        assert!(err.to_string().contains("not 210987654321"));

        let err = check_account(&identity(), "production").unwrap_err();
        assert!(err.to_string().contains("not an account id"));
    }
}
