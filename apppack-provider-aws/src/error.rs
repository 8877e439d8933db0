//! Mapping of SDK failures onto provider errors

use apppack_core::ProviderError;
use apppack_core::provider::ProviderErrorKind;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

/// Wrap an SDK failure, classifying it by service error code
pub(crate) fn sdk_error<E, R>(context: &str, err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let kind = classify(err.code(), err.message());
    ProviderError::new(format!("{}: {}", context, DisplayErrorContext(&err))).with_kind(kind)
}

pub(crate) fn classify(code: Option<&str>, message: Option<&str>) -> ProviderErrorKind {
    let message = message.unwrap_or_default();
    match code.unwrap_or_default() {
        "AlreadyExistsException" | "ParameterAlreadyExists" | "ChangeSetAlreadyExists" => {
            ProviderErrorKind::AlreadyExists
        }
        "ParameterNotFound"
        | "InvalidResourceId"
        | "NoSuchHostedZone"
        | "LoadBalancerNotFound"
        | "DBInstanceNotFound"
        | "DBClusterNotFoundFault"
        | "ChangeSetNotFound" => ProviderErrorKind::NotFound,
        "OperationInProgressException" => ProviderErrorKind::InProgress,
        // CloudFormation reports both conditions as validation errors
        "ValidationError" if message.contains("does not exist") => ProviderErrorKind::NotFound,
        "ValidationError" if message.contains("_IN_PROGRESS state") => {
            ProviderErrorKind::InProgress
        }
        "ValidationError" if message.contains("No updates are to be performed") => {
            ProviderErrorKind::NoChange
        }
        _ => ProviderErrorKind::Other,
    }
}

/// Read a structure member whether the service model marks it required or not
pub(crate) fn member<'a, T: ?Sized + 'a>(value: impl Into<Option<&'a T>>) -> Option<&'a T> {
    value.into()
}

pub(crate) fn text<'a>(value: impl Into<Option<&'a str>>) -> String {
    value.into().unwrap_or_default().to_string()
}

pub(crate) fn flag(value: impl Into<Option<bool>>) -> bool {
    value.into().unwrap_or(false)
}
