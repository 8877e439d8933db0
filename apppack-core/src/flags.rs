//! Flag binding - Copy user-provided CLI flags onto a parameter record

use std::collections::BTreeMap;

use thiserror::Error;

use crate::params::{FieldKind, FieldValue, FlagTransform, ParameterRecord, split_list};

/// A raw flag value as parsed from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagInput {
    Str(String),
    Bool(bool),
    Int(i64),
    List(Vec<String>),
}

impl FlagInput {
    fn describe(&self) -> &'static str {
        match self {
            FlagInput::Str(_) => "string",
            FlagInput::Bool(_) => "bool",
            FlagInput::Int(_) => "integer",
            FlagInput::List(_) => "list",
        }
    }
}

/// Flags the user explicitly provided, keyed by flag name
///
/// Absent flags are simply not present; binding never clobbers record
/// defaults with a flag's default value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagValues {
    values: BTreeMap<String, FlagInput>,
}

impl FlagValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, flag: impl Into<String>, value: FlagInput) {
        self.values.insert(flag.into(), value);
    }

    pub fn with(mut self, flag: impl Into<String>, value: FlagInput) -> Self {
        self.insert(flag, value);
        self
    }

    pub fn with_str(self, flag: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(flag, FlagInput::Str(value.into()))
    }

    pub fn with_bool(self, flag: impl Into<String>, value: bool) -> Self {
        self.with(flag, FlagInput::Bool(value))
    }

    pub fn get(&self, flag: &str) -> Option<&FlagInput> {
        self.values.get(flag)
    }

    pub fn get_str(&self, flag: &str) -> Option<&str> {
        match self.values.get(flag) {
            Some(FlagInput::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_bool(&self, flag: &str) -> Option<bool> {
        match self.values.get(flag) {
            Some(FlagInput::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.values.contains_key(flag)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagError {
    #[error("--{flag}: a {got} flag cannot set {key} ({expected})")]
    TypeMismatch {
        flag: String,
        key: String,
        expected: FieldKind,
        got: &'static str,
    },

    #[error("--{flag}: {message}")]
    InvalidTransform { flag: String, message: String },
}

/// Apply provided flags to `record`, returning the keys that were bound
pub fn bind<R: ParameterRecord>(
    record: &mut R,
    flags: &FlagValues,
) -> Result<Vec<&'static str>, FlagError> {
    let mut bound = Vec::new();

    for spec in R::fields() {
        let Some(binding) = spec.flag.as_ref() else {
            continue;
        };
        let Some(input) = flags.get(binding.flag) else {
            continue;
        };

        let mismatch = || FlagError::TypeMismatch {
            flag: binding.flag.to_string(),
            key: spec.key.to_string(),
            expected: spec.kind,
            got: input.describe(),
        };

        let value = match (&binding.transform, spec.kind, input) {
            (FlagTransform::Negate, FieldKind::Bool, FlagInput::Bool(b)) => FieldValue::Bool(!b),
            (FlagTransform::Negate, _, _) => {
                return Err(FlagError::InvalidTransform {
                    flag: binding.flag.to_string(),
                    message: "negate applies only to boolean flags".to_string(),
                });
            }
            (transform, FieldKind::String, FlagInput::Str(s)) => {
                FieldValue::String(apply_format(transform, s))
            }
            (_, FieldKind::Bool, FlagInput::Bool(b)) => FieldValue::Bool(*b),
            (_, FieldKind::Int, FlagInput::Int(n)) => FieldValue::Int(*n),
            (_, FieldKind::Int, FlagInput::Str(s)) => {
                FieldValue::Int(s.trim().parse().map_err(|_| mismatch())?)
            }
            (transform, FieldKind::List, FlagInput::Str(s)) => FieldValue::List(
                split_list(s)
                    .into_iter()
                    .map(|item| apply_format(transform, item.trim()))
                    .collect(),
            ),
            (transform, FieldKind::List, FlagInput::List(items)) => FieldValue::List(
                items
                    .iter()
                    .map(|item| apply_format(transform, item))
                    .collect(),
            ),
            _ => return Err(mismatch()),
        };

        record.set(spec.key, value).map_err(|_| mismatch())?;
        bound.push(spec.key);
    }

    Ok(bound)
}

/// Substitute the raw value into a format template; empty values stay empty
fn apply_format(transform: &FlagTransform, raw: &str) -> String {
    match transform {
        FlagTransform::Format(template) if !raw.is_empty() => template.replacen("{}", raw, 1),
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter_record;

    parameter_record! {
        struct AppLikeParameters {
            cluster: String => "ClusterStackName"
                .flag_format("cluster", "apppack-cluster-{}")
                .stateful(),
            database: String => "DatabaseStackName"
                .flag_format("addon-database-name", "apppack-database-{}")
                .detachable(),
            branch: String => "Branch".flag("branch"),
            domains: Vec<String> => "Domains".flag("domains"),
            webhook: bool => "BuildWebhook".flag_negate("disable-build-webhook"),
            bucket: bool => "PrivateS3BucketEnabled".flag("addon-private-s3"),
            storage: i64 => "AllocatedStorage".flag("allocated-storage"),
            internal: String => "Internal",
        }
    }

    fn defaults() -> AppLikeParameters {
        AppLikeParameters {
            branch: "main".to_string(),
            webhook: true,
            storage: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_unprovided_flags_keep_defaults() {
        let mut record = defaults();
        let bound = bind(&mut record, &FlagValues::new()).unwrap();
        assert!(bound.is_empty());
        assert_eq!(record, defaults());
    }

    #[test]
    fn test_format_transform() {
        let mut record = defaults();
        let flags = FlagValues::new()
            .with_str("cluster", "apppack")
            .with_str("addon-database-name", "main");
        let bound = bind(&mut record, &flags).unwrap();
        assert_eq!(bound, vec!["ClusterStackName", "DatabaseStackName"]);
        assert_eq!(record.cluster, "apppack-cluster-apppack");
        assert_eq!(record.database, "apppack-database-main");
    }

    #[test]
    fn test_format_skips_empty_value() {
        let mut record = defaults();
        bind(
            &mut record,
            &FlagValues::new().with_str("addon-database-name", ""),
        )
        .unwrap();
        assert_eq!(record.database, "");
    }

    #[test]
    fn test_negate_transform() {
        let mut record = defaults();
        bind(
            &mut record,
            &FlagValues::new().with_bool("disable-build-webhook", true),
        )
        .unwrap();
        assert!(!record.webhook);
    }

    #[test]
    fn test_list_split() {
        let mut record = defaults();
        bind(
            &mut record,
            &FlagValues::new().with_str("domains", "a.example.com, b.example.com"),
        )
        .unwrap();
        assert_eq!(record.domains, vec!["a.example.com", "b.example.com"]);
    }

    #[test]
    fn test_integer_from_string() {
        let mut record = defaults();
        bind(
            &mut record,
            &FlagValues::new().with_str("allocated-storage", "50"),
        )
        .unwrap();
        assert_eq!(record.storage, 50);
    }

    #[test]
    fn test_type_mismatch() {
        let mut record = defaults();
        let err = bind(&mut record, &FlagValues::new().with_bool("branch", true)).unwrap_err();
        assert!(matches!(err, FlagError::TypeMismatch { ref key, .. } if key == "Branch"));
    }

    #[test]
    fn test_bind_is_idempotent() {
        let flags = FlagValues::new()
            .with_str("cluster", "apppack")
            .with_str("domains", "a.example.com")
            .with_bool("disable-build-webhook", true)
            .with_bool("addon-private-s3", true);
        let mut once = defaults();
        bind(&mut once, &flags).unwrap();
        let mut twice = once.clone();
        bind(&mut twice, &flags).unwrap();
        assert_eq!(once, twice);
    }
}
