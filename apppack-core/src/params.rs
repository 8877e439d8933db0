//! Parameters - Typed parameter records and their provider encoding
//!
//! The IaC service accepts stack parameters as a flat list of named strings.
//! Each resource kind declares a typed record with [`parameter_record!`], which
//! generates a field descriptor table. The codec, the flag binder and the
//! questionnaire all walk that table instead of reflecting over the struct.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single provider-format parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub key: String,
    pub value: String,
}

impl Parameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Look up a raw value in a provider-format parameter list
pub fn find<'a>(params: &'a [Parameter], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|p| p.key == key)
        .map(|p| p.value.as_str())
}

/// Kind of a record field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Bool,
    Int,
    List,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::String => "string",
            FieldKind::Bool => "bool",
            FieldKind::Int => "integer",
            FieldKind::List => "list-of-string",
        };
        write!(f, "{}", name)
    }
}

/// Literal tokens used for a boolean field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoolStyle {
    /// `enabled` / `disabled`
    #[default]
    EnabledDisabled,
    /// `yes` / `no` (e.g. `MultiAZ`)
    YesNo,
}

impl BoolStyle {
    pub fn encode(self, value: bool) -> &'static str {
        match (self, value) {
            (BoolStyle::EnabledDisabled, true) => "enabled",
            (BoolStyle::EnabledDisabled, false) => "disabled",
            (BoolStyle::YesNo, true) => "yes",
            (BoolStyle::YesNo, false) => "no",
        }
    }

    pub fn decode(self, raw: &str) -> Option<bool> {
        match (self, raw) {
            (BoolStyle::EnabledDisabled, "enabled") | (BoolStyle::YesNo, "yes") => Some(true),
            (BoolStyle::EnabledDisabled, "disabled") | (BoolStyle::YesNo, "no") => Some(false),
            _ => None,
        }
    }
}

/// A typed field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    String(String),
    Bool(bool),
    Int(i64),
    List(Vec<String>),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::String(_) => FieldKind::String,
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Int(_) => FieldKind::Int,
            FieldValue::List(_) => FieldKind::List,
        }
    }

    /// Whether the value counts as "unset" for questions and stateful checks
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::String(s) => s.is_empty(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Bool(_) | FieldValue::Int(_) => false,
        }
    }

    /// Encode into the provider's string representation
    pub fn encode(&self, style: BoolStyle) -> String {
        match self {
            FieldValue::String(s) => s.clone(),
            FieldValue::Bool(b) => style.encode(*b).to_string(),
            FieldValue::Int(n) => n.to_string(),
            FieldValue::List(items) => items.join(","),
        }
    }

    /// Parse a provider string into a value of the given kind
    pub fn decode(kind: FieldKind, style: BoolStyle, raw: &str) -> Option<Self> {
        match kind {
            FieldKind::String => Some(FieldValue::String(raw.to_string())),
            FieldKind::Bool => style.decode(raw).map(FieldValue::Bool),
            FieldKind::Int => raw.parse().ok().map(FieldValue::Int),
            FieldKind::List => Some(FieldValue::List(split_list(raw))),
        }
    }
}

/// Split a comma-joined list; the empty string is the empty list
pub fn split_list(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        Vec::new()
    } else {
        raw.split(',').map(|s| s.to_string()).collect()
    }
}

/// Transform applied to a flag value before it lands in the record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagTransform {
    None,
    /// Substitute the raw value for `{}` in the template
    Format(&'static str),
    /// Invert a boolean flag
    Negate,
}

/// Binding between a CLI flag and a record field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagBinding {
    pub flag: &'static str,
    pub transform: FlagTransform,
}

/// Descriptor of one field in a parameter record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Logical name, also the parameter key sent to the provider
    pub key: &'static str,
    pub kind: FieldKind,
    pub bool_style: BoolStyle,
    pub flag: Option<FlagBinding>,
    /// Cannot change once the resource exists
    pub stateful: bool,
    /// Stateful, but may be cleared (never switched) once set
    pub detachable: bool,
}

impl FieldSpec {
    pub fn new(key: &'static str) -> Self {
        Self {
            key,
            kind: FieldKind::String,
            bool_style: BoolStyle::default(),
            flag: None,
            stateful: false,
            detachable: false,
        }
    }

    pub fn of_kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn yes_no(mut self) -> Self {
        self.bool_style = BoolStyle::YesNo;
        self
    }

    pub fn flag(mut self, flag: &'static str) -> Self {
        self.flag = Some(FlagBinding {
            flag,
            transform: FlagTransform::None,
        });
        self
    }

    pub fn flag_format(mut self, flag: &'static str, template: &'static str) -> Self {
        self.flag = Some(FlagBinding {
            flag,
            transform: FlagTransform::Format(template),
        });
        self
    }

    pub fn flag_negate(mut self, flag: &'static str) -> Self {
        self.flag = Some(FlagBinding {
            flag,
            transform: FlagTransform::Negate,
        });
        self
    }

    pub fn stateful(mut self) -> Self {
        self.stateful = true;
        self
    }

    pub fn detachable(mut self) -> Self {
        self.stateful = true;
        self.detachable = true;
        self
    }
}

/// Rust types usable as record fields
pub trait FieldType: Sized {
    const KIND: FieldKind;

    fn to_field(&self) -> FieldValue;

    fn from_field(value: FieldValue) -> Option<Self>;
}

impl FieldType for String {
    const KIND: FieldKind = FieldKind::String;

    fn to_field(&self) -> FieldValue {
        FieldValue::String(self.clone())
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl FieldType for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn to_field(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl FieldType for i64 {
    const KIND: FieldKind = FieldKind::Int;

    fn to_field(&self) -> FieldValue {
        FieldValue::Int(*self)
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Int(n) => Some(n),
            _ => None,
        }
    }
}

impl FieldType for Vec<String> {
    const KIND: FieldKind = FieldKind::List;

    fn to_field(&self) -> FieldValue {
        FieldValue::List(self.clone())
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Errors raised while converting between records and provider parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("parameter {key}: cannot parse '{value}' as {kind}")]
    InvalidValue {
        key: String,
        kind: FieldKind,
        value: String,
    },

    #[error("parameter {key}: expected {expected}, got {got}")]
    TypeMismatch {
        key: String,
        expected: FieldKind,
        got: FieldKind,
    },

    #[error("unknown parameter {0}")]
    UnknownField(String),
}

/// A typed parameter record with a field descriptor table
pub trait ParameterRecord: Default + Clone + PartialEq + fmt::Debug + Send + Sync {
    /// Field descriptors in declaration order
    fn fields() -> Vec<FieldSpec>;

    fn get(&self, key: &str) -> Option<FieldValue>;

    fn set(&mut self, key: &str, value: FieldValue) -> Result<(), CodecError>;

    fn field(key: &str) -> Option<FieldSpec> {
        Self::fields().into_iter().find(|f| f.key == key)
    }
}

/// Declare a parameter record and its descriptor table
///
/// ```ignore
/// parameter_record! {
///     pub struct RedisParameters {
///         name: String => "Name",
///         cluster_stack_name: String => "ClusterStackName"
///             .flag_format("cluster", "apppack-cluster-{}")
///             .stateful(),
///         multi_az: bool => "MultiAZ".yes_no().flag("multi-az"),
///     }
/// }
/// ```
#[macro_export]
macro_rules! parameter_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $field:ident : $ty:ty => $key:literal $( . $modifier:ident ( $($arg:expr),* ) )*
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $name {
            $(
                $(#[$fmeta])*
                pub $field: $ty,
            )*
        }

        impl $crate::params::ParameterRecord for $name {
            fn fields() -> Vec<$crate::params::FieldSpec> {
                vec![
                    $(
                        $crate::params::FieldSpec::new($key)
                            .of_kind(<$ty as $crate::params::FieldType>::KIND)
                            $( .$modifier($($arg),*) )*
                    ),*
                ]
            }

            fn get(&self, key: &str) -> Option<$crate::params::FieldValue> {
                match key {
                    $( $key => Some($crate::params::FieldType::to_field(&self.$field)), )*
                    _ => None,
                }
            }

            fn set(
                &mut self,
                key: &str,
                value: $crate::params::FieldValue,
            ) -> Result<(), $crate::params::CodecError> {
                match key {
                    $(
                        $key => {
                            let got = value.kind();
                            self.$field = <$ty as $crate::params::FieldType>::from_field(value)
                                .ok_or_else(|| $crate::params::CodecError::TypeMismatch {
                                    key: key.to_string(),
                                    expected: <$ty as $crate::params::FieldType>::KIND,
                                    got,
                                })?;
                            Ok(())
                        }
                    )*
                    _ => Err($crate::params::CodecError::UnknownField(key.to_string())),
                }
            }
        }
    };
}

/// Encode every field of a record, in declaration order
pub fn encode<R: ParameterRecord>(record: &R) -> Vec<Parameter> {
    R::fields()
        .into_iter()
        .filter_map(|spec| {
            record
                .get(spec.key)
                .map(|value| Parameter::new(spec.key, value.encode(spec.bool_style)))
        })
        .collect()
}

/// Decode provider parameters into a fresh record
pub fn decode<R: ParameterRecord>(params: &[Parameter]) -> Result<R, CodecError> {
    let mut record = R::default();
    decode_into(&mut record, params)?;
    Ok(record)
}

/// Decode provider parameters over an existing record
///
/// Unknown keys are ignored; fields missing from `params` keep their values.
pub fn decode_into<R: ParameterRecord>(
    record: &mut R,
    params: &[Parameter],
) -> Result<(), CodecError> {
    let specs: HashMap<&str, FieldSpec> = R::fields().into_iter().map(|f| (f.key, f)).collect();

    for param in params {
        let Some(spec) = specs.get(param.key.as_str()) else {
            continue;
        };
        let value = FieldValue::decode(spec.kind, spec.bool_style, &param.value).ok_or_else(|| {
            CodecError::InvalidValue {
                key: param.key.clone(),
                kind: spec.kind,
                value: param.value.clone(),
            }
        })?;
        record.set(spec.key, value)?;
    }

    Ok(())
}

/// Stateful fields whose pending value would change what the existing stack holds
pub fn stateful_violations<R: ParameterRecord>(pending: &R, current: &[Parameter]) -> Vec<&'static str> {
    R::fields()
        .into_iter()
        .filter(|spec| spec.stateful)
        .filter(|spec| {
            let Some(existing) = find(current, spec.key).filter(|v| !v.is_empty()) else {
                return false;
            };
            let Some(value) = pending.get(spec.key) else {
                return false;
            };
            if spec.detachable && value.is_empty() {
                return false;
            }
            value.encode(spec.bool_style) != existing
        })
        .map(|spec| spec.key)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    parameter_record! {
        struct SampleParameters {
            name: String => "Name",
            cluster: String => "ClusterStackName"
                .flag_format("cluster", "apppack-cluster-{}")
                .stateful(),
            database: String => "DatabaseStackName".detachable(),
            bucket: bool => "PrivateS3BucketEnabled".flag("addon-private-s3"),
            multi_az: bool => "MultiAZ".yes_no(),
            priority: i64 => "LoadBalancerRulePriority",
            domains: Vec<String> => "Domains".flag("domains"),
        }
    }

    fn sample() -> SampleParameters {
        SampleParameters {
            name: "myapp".to_string(),
            cluster: "apppack-cluster-apppack".to_string(),
            database: "apppack-database-main".to_string(),
            bucket: true,
            multi_az: false,
            priority: 4242,
            domains: vec!["a.example.com".to_string(), "b.example.com".to_string()],
        }
    }

    #[test]
    fn test_encode_emits_every_field() {
        let params = encode(&sample());
        assert_eq!(params.len(), 7);
        assert_eq!(find(&params, "PrivateS3BucketEnabled"), Some("enabled"));
        assert_eq!(find(&params, "MultiAZ"), Some("no"));
        assert_eq!(find(&params, "LoadBalancerRulePriority"), Some("4242"));
        assert_eq!(find(&params, "Domains"), Some("a.example.com,b.example.com"));
    }

    #[test]
    fn test_empty_list_encodes_as_empty_string() {
        let params = encode(&SampleParameters::default());
        assert_eq!(find(&params, "Domains"), Some(""));
        let decoded: SampleParameters = decode(&params).unwrap();
        assert!(decoded.domains.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let record = sample();
        let decoded: SampleParameters = decode(&encode(&record)).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_decode_ignores_unknown_keys() {
        let params = vec![
            Parameter::new("Name", "x"),
            Parameter::new("SomethingNew", "whatever"),
        ];
        let decoded: SampleParameters = decode(&params).unwrap();
        assert_eq!(decoded.name, "x");
    }

    #[test]
    fn test_decode_rejects_bad_bool_token() {
        let params = vec![Parameter::new("MultiAZ", "enabled")];
        let err = decode::<SampleParameters>(&params).unwrap_err();
        assert_eq!(
            err,
            CodecError::InvalidValue {
                key: "MultiAZ".to_string(),
                kind: FieldKind::Bool,
                value: "enabled".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_rejects_bad_integer() {
        let params = vec![Parameter::new("LoadBalancerRulePriority", "high")];
        assert!(matches!(
            decode::<SampleParameters>(&params),
            Err(CodecError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_set_type_mismatch() {
        let mut record = SampleParameters::default();
        let err = record.set("Name", FieldValue::Bool(true)).unwrap_err();
        assert_eq!(
            err,
            CodecError::TypeMismatch {
                key: "Name".to_string(),
                expected: FieldKind::String,
                got: FieldKind::Bool,
            }
        );
    }

    #[test]
    fn test_field_descriptors() {
        let cluster = SampleParameters::field("ClusterStackName").unwrap();
        assert!(cluster.stateful);
        assert_eq!(
            cluster.flag.unwrap().transform,
            FlagTransform::Format("apppack-cluster-{}")
        );
        let multi_az = SampleParameters::field("MultiAZ").unwrap();
        assert_eq!(multi_az.kind, FieldKind::Bool);
        assert_eq!(multi_az.bool_style, BoolStyle::YesNo);
    }

    #[test]
    fn test_stateful_violations() {
        let current = encode(&sample());

        let mut switched = sample();
        switched.cluster = "apppack-cluster-other".to_string();
        assert_eq!(
            stateful_violations(&switched, &current),
            vec!["ClusterStackName"]
        );

        let mut detached = sample();
        detached.database = String::new();
        assert!(stateful_violations(&detached, &current).is_empty());

        let mut moved = sample();
        moved.database = "apppack-database-other".to_string();
        assert_eq!(
            stateful_violations(&moved, &current),
            vec!["DatabaseStackName"]
        );
    }

    #[test]
    fn test_stateful_field_free_while_empty() {
        let mut empty = sample();
        empty.database = String::new();
        let current = encode(&empty);
        assert!(stateful_violations(&sample(), &current).is_empty());
    }
}
