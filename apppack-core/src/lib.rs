//! AppPack Core
//!
//! Stack lifecycle engine shared by every AppPack resource kind: typed
//! parameter records, flag binding, questionnaires, the stack driver and the
//! gateway traits it drives.

pub mod driver;
pub mod error;
pub mod flags;
pub mod kind;
pub mod params;
pub mod protection;
pub mod provider;
pub mod questions;
pub mod stack;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use driver::{
    ChangeSetPreview, CreateRetry, DriverConfig, LogReporter, ProgressReporter, StackDriver,
    UpdateOutcome,
};
pub use error::{EngineError, EngineResult};
pub use flags::{FlagError, FlagInput, FlagValues};
pub use kind::{OWNERSHIP_TAG, Release, StackKind, StackType};
pub use params::{CodecError, Parameter, ParameterRecord};
pub use protection::ProtectedResource;
pub use provider::{Gateway, ProviderError, ProviderResult, TemplateSource};
pub use questions::{Choice, Prompter, Question, Questionnaire, Widget};
pub use stack::{Capability, Stack, StackStatus};
