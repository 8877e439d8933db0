//! AppPack Stacks
//!
//! The resource kinds AppPack manages and the verbs that drive them:
//! create, modify, upgrade, destroy and the owned-stack listing.

pub mod kinds;
pub mod net;
pub mod operations;
pub mod pickers;
pub mod secrets;
pub mod session;
pub mod settings;
pub mod validate;
pub mod zones;

pub use kinds::{ExtraFlag, Resource, extra_flags, field_specs, new_resource};
pub use operations::{Outcome, Verb, create, destroy, list_stacks, modify, upgrade};
pub use session::{Context, Session};
pub use settings::Settings;
