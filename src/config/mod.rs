pub mod compile;
pub mod loader;
pub mod schema;

pub use compile::{compile, TargetedSet};
pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{
    GuardDefinition, Metadata, PatchSetFile, PatternDefinition, ReplaceDefinition,
    StepDefinition, ValidationError, ValidationIssue,
};
