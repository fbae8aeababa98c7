//! Text Patcher: idempotent, ordered, fail-soft text patching
//!
//! Reads a text artifact, applies an ordered sequence of match-and-replace
//! steps, and writes it back, such that re-running the same or a later patch
//! set against an already-patched artifact changes nothing.
//!
//! # Architecture
//!
//! Every change compiles down to a single primitive: [`Edit`], a verified
//! byte-span replacement. [`Pattern`]s find spans, [`Guard`]s decide whether
//! a step has already happened, a [`PatchStep`] ties the two together with a
//! replacement, and a [`PatchSet`] runs steps in declared order. An
//! [`ArtifactStore`] loads and saves whole files; the [`Ledger`] remembers
//! which steps were applied where.
//!
//! The engine is purely textual. It has no parser for the languages it
//! patches and makes no claim that the result is well-formed.
//!
//! # Guarantees
//!
//! - A step whose target is missing is reported, never an error
//! - A step whose effect is already present leaves the text unchanged
//! - Edits verify their before-text before splicing
//! - Atomic file writes (tempfile + fsync + rename)
//! - Artifact keys are confined to the project root
//!
//! # Example
//!
//! ```
//! use text_patcher::{Artifact, PatchSet, PatchStep};
//!
//! let set = PatchSet::builder("add-y")
//!     .step(
//!         PatchStep::literal(
//!             "add-y",
//!             "const [x] = useState(1);",
//!             "const [x] = useState(1);\nconst [y] = useState(2);",
//!         )
//!         .unwrap()
//!         .unless_present("const [y]"),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let artifact = Artifact::new("page.tsx", "const [x] = useState(1);");
//! let once = set.run(&artifact, None).unwrap();
//! let twice = set.run(once.output(), None).unwrap();
//! assert_eq!(once.output().text(), twice.output().text());
//! ```

pub mod cache;
pub mod config;
pub mod edit;
pub mod guard;
pub mod ledger;
pub mod pattern;
pub mod runner;
pub mod safety;
pub mod set;
pub mod step;
pub mod store;
pub mod template;

// Re-exports
pub use config::{compile, load_from_path, load_from_str, ConfigError, PatchSetFile, TargetedSet};
pub use edit::{Edit, EditError, EditVerification, Span};
pub use guard::{Guard, GuardContext, SkipReason};
pub use ledger::{Ledger, LedgerEntry, LedgerError, DEFAULT_LEDGER_PATH};
pub use pattern::{NearMiss, Pattern, PatternError};
pub use runner::{Runner, RunnerError, SetRun};
pub use safety::{RootGuard, SafetyError};
pub use set::{BuildError, PatchSet, RunError, RunReport, StepReport};
pub use step::{PatchStep, Scope, StepError, StepOutcome};
pub use store::{Artifact, ArtifactStore, FsStore, MemoryStore, StoreError};
pub use template::{Template, TemplateError};
