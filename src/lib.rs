//! Continuous localization engine
//!
//! Source resources are segmented into placeholder-aware translation units
//! (TUs) identified by content-derived GUIDs. TUs are batched into jobs for
//! pluggable translation providers, and accepted translations are folded into
//! a per-language-pair translation memory (TM) from which target resources are
//! generated.
//!
//! # Overview
//!
//! - [`normalize`]: normalized strings, decoders and `_PH{n}_` marker protection
//! - [`tu`]: translation units and the GUID scheme
//! - [`job`], [`store`]: the job model and its append-only persistence
//! - [`tm`]: merging job responses into the TM
//! - [`provider`], [`registry`]: the provider protocol and named constructors
//! - [`leverage`]: repetition grouping and fan-out
//! - [`filter`], [`adapter`]: resource formats and where resources live
//! - [`config`], [`manager`]: wiring everything together
//!
//! # Example
//!
//! ```ignore
//! use l10n_ledger::{Config, Context, Manager, PushOptions};
//!
//! let config = Config::builder("en")
//!     .context(Context::new("."))
//!     .target_langs(&["fr", "de"])
//!     .content_type(content_type)
//!     .provider(provider)
//!     .build()?;
//! let manager = Manager::new(config);
//! manager.push(PushOptions::default()).await?;
//! manager.translate(None, false).await?;
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod filter;
pub mod job;
pub mod lang;
pub mod leverage;
pub mod manager;
pub mod normalize;
pub mod provider;
pub mod registry;
pub mod store;
pub mod tm;
pub mod tu;

pub use config::{Config, ConfigBuilder, ContentType, Context, ProjectConfig};
pub use error::{L10nError, L10nResult};
pub use job::{Driver, JobRequest, JobResponse, JobStatus, Translation};
pub use manager::{Manager, PullOptions, PushOptions};
pub use normalize::{DecoderSet, NormalizedString, Part};
pub use provider::{Capabilities, TranslationProvider};
pub use registry::Registry;
pub use tm::TranslationMemory;
pub use tu::TranslationUnit;
