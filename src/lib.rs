//! # lingo-core
//!
//! Search-result clustering engine: short documents go in, labeled and ranked
//! topic clusters come out.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lingo_core::attributes::AttributeMap;
//! use lingo_core::controller::{Controller, ControllerConfig};
//! use lingo_core::pipeline::DOCUMENTS;
//! use lingo_core::types::RawDocument;
//!
//! let controller = Controller::with_default_algorithms(ControllerConfig::default());
//!
//! let documents = vec![
//!     RawDocument::new("Machine learning basics")
//!         .with_snippet("An introduction to machine learning methods."),
//!     RawDocument::new("Advances in machine learning")
//!         .with_snippet("Machine learning models for computer vision."),
//! ];
//! let mut attributes = AttributeMap::new();
//! attributes.insert(DOCUMENTS, &documents).unwrap();
//!
//! let result = controller.process(None, attributes).unwrap();
//! for cluster in &result.clusters {
//!     println!("{} ({} documents)", cluster.label(), cluster.size());
//! }
//! ```
//!
//! ## Architecture
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`types`] | Documents, document ids, language tags, clusters |
//! | [`attributes`] | Attribute map and per-phase binding of stage inputs/outputs |
//! | [`pipeline`] | Capability-checked chains and the per-request lifecycle |
//! | [`pool`] | Generation-tagged token arena with reuse contract |
//! | [`tokenizer`] | Streaming word tokenizer over a pluggable lexer |
//! | [`language`] | Stop-word lists, language guessing, the detection filter |
//! | [`context`] | Per-request vocabulary and token streams shared by stages |
//! | [`lingo`] | Suffix array phrases, TF-IDF matrix, SVD-based clustering |
//! | [`controller`] | Algorithm registry, pipeline pooling, batch processing |
//! | [`journal`] | Structured lifecycle log with pluggable sinks |
//! | [`error`] | Error types with thiserror |

pub mod attributes;
pub mod context;
pub mod controller;
pub mod error;
pub mod journal;
pub mod language;
pub mod lingo;
pub mod pipeline;
pub mod pool;
pub mod tokenizer;
pub mod types;

pub use error::{LingoError, LingoResult};
pub use types::*;
