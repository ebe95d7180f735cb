//! Concern Points - deterministic transform between location pings and visits
//!
//! Raw location pings ("discreet points") are stored per case. Investigators
//! work with visit intervals ("duration points"). This crate converts between
//! the two representations:
//!
//! - **discreet → duration**: group by case → sort by time → fold contiguous
//!   pings at one location into intervals, tracking the contributing ids
//! - **duration → discreet**: sort → merge overlapping intervals → round to the
//!   quantum → expand onto the 5 minute tick grid
//!
//! Both directions are pure functions of their input. The [`service`] module
//! layers the create/update/fetch flows on top of a [`store::PointStore`].

pub mod config;
pub mod error;
pub mod expander;
pub mod fold;
pub mod grouper;
pub mod merge;
pub mod pipeline;
pub mod quantum;
pub mod service;
pub mod store;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{FieldConflictPolicy, TransformConfig};
pub use error::{ComputeError, StoreError, ValidationError};
pub use pipeline::{discreet_to_duration, duration_to_discreet, PointTransformer};
pub use service::DurationService;
pub use store::{MemoryStore, PointStore};
pub use types::{CaseId, DiscreetPoint, DurationPoint, PointFields, PointId};

/// Library version
pub const POC_VERSION: &str = env!("CARGO_PKG_VERSION");
