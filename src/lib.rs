//! Caruso - Audio HLS Packaging Service
//!
//! Hexagonal Architecture:
//! - domain/: Pure types (jobs, HLS segmenting policy)
//! - ports/: Trait definitions (object store, transcoder)
//! - adapters/: Concrete implementations (GCS over HTTP, ffmpeg child process)
//! - application/: Workspace lifecycle and the per-request pipeline
//! - http: Route registration and request/response mapping
//! - config: Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod ports;

// Re-exports for convenience
pub use config::{Config, PublishPolicy};
pub use error::PipelineError;
