//! Application - workspace lifecycle and the per-request pipeline.

pub mod pipeline;
pub mod workspace;
