//! Domain - pure types with no I/O.

pub mod hls;
pub mod job;
