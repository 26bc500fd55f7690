//! Ports - trait definitions the application layer depends on.

pub mod storage;
pub mod transcoder;
