//! Command implementations

pub mod agent;
pub mod scale;
pub mod version;
