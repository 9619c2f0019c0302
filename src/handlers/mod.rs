//! HTTP handlers for resource families.

pub mod resource;
pub use resource::*;
