//! Repository, validator and cascade deleter over resolved resources.

mod cascade;
mod crud;
pub mod password;
mod validation;

pub use cascade::{CascadeDeleter, CascadeFailure, CascadeOutcome, CascadeState};
pub use crud::{Repository, UpdateOutcome};
pub use validation::{parse_id, sanitize, NewChild, RequestValidator, ValidatedFields};
