mod session;

pub use session::{RequestContext, SESSION_TOKEN_HEADER};
