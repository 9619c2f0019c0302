//! Request-scoped session context from `Authorization: Bearer` or `X-Session-Token`.

use crate::config::Role;
use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

pub const SESSION_TOKEN_HEADER: &str = "X-Session-Token";

/// Outcome of session resolution for one request. Never rejects; handlers decide.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    session: Option<Session>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        RequestContext { session: None }
    }

    pub fn authenticated(session: Session) -> Self {
        RequestContext {
            session: Some(session),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn role(&self) -> Option<Role> {
        self.session.as_ref().map(|s| s.role)
    }

    pub fn subject(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.subject.as_str())
    }

    /// 401 without a session, 403 when the session's role is below `role`.
    pub fn require(&self, role: Role) -> Result<(), AppError> {
        match self.role() {
            None => Err(AppError::Unauthorized("Authentication required".into())),
            Some(have) if have < role => Err(AppError::Forbidden("Insufficient permissions".into())),
            Some(_) => Ok(()),
        }
    }
}

fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim);
    let header = headers
        .get(SESSION_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);
    bearer
        .or(header)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = token_from_headers(&parts.headers) else {
            return Ok(RequestContext::anonymous());
        };
        Ok(RequestContext {
            session: state.sessions.lookup(&token).await,
        })
    }
}
