//! Caller identity for org-scoped routes.
//!
//! An upstream authentication layer sets `x-org-id` and `x-user-email`; the
//! role comes from the caller's membership in that organization.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use carecomp_core::org::OrgContext;

pub const ORG_HEADER: &str = "x-org-id";
pub const USER_HEADER: &str = "x-user-email";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Extractor resolving the caller's [`OrgContext`].
pub struct Org(pub OrgContext);

impl FromRequestParts<AppState> for Org {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let org_id = header(&parts.headers, ORG_HEADER);
        let email = header(&parts.headers, USER_HEADER);
        let ctx = state
            .with_db(move |conn| OrgContext::resolve(conn, org_id.as_deref(), email.as_deref()))
            .await?;
        tracing::debug!(org = %ctx.org_id, email = %ctx.email, role = %ctx.role, "org context");
        Ok(Org(ctx))
    }
}
