use axum::body::Bytes;
use serde_json::{Map, Value, json};

use roster_core::{Organisation, OrganisationId, Page, User};

use crate::app::errors::{ApiError, MALFORMED_JSON};

// -------------------------
// Request bodies
// -------------------------

/// Decode a request body. An empty body is treated as `{}`.
pub fn parse_body(bytes: &Bytes) -> Result<Value, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(bytes).map_err(|e| {
        tracing::debug!(error = %e, "request body is not JSON");
        ApiError::MalformedBody(MALFORMED_JSON.to_string())
    })
}

// -------------------------
// Response mapping
// -------------------------

pub fn listing(page: Page<Value>) -> Value {
    json!({
        "total": page.total,
        "data": page.items,
    })
}

/// `{id, name, status_name}`
pub fn organisation_summary(organisation: &Organisation) -> Value {
    json!({
        "id": organisation.id,
        "name": organisation.name,
        "status_name": organisation.status.name(),
    })
}

/// Summary plus `enable_user_login` and the owned users.
pub fn organisation_detail(organisation: &Organisation, users: &[User]) -> Value {
    let mut body = organisation_summary(organisation);
    body["enable_user_login"] = json!(organisation.enable_user_login);
    body["users"] = Value::Array(
        users
            .iter()
            .filter(|u| u.organisation_id == organisation.id)
            .map(user_member)
            .collect(),
    );
    body
}

/// `{id, name, email}`
pub fn user_summary(user: &User) -> Value {
    json!({
        "id": user.id,
        "name": user.display_name(),
        "email": user.email,
    })
}

/// `{id, name, email, state_name}`, as nested under an organisation.
pub fn user_member(user: &User) -> Value {
    let mut body = user_summary(user);
    body["state_name"] = json!(user.state.name());
    body
}

/// Summary plus the owning organisation's name.
pub fn user_with_organisation(user: &User, organisations: &[Organisation]) -> Value {
    let mut body = user_summary(user);
    body["organisation"] = organisations
        .iter()
        .find(|o| o.id == user.organisation_id)
        .map(|o| Value::String(o.name.clone()))
        .unwrap_or(Value::Null);
    body
}

/// Summary, owning organisation's name and `state_name`.
pub fn user_detail(user: &User, organisations: &[Organisation]) -> Value {
    let mut body = user_with_organisation(user, organisations);
    body["state_name"] = json!(user.state.name());
    body
}

/// Distinct owning organisations of `users`, in first-seen order.
pub fn organisation_ids(users: &[User]) -> Vec<OrganisationId> {
    let mut ids = Vec::new();
    for user in users {
        if !ids.contains(&user.organisation_id) {
            ids.push(user.organisation_id);
        }
    }
    ids
}
