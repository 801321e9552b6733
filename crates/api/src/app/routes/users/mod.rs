//! `/{api_version}/users` routes.
//!
//! Same pipeline as organisations, plus a reference check: bodies naming an
//! `organisation_id` are rejected (422) unless that organisation exists, before
//! the user itself is looked up.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Path, Query, rejection::PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::Value;

use roster_core::{CollectionParams, NewUser, OrganisationId, User, UserChanges, UserId, UserState};
use roster_infra::Directory;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::schema::{Schema, ValidBody, collection_params, single_error};
use crate::app::services::AppServices;
use crate::app::version::{ApiVersion, Resource};
use crate::context::RequestedVersion;

mod v1;
mod v2;

pub use v1::UsersV1;
pub use v2::UsersV2;

pub(crate) const STATE_NAMES: &[&str] = &["ENABLED", "DISABLED"];

/// Operations served for users by one API version.
#[async_trait::async_trait]
pub trait UserApi: Send + Sync {
    fn post_schema(&self) -> &'static Schema;

    fn patch_schema(&self) -> &'static Schema;

    async fn list(
        &self,
        directory: &dyn Directory,
        params: &CollectionParams,
    ) -> Result<Value, ApiError>;

    /// Response body for a freshly created user.
    fn created(&self, user: &User) -> Value;

    async fn get(&self, directory: &dyn Directory, user: User) -> Result<Value, ApiError>;

    async fn create(&self, directory: &dyn Directory, body: ValidBody) -> Result<Value, ApiError> {
        let user = directory.create_user(new_user(&body)?).await?;
        tracing::info!(user_id = %user.id, organisation_id = %user.organisation_id, "user created");
        Ok(self.created(&user))
    }

    async fn update(
        &self,
        directory: &dyn Directory,
        user: User,
        body: ValidBody,
    ) -> Result<(), ApiError> {
        let changes = user_changes(&body)?;
        if changes.is_empty() {
            return Ok(());
        }

        directory
            .update_user(user.id, changes)
            .await?
            .ok_or(ApiError::NotFound)?;
        tracing::info!(user_id = %user.id, "user updated");
        Ok(())
    }

    async fn delete(&self, directory: &dyn Directory, user: User) -> Result<(), ApiError> {
        if !directory.delete_user(user.id).await? {
            return Err(ApiError::NotFound);
        }
        tracing::info!(user_id = %user.id, "user deleted");
        Ok(())
    }
}

fn select(version: &RequestedVersion) -> Result<&'static dyn UserApi, ApiError> {
    Ok(match ApiVersion::resolve(version, Resource::Users)? {
        ApiVersion::V1 => &UsersV1,
        ApiVersion::V2 => &UsersV2,
    })
}

#[derive(Debug, Deserialize)]
pub struct ItemPath {
    object_id: String,
}

fn object_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse().map_err(|_| ApiError::NotFound)
}

/// A path segment that does not even decode names nothing either.
fn item_id(path: Result<Path<ItemPath>, PathRejection>) -> Result<UserId, ApiError> {
    let Path(path) = path.map_err(|rejection| {
        tracing::debug!(%rejection, "undecodable object id");
        ApiError::NotFound
    })?;
    object_id(&path.object_id)
}

async fn resolve(directory: &dyn Directory, id: UserId) -> Result<User, ApiError> {
    directory.get_user(id).await?.ok_or(ApiError::NotFound)
}

/// Reject a body whose `organisation_id` names no existing organisation.
async fn check_organisation_reference(
    directory: &dyn Directory,
    body: &ValidBody,
) -> Result<(), ApiError> {
    let Some(raw) = body.integer("organisation_id") else {
        return Ok(());
    };

    let id = OrganisationId::new(raw);
    if directory.organisation_exists(id).await? {
        Ok(())
    } else {
        tracing::warn!(organisation_id = raw, "user references missing organisation");
        Err(ApiError::missing_organisation(id))
    }
}

fn state(body: &ValidBody) -> Result<Option<UserState>, ApiError> {
    body.string("state")
        .map(|name| UserState::from_name(&name))
        .transpose()
        .map_err(|e| ApiError::Validation(single_error("state", e.to_string())))
}

fn new_user(body: &ValidBody) -> Result<NewUser, ApiError> {
    Ok(NewUser {
        first_name: body.string("first_name").unwrap_or_default(),
        last_name: body.string("last_name").unwrap_or_default(),
        email: body.string("email").unwrap_or_default(),
        organisation_id: OrganisationId::new(body.integer("organisation_id").unwrap_or_default()),
        state: state(body)?.unwrap_or_default(),
    })
}

fn user_changes(body: &ValidBody) -> Result<UserChanges, ApiError> {
    Ok(UserChanges {
        first_name: body.string("first_name"),
        last_name: body.string("last_name"),
        email: body.string("email"),
        organisation_id: body.integer("organisation_id").map(OrganisationId::new),
        state: state(body)?,
    })
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(version): Extension<RequestedVersion>,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let api = select(&version)?;
    let params = collection_params(&query)?;
    let body = api.list(services.directory.as_ref(), &params).await?;
    Ok((StatusCode::OK, Json(body)).into_response())
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(version): Extension<RequestedVersion>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let api = select(&version)?;
    let body = api.post_schema().validate(dto::parse_body(&body)?)?;
    let directory = services.directory.as_ref();
    check_organisation_reference(directory, &body).await?;
    let created = api.create(directory, body).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn fetch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(version): Extension<RequestedVersion>,
    path: Result<Path<ItemPath>, PathRejection>,
) -> Result<Response, ApiError> {
    let api = select(&version)?;
    let id = item_id(path)?;
    let directory = services.directory.as_ref();
    let user = resolve(directory, id).await?;
    let body = api.get(directory, user).await?;
    Ok((StatusCode::OK, Json(body)).into_response())
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(version): Extension<RequestedVersion>,
    path: Result<Path<ItemPath>, PathRejection>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let api = select(&version)?;
    let id = item_id(path)?;
    let body = api.patch_schema().validate(dto::parse_body(&body)?)?;
    let directory = services.directory.as_ref();
    check_organisation_reference(directory, &body).await?;
    let user = resolve(directory, id).await?;
    api.update(directory, user, body).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn remove(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(version): Extension<RequestedVersion>,
    path: Result<Path<ItemPath>, PathRejection>,
) -> Result<Response, ApiError> {
    let api = select(&version)?;
    let id = item_id(path)?;
    let directory = services.directory.as_ref();
    let user = resolve(directory, id).await?;
    api.delete(directory, user).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
