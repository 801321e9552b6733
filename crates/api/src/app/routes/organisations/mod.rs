//! `/{api_version}/organisations` routes.
//!
//! Every handler resolves the version first, then runs the shared pipeline:
//! object id (404) → body schema (422) → instance lookup (404) → versioned handler.

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

use roster_core::{
    CollectionParams, NewOrganisation, Organisation, OrganisationChanges, OrganisationId,
    OrganisationStatus,
};
use roster_infra::{Directory, OrganisationDeletion};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::schema::{Schema, ValidBody, collection_params, single_error};
use crate::app::services::AppServices;
use crate::app::version::{ApiVersion, Resource};
use crate::context::RequestedVersion;

mod v1;
mod v2;

pub use v1::OrganisationsV1;
pub use v2::OrganisationsV2;

pub(crate) const STATUS_NAMES: &[&str] = &["ENABLED", "DISABLED"];

/// Operations served for organisations by one API version.
///
/// Creation, partial update and delete behave the same in every version; the
/// versions differ in accepted fields and in response shapes.
#[async_trait::async_trait]
pub trait OrganisationApi: Send + Sync {
    fn post_schema(&self) -> &'static Schema;

    fn patch_schema(&self) -> &'static Schema;

    async fn list(
        &self,
        directory: &dyn Directory,
        params: &CollectionParams,
    ) -> Result<Value, ApiError>;

    async fn get(
        &self,
        directory: &dyn Directory,
        organisation: Organisation,
    ) -> Result<Value, ApiError>;

    async fn create(&self, directory: &dyn Directory, body: ValidBody) -> Result<Value, ApiError> {
        let organisation = directory.create_organisation(new_organisation(&body)).await?;
        tracing::info!(organisation_id = %organisation.id, "organisation created");
        Ok(dto::organisation_summary(&organisation))
    }

    async fn update(
        &self,
        directory: &dyn Directory,
        organisation: Organisation,
        body: ValidBody,
    ) -> Result<(), ApiError> {
        let changes = organisation_changes(&body)?;
        if changes.is_empty() {
            return Ok(());
        }

        directory
            .update_organisation(organisation.id, changes)
            .await?
            .ok_or(ApiError::NotFound)?;
        tracing::info!(organisation_id = %organisation.id, "organisation updated");
        Ok(())
    }

    async fn delete(&self, directory: &dyn Directory, organisation: Organisation) -> Result<(), ApiError> {
        match directory.delete_organisation(organisation.id).await? {
            OrganisationDeletion::Deleted => {
                tracing::info!(organisation_id = %organisation.id, "organisation deleted");
                Ok(())
            }
            OrganisationDeletion::NotFound => Err(ApiError::NotFound),
            OrganisationDeletion::HasUsers(users) => {
                tracing::warn!(organisation_id = %organisation.id, users, "organisation delete refused");
                Err(ApiError::Conflict(format!(
                    "This Organisation is assigned to {users} user(s). Remove users before delete!"
                )))
            }
        }
    }
}

fn select(version: &RequestedVersion) -> Result<&'static dyn OrganisationApi, ApiError> {
    Ok(match ApiVersion::resolve(version, Resource::Organisations)? {
        ApiVersion::V1 => &OrganisationsV1,
        ApiVersion::V2 => &OrganisationsV2,
    })
}

#[derive(Debug, Deserialize)]
pub struct ItemPath {
    object_id: String,
}

/// Only positive integers can name a row; anything else is simply not found.
fn object_id(raw: &str) -> Result<OrganisationId, ApiError> {
    raw.parse().map_err(|_| ApiError::NotFound)
}

/// A path segment that does not even decode names nothing either.
fn item_id(path: Result<Path<ItemPath>, PathRejection>) -> Result<OrganisationId, ApiError> {
    let Path(path) = path.map_err(|rejection| {
        tracing::debug!(%rejection, "undecodable object id");
        ApiError::NotFound
    })?;
    object_id(&path.object_id)
}

async fn resolve(directory: &dyn Directory, id: OrganisationId) -> Result<Organisation, ApiError> {
    directory.get_organisation(id).await?.ok_or(ApiError::NotFound)
}

fn new_organisation(body: &ValidBody) -> NewOrganisation {
    let mut new = NewOrganisation::named(body.string("name").unwrap_or_default());
    if let Some(enable_user_login) = body.boolean("enable_user_login") {
        new.enable_user_login = enable_user_login;
    }
    new
}

fn organisation_changes(body: &ValidBody) -> Result<OrganisationChanges, ApiError> {
    let status = body
        .string("status")
        .map(|name| OrganisationStatus::from_name(&name))
        .transpose()
        .map_err(|e| ApiError::Validation(single_error("status", e.to_string())))?;

    Ok(OrganisationChanges {
        name: body.string("name"),
        status,
        enable_user_login: body.boolean("enable_user_login"),
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
    let created = api.create(services.directory.as_ref(), body).await?;
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
    let organisation = resolve(directory, id).await?;
    let body = api.get(directory, organisation).await?;
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
    let organisation = resolve(directory, id).await?;
    api.update(directory, organisation, body).await?;
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
    let organisation = resolve(directory, id).await?;
    api.delete(directory, organisation).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
