use serde_json::Value;

use roster_core::{CollectionParams, Organisation};
use roster_infra::Directory;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::schema::{Field, FieldKind, Schema};

use super::{OrganisationApi, STATUS_NAMES};

static POST: Schema = Schema::new(&[Field::required("name", FieldKind::String)]);

static PATCH: Schema = Schema::new(&[
    Field::optional("name", FieldKind::String),
    Field::optional("status", FieldKind::Choice(STATUS_NAMES)),
]);

/// v1: flat `{id, name, status_name}` everywhere.
#[derive(Debug, Clone, Copy)]
pub struct OrganisationsV1;

#[async_trait::async_trait]
impl OrganisationApi for OrganisationsV1 {
    fn post_schema(&self) -> &'static Schema {
        &POST
    }

    fn patch_schema(&self) -> &'static Schema {
        &PATCH
    }

    async fn list(
        &self,
        directory: &dyn Directory,
        params: &CollectionParams,
    ) -> Result<Value, ApiError> {
        let page = directory.list_organisations(params).await?;
        Ok(dto::listing(page.map(|o| dto::organisation_summary(&o))))
    }

    async fn get(
        &self,
        _directory: &dyn Directory,
        organisation: Organisation,
    ) -> Result<Value, ApiError> {
        Ok(dto::organisation_summary(&organisation))
    }
}
