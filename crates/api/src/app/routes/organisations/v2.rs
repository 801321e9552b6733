use serde_json::Value;

use roster_core::{CollectionParams, Organisation};
use roster_infra::Directory;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::schema::{Field, FieldKind, Schema};

use super::{OrganisationApi, STATUS_NAMES};

static POST: Schema = Schema::new(&[
    Field::required("name", FieldKind::String),
    Field::optional("enable_user_login", FieldKind::Boolean),
]);

static PATCH: Schema = Schema::new(&[
    Field::optional("name", FieldKind::String),
    Field::optional("status", FieldKind::Choice(STATUS_NAMES)),
    Field::optional("enable_user_login", FieldKind::Boolean),
]);

/// v2: lists and details also carry `enable_user_login` and the member users.
#[derive(Debug, Clone, Copy)]
pub struct OrganisationsV2;

#[async_trait::async_trait]
impl OrganisationApi for OrganisationsV2 {
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
        let ids: Vec<_> = page.items.iter().map(|o| o.id).collect();
        let users = directory.users_of_organisations(&ids).await?;

        Ok(dto::listing(page.map(|o| dto::organisation_detail(&o, &users))))
    }

    async fn get(
        &self,
        directory: &dyn Directory,
        organisation: Organisation,
    ) -> Result<Value, ApiError> {
        let users = directory.users_of_organisations(&[organisation.id]).await?;
        Ok(dto::organisation_detail(&organisation, &users))
    }
}
