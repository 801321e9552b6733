use serde_json::Value;

use roster_core::{CollectionParams, User};
use roster_infra::Directory;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::schema::{Field, FieldKind, Schema};

use super::{STATE_NAMES, UserApi};

static POST: Schema = Schema::new(&[
    Field::required("first_name", FieldKind::String),
    Field::required("last_name", FieldKind::String),
    Field::required("email", FieldKind::Email),
    Field::required("organisation_id", FieldKind::Integer),
    Field::optional("state", FieldKind::Choice(STATE_NAMES)),
]);

static PATCH: Schema = Schema::new(&[
    Field::required("first_name", FieldKind::String),
    Field::required("last_name", FieldKind::String),
    Field::optional("email", FieldKind::Email),
    Field::required("organisation_id", FieldKind::Integer),
    Field::optional("state", FieldKind::Choice(STATE_NAMES)),
]);

/// v2: every user shape carries `state_name`; lists also name the organisation.
#[derive(Debug, Clone, Copy)]
pub struct UsersV2;

#[async_trait::async_trait]
impl UserApi for UsersV2 {
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
        let page = directory.list_users(params).await?;
        let organisations = directory
            .organisations_by_ids(&dto::organisation_ids(&page.items))
            .await?;

        Ok(dto::listing(page.map(|u| dto::user_detail(&u, &organisations))))
    }

    fn created(&self, user: &User) -> Value {
        dto::user_member(user)
    }

    async fn get(&self, directory: &dyn Directory, user: User) -> Result<Value, ApiError> {
        let organisation = directory.get_organisation(user.organisation_id).await?;
        Ok(dto::user_detail(&user, organisation.as_slice()))
    }
}
