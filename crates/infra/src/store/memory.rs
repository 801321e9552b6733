use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use roster_core::{
    CollectionParams, Listable, NewOrganisation, NewUser, Organisation, OrganisationChanges,
    OrganisationId, Page, User, UserChanges, UserId,
};

use super::{Directory, OrganisationDeletion, StoreError, StoreResult};

/// In-memory directory for tests/dev.
///
/// Ids are handed out from per-table sequences starting at 1 and never reused,
/// like a `BIGSERIAL` column.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    inner: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    organisations: BTreeMap<OrganisationId, Organisation>,
    users: BTreeMap<UserId, User>,
    last_organisation_id: i64,
    last_user_id: i64,
}

impl Tables {
    fn users_owned_by(&self, id: OrganisationId) -> u64 {
        self.users.values().filter(|u| u.organisation_id == id).count() as u64
    }
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Storage("in-memory directory lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Storage("in-memory directory lock poisoned".to_string()))
    }
}

fn list_rows<T: Listable>(rows: impl IntoIterator<Item = T>, params: &CollectionParams) -> Page<T> {
    match T::LISTING.plan(params) {
        Some(plan) => plan.apply(rows),
        None => Page::empty(),
    }
}

#[async_trait::async_trait]
impl Directory for InMemoryDirectory {
    async fn create_organisation(&self, new: NewOrganisation) -> StoreResult<Organisation> {
        let mut tables = self.write()?;
        tables.last_organisation_id += 1;
        let organisation = new.into_organisation(OrganisationId::new(tables.last_organisation_id));
        tables.organisations.insert(organisation.id, organisation.clone());
        Ok(organisation)
    }

    async fn get_organisation(&self, id: OrganisationId) -> StoreResult<Option<Organisation>> {
        Ok(self.read()?.organisations.get(&id).cloned())
    }

    async fn organisations_by_ids(&self, ids: &[OrganisationId]) -> StoreResult<Vec<Organisation>> {
        let tables = self.read()?;
        Ok(tables
            .organisations
            .values()
            .filter(|o| ids.contains(&o.id))
            .cloned()
            .collect())
    }

    async fn list_organisations(&self, params: &CollectionParams) -> StoreResult<Page<Organisation>> {
        let tables = self.read()?;
        Ok(list_rows(tables.organisations.values().cloned(), params))
    }

    async fn update_organisation(
        &self,
        id: OrganisationId,
        changes: OrganisationChanges,
    ) -> StoreResult<Option<Organisation>> {
        let mut tables = self.write()?;
        Ok(tables.organisations.get_mut(&id).map(|organisation| {
            changes.apply_to(organisation);
            organisation.clone()
        }))
    }

    async fn delete_organisation(&self, id: OrganisationId) -> StoreResult<OrganisationDeletion> {
        let mut tables = self.write()?;
        if !tables.organisations.contains_key(&id) {
            return Ok(OrganisationDeletion::NotFound);
        }

        let users = tables.users_owned_by(id);
        if users > 0 {
            return Ok(OrganisationDeletion::HasUsers(users));
        }

        tables.organisations.remove(&id);
        Ok(OrganisationDeletion::Deleted)
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut tables = self.write()?;
        if !tables.organisations.contains_key(&new.organisation_id) {
            return Err(StoreError::MissingOrganisation(new.organisation_id));
        }

        tables.last_user_id += 1;
        let user = new.into_user(UserId::new(tables.last_user_id));
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn list_users(&self, params: &CollectionParams) -> StoreResult<Page<User>> {
        let tables = self.read()?;
        Ok(list_rows(tables.users.values().cloned(), params))
    }

    async fn users_of_organisations(&self, ids: &[OrganisationId]) -> StoreResult<Vec<User>> {
        let tables = self.read()?;
        Ok(tables
            .users
            .values()
            .filter(|u| ids.contains(&u.organisation_id))
            .cloned()
            .collect())
    }

    async fn update_user(&self, id: UserId, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut tables = self.write()?;
        if let Some(organisation_id) = changes.organisation_id {
            if !tables.organisations.contains_key(&organisation_id) {
                return Err(StoreError::MissingOrganisation(organisation_id));
            }
        }

        Ok(tables.users.get_mut(&id).map(|user| {
            changes.apply_to(user);
            user.clone()
        }))
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<bool> {
        Ok(self.write()?.users.remove(&id).is_some())
    }
}
