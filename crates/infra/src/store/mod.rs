//! Persistence boundary for the directory (organisations + users).
//!
//! The API layer only talks to [`Directory`]. Two implementations exist:
//! - [`InMemoryDirectory`]: process-local tables for tests/dev.
//! - [`PostgresDirectory`]: `sqlx` over a Postgres pool.
//!
//! Every method is atomic on its own. Operations that read before they write
//! (delete with the dependent-user check, partial updates) run inside a single
//! transaction (Postgres) or under a single write lock (in-memory).

use roster_core::{
    CollectionParams, NewOrganisation, NewUser, Organisation, OrganisationChanges, OrganisationId,
    Page, User, UserChanges, UserId,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryDirectory;
pub use postgres::PostgresDirectory;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A user referenced an organisation that does not exist.
    #[error("organisation {0} does not exist")]
    MissingOrganisation(OrganisationId),
    /// A persisted row could not be mapped back into the domain.
    #[error("corrupt row: {0}")]
    CorruptRow(String),
    /// The backing store failed (connection, SQL, poisoned lock, ...).
    #[error("storage error: {0}")]
    Storage(String),
}

/// Outcome of an organisation delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganisationDeletion {
    Deleted,
    NotFound,
    /// Refused: the organisation still owns this many users.
    HasUsers(u64),
}

/// Directory store abstraction.
#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    /// Insert a new organisation and return it with its assigned id.
    async fn create_organisation(&self, new: NewOrganisation) -> StoreResult<Organisation>;

    /// Get an organisation by id.
    async fn get_organisation(&self, id: OrganisationId) -> StoreResult<Option<Organisation>>;

    /// Whether an organisation with this id exists.
    async fn organisation_exists(&self, id: OrganisationId) -> StoreResult<bool> {
        Ok(self.get_organisation(id).await?.is_some())
    }

    /// Fetch several organisations at once (missing ids are skipped).
    async fn organisations_by_ids(&self, ids: &[OrganisationId]) -> StoreResult<Vec<Organisation>>;

    /// Filtered, sorted, paginated organisation listing.
    async fn list_organisations(&self, params: &CollectionParams) -> StoreResult<Page<Organisation>>;

    /// Apply a partial update. `None` when the organisation does not exist.
    async fn update_organisation(
        &self,
        id: OrganisationId,
        changes: OrganisationChanges,
    ) -> StoreResult<Option<Organisation>>;

    /// Delete an organisation unless it still owns users.
    async fn delete_organisation(&self, id: OrganisationId) -> StoreResult<OrganisationDeletion>;

    /// Insert a new user. Fails with [`StoreError::MissingOrganisation`] on a dangling reference.
    async fn create_user(&self, new: NewUser) -> StoreResult<User>;

    /// Get a user by id.
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Filtered, sorted, paginated user listing.
    async fn list_users(&self, params: &CollectionParams) -> StoreResult<Page<User>>;

    /// Users owned by any of the given organisations, in id order.
    async fn users_of_organisations(&self, ids: &[OrganisationId]) -> StoreResult<Vec<User>>;

    /// Apply a partial update. `None` when the user does not exist.
    async fn update_user(&self, id: UserId, changes: UserChanges) -> StoreResult<Option<User>>;

    /// Delete a user. `false` when there was nothing to delete.
    async fn delete_user(&self, id: UserId) -> StoreResult<bool>;
}
