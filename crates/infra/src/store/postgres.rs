//! Postgres-backed directory.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (foreign key violation) | `23503` | `MissingOrganisation` | User insert/update points at an unknown organisation |
//! | Database (other) | Any other | `Storage` | Constraint or SQL failures |
//! | PoolClosed | N/A | `Storage` | Connection pool was closed |
//! | Other | N/A | `Storage` | Network errors, connection failures, etc. |
//!
//! Row decoding failures (including unknown status/state codes) become `CorruptRow`.
//!
//! ## Listing
//!
//! Listing requests are resolved through [`roster_core::ListingSpec::plan`] exactly like the
//! in-memory store, then rendered with [`QueryBuilder`]: every term becomes an
//! `ILIKE` group ORed across the search columns, groups are ANDed, and ordering
//! always ends with `id ASC`.

use std::sync::Arc;

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row, Transaction};
use tracing::{Span, instrument};

use roster_core::query::{ColumnKind, ListingPlan};
use roster_core::{
    CollectionParams, Listable, NewOrganisation, NewUser, Organisation,
    OrganisationChanges, OrganisationId, OrganisationStatus, Page, User, UserChanges, UserId,
    UserState,
};

use super::{Directory, OrganisationDeletion, StoreError, StoreResult};

const ORGANISATION_COLUMNS: &str = "id, name, status, enable_user_login";
const USER_COLUMNS: &str = "id, first_name, last_name, email, organisation_id, state";

/// Postgres-backed directory over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PostgresDirectory {
    pool: Arc<PgPool>,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the tables if they are missing. Safe to run on every start.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS organisations (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                status SMALLINT NOT NULL DEFAULT 0,
                enable_user_login BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL,
                organisation_id BIGINT NOT NULL REFERENCES organisations(id),
                state INTEGER NOT NULL DEFAULT 0
            )
            "#,
            "CREATE INDEX IF NOT EXISTS users_organisation_id_idx ON users (organisation_id)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    async fn list<T, R>(
        &self,
        operation: &str,
        table: &str,
        columns: &str,
        params: &CollectionParams,
    ) -> StoreResult<Page<T>>
    where
        T: Listable + TryFrom<R, Error = StoreError>,
        R: for<'r> FromRow<'r, PgRow>,
    {
        let spec = T::LISTING;
        let Some(plan) = spec.plan(params) else {
            return Ok(Page::empty());
        };

        let total: i64 = count_query(table, &plan)
            .build()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?
            .try_get(0)
            .map_err(|e| StoreError::CorruptRow(format!("failed to read count: {e}")))?;

        let rows = select_query(table, columns, &plan)
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(T::try_from(decode::<R>(&row)?)?);
        }

        Span::current().record("total", total);
        Ok(Page {
            items,
            total: u64::try_from(total).unwrap_or(0),
        })
    }
}

#[async_trait::async_trait]
impl Directory for PostgresDirectory {
    #[instrument(skip(self, new), err)]
    async fn create_organisation(&self, new: NewOrganisation) -> StoreResult<Organisation> {
        let row = sqlx::query(&format!(
            "INSERT INTO organisations (name, status, enable_user_login) VALUES ($1, $2, $3) RETURNING {ORGANISATION_COLUMNS}"
        ))
        .bind(&new.name)
        .bind(new.status.code())
        .bind(new.enable_user_login)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_organisation", e))?;

        Organisation::try_from(decode::<OrganisationRow>(&row)?)
    }

    #[instrument(skip(self), fields(organisation_id = %id), err)]
    async fn get_organisation(&self, id: OrganisationId) -> StoreResult<Option<Organisation>> {
        let row = sqlx::query(&format!(
            "SELECT {ORGANISATION_COLUMNS} FROM organisations WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_organisation", e))?;

        row.map(|row| Organisation::try_from(decode::<OrganisationRow>(&row)?))
            .transpose()
    }

    #[instrument(skip(self), fields(organisation_id = %id), err)]
    async fn organisation_exists(&self, id: OrganisationId) -> StoreResult<bool> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM organisations WHERE id = $1)")
            .bind(id.get())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("organisation_exists", e))?;

        row.try_get(0)
            .map_err(|e| StoreError::CorruptRow(format!("failed to read exists flag: {e}")))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn organisations_by_ids(&self, ids: &[OrganisationId]) -> StoreResult<Vec<Organisation>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {ORGANISATION_COLUMNS} FROM organisations WHERE id = ANY($1) ORDER BY id ASC"
        ))
        .bind(raw)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("organisations_by_ids", e))?;

        rows.iter()
            .map(|row| Organisation::try_from(decode::<OrganisationRow>(row)?))
            .collect()
    }

    #[instrument(skip(self), fields(total = tracing::field::Empty), err)]
    async fn list_organisations(&self, params: &CollectionParams) -> StoreResult<Page<Organisation>> {
        self.list::<Organisation, OrganisationRow>(
            "list_organisations",
            "organisations",
            ORGANISATION_COLUMNS,
            params,
        )
        .await
    }

    #[instrument(skip(self, changes), fields(organisation_id = %id), err)]
    async fn update_organisation(
        &self,
        id: OrganisationId,
        changes: OrganisationChanges,
    ) -> StoreResult<Option<Organisation>> {
        let mut tx = self.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {ORGANISATION_COLUMNS} FROM organisations WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_organisation", e))?;

        let Some(row) = row else {
            rollback(tx).await?;
            return Ok(None);
        };

        let mut organisation = Organisation::try_from(decode::<OrganisationRow>(&row)?)?;
        changes.apply_to(&mut organisation);

        sqlx::query(
            "UPDATE organisations SET name = $2, status = $3, enable_user_login = $4 WHERE id = $1",
        )
        .bind(id.get())
        .bind(&organisation.name)
        .bind(organisation.status.code())
        .bind(organisation.enable_user_login)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_organisation", e))?;

        commit(tx).await?;
        Ok(Some(organisation))
    }

    #[instrument(skip(self), fields(organisation_id = %id), err)]
    async fn delete_organisation(&self, id: OrganisationId) -> StoreResult<OrganisationDeletion> {
        let mut tx = self.begin().await?;

        let locked = sqlx::query("SELECT id FROM organisations WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_organisation", e))?;
        if locked.is_none() {
            rollback(tx).await?;
            return Ok(OrganisationDeletion::NotFound);
        }

        let users = count_users(&mut tx, id).await?;
        if users > 0 {
            rollback(tx).await?;
            return Ok(OrganisationDeletion::HasUsers(users));
        }

        sqlx::query("DELETE FROM organisations WHERE id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_organisation", e))?;

        commit(tx).await?;
        Ok(OrganisationDeletion::Deleted)
    }

    #[instrument(skip(self, new), fields(organisation_id = %new.organisation_id), err)]
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let organisation_id = new.organisation_id;
        let row = sqlx::query(&format!(
            "INSERT INTO users (first_name, last_name, email, organisation_id, state) VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(organisation_id.get())
        .bind(new.state.code())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_reference_error("create_user", organisation_id, e))?;

        User::try_from(decode::<UserRow>(&row)?)
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;

        row.map(|row| User::try_from(decode::<UserRow>(&row)?)).transpose()
    }

    #[instrument(skip(self), fields(total = tracing::field::Empty), err)]
    async fn list_users(&self, params: &CollectionParams) -> StoreResult<Page<User>> {
        self.list::<User, UserRow>("list_users", "users", USER_COLUMNS, params)
            .await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn users_of_organisations(&self, ids: &[OrganisationId]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE organisation_id = ANY($1) ORDER BY id ASC"
        ))
        .bind(raw)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("users_of_organisations", e))?;

        rows.iter()
            .map(|row| User::try_from(decode::<UserRow>(row)?))
            .collect()
    }

    #[instrument(skip(self, changes), fields(user_id = %id), err)]
    async fn update_user(&self, id: UserId, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut tx = self.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;

        let Some(row) = row else {
            rollback(tx).await?;
            return Ok(None);
        };

        let mut user = User::try_from(decode::<UserRow>(&row)?)?;
        changes.apply_to(&mut user);

        sqlx::query(
            "UPDATE users SET first_name = $2, last_name = $3, email = $4, organisation_id = $5, state = $6 WHERE id = $1",
        )
        .bind(id.get())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.organisation_id.get())
        .bind(user.state.code())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_reference_error("update_user", user.organisation_id, e))?;

        commit(tx).await?;
        Ok(Some(user))
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn delete_user(&self, id: UserId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        Ok(result.rows_affected() > 0)
    }
}

impl PostgresDirectory {
    async fn begin(&self) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

async fn commit(tx: Transaction<'_, Postgres>) -> StoreResult<()> {
    tx.commit()
        .await
        .map_err(|e| map_sqlx_error("commit_transaction", e))
}

async fn rollback(tx: Transaction<'_, Postgres>) -> StoreResult<()> {
    tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))
}

async fn count_users(tx: &mut Transaction<'_, Postgres>, id: OrganisationId) -> StoreResult<u64> {
    let row = sqlx::query("SELECT COUNT(*) FROM users WHERE organisation_id = $1")
        .bind(id.get())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("count_users", e))?;

    let count: i64 = row
        .try_get(0)
        .map_err(|e| StoreError::CorruptRow(format!("failed to read user count: {e}")))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

// Listing SQL

/// Escape `LIKE` metacharacters so a term only ever matches literally.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, plan: &ListingPlan<'_>) {
    let terms: Vec<&String> = plan.terms.iter().filter(|t| !t.is_empty()).collect();
    if terms.is_empty() || plan.search_columns.is_empty() {
        return;
    }

    qb.push(" WHERE ");
    for (i, term) in terms.into_iter().enumerate() {
        if i > 0 {
            qb.push(" AND ");
        }
        qb.push("(");
        for (j, column) in plan.search_columns.iter().enumerate() {
            if j > 0 {
                qb.push(" OR ");
            }
            match column.kind {
                ColumnKind::Text => qb.push(column.name),
                ColumnKind::Integer => qb.push(format!("CAST({} AS TEXT)", column.name)),
            };
            qb.push(" ILIKE ");
            qb.push_bind(like_pattern(term));
        }
        qb.push(")");
    }
}

fn count_query<'a>(table: &str, plan: &ListingPlan<'_>) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {table}"));
    push_filter(&mut qb, plan);
    qb
}

fn select_query<'a>(table: &str, columns: &str, plan: &ListingPlan<'_>) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {columns} FROM {table}"));
    push_filter(&mut qb, plan);

    qb.push(" ORDER BY ");
    if let Some(field) = plan.sort.filter(|f| f.column.name != "id") {
        if field.fold_case {
            qb.push(format!("lower({}) ASC, ", field.column.name));
        } else {
            qb.push(format!("{} ASC, ", field.column.name));
        }
    }
    qb.push("id ASC");

    if let Some(pagination) = plan.pagination {
        qb.push(" LIMIT ");
        qb.push_bind(i64::try_from(pagination.limit).unwrap_or(i64::MAX));
        qb.push(" OFFSET ");
        qb.push_bind(i64::try_from(pagination.offset).unwrap_or(i64::MAX));
    }
    qb
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            StoreError::Storage(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::RowNotFound => {
            StoreError::Storage(format!("unexpected row not found in {}", operation))
        }
        _ => StoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

/// Like [`map_sqlx_error`], but a foreign key violation means the referenced organisation is gone.
fn map_reference_error(operation: &str, organisation_id: OrganisationId, err: sqlx::Error) -> StoreError {
    if is_foreign_key_violation(&err) {
        StoreError::MissingOrganisation(organisation_id)
    } else {
        map_sqlx_error(operation, err)
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23503";
        }
    }
    false
}

// SQLx row types

fn decode<R: for<'r> FromRow<'r, PgRow>>(row: &PgRow) -> StoreResult<R> {
    R::from_row(row).map_err(|e| StoreError::CorruptRow(format!("failed to decode row: {e}")))
}

#[derive(Debug)]
struct OrganisationRow {
    id: i64,
    name: String,
    status: i16,
    enable_user_login: bool,
}

impl<'r> FromRow<'r, PgRow> for OrganisationRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrganisationRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            status: row.try_get("status")?,
            enable_user_login: row.try_get("enable_user_login")?,
        })
    }
}

impl TryFrom<OrganisationRow> for Organisation {
    type Error = StoreError;

    fn try_from(row: OrganisationRow) -> Result<Self, Self::Error> {
        let status = OrganisationStatus::from_code(row.status)
            .map_err(|e| StoreError::CorruptRow(format!("organisation {}: {e}", row.id)))?;
        Ok(Organisation {
            id: OrganisationId::new(row.id),
            name: row.name,
            status,
            enable_user_login: row.enable_user_login,
        })
    }
}

#[derive(Debug)]
struct UserRow {
    id: i64,
    first_name: String,
    last_name: String,
    email: String,
    organisation_id: i64,
    state: i32,
}

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            organisation_id: row.try_get("organisation_id")?,
            state: row.try_get("state")?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let state = UserState::from_code(row.state)
            .map_err(|e| StoreError::CorruptRow(format!("user {}: {e}", row.id)))?;
        Ok(User {
            id: UserId::new(row.id),
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            organisation_id: OrganisationId::new(row.organisation_id),
            state,
        })
    }
}
