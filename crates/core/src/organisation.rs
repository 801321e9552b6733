use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::OrganisationId;
use crate::query::{Column, ColumnValue, Listable, ListingSpec, SortField};

/// Organisation lifecycle status.
///
/// Persisted as a small integer; exposed to clients by name (`status_name`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrganisationStatus {
    #[default]
    Enabled,
    Disabled,
}

impl OrganisationStatus {
    pub const ALL: [OrganisationStatus; 2] = [Self::Enabled, Self::Disabled];

    pub fn name(self) -> &'static str {
        match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
        }
    }

    pub fn from_name(name: &str) -> DomainResult<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| DomainError::validation(format!("unknown organisation status: {name}")))
    }

    pub fn code(self) -> i16 {
        match self {
            Self::Enabled => 0,
            Self::Disabled => 1,
        }
    }

    pub fn from_code(code: i16) -> DomainResult<Self> {
        match code {
            0 => Ok(Self::Enabled),
            1 => Ok(Self::Disabled),
            other => Err(DomainError::validation(format!(
                "unknown organisation status code: {other}"
            ))),
        }
    }
}

/// An organisation owning zero or more users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organisation {
    pub id: OrganisationId,
    pub name: String,
    pub status: OrganisationStatus,
    pub enable_user_login: bool,
}

impl Entity for Organisation {
    type Id = OrganisationId;

    fn id(&self) -> OrganisationId {
        self.id
    }
}

impl Listable for Organisation {
    const LISTING: ListingSpec = ListingSpec {
        search_columns: &[Column::text("name"), Column::integer("id")],
        sort_fields: &[
            SortField {
                key: "name",
                column: Column::text("name"),
                fold_case: true,
            },
            SortField {
                key: "id",
                column: Column::integer("id"),
                fold_case: false,
            },
        ],
    };

    fn column(&self, name: &str) -> Option<ColumnValue<'_>> {
        match name {
            "id" => Some(ColumnValue::Integer(self.id.get())),
            "name" => Some(ColumnValue::Text(&self.name)),
            _ => None,
        }
    }
}

/// Fields for creating an organisation; the id is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrganisation {
    pub name: String,
    pub status: OrganisationStatus,
    pub enable_user_login: bool,
}

impl NewOrganisation {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: OrganisationStatus::default(),
            enable_user_login: false,
        }
    }

    pub fn into_organisation(self, id: OrganisationId) -> Organisation {
        Organisation {
            id,
            name: self.name,
            status: self.status,
            enable_user_login: self.enable_user_login,
        }
    }
}

/// Partial update: `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganisationChanges {
    pub name: Option<String>,
    pub status: Option<OrganisationStatus>,
    pub enable_user_login: Option<bool>,
}

impl OrganisationChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.status.is_none() && self.enable_user_login.is_none()
    }

    pub fn apply_to(self, organisation: &mut Organisation) {
        if let Some(name) = self.name {
            organisation.name = name;
        }
        if let Some(status) = self.status {
            organisation.status = status;
        }
        if let Some(enable_user_login) = self.enable_user_login {
            organisation.enable_user_login = enable_user_login;
        }
    }
}
