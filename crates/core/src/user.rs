use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::{OrganisationId, UserId};
use crate::query::{Column, ColumnValue, Listable, ListingSpec, SortField};

/// User account state. Integer-backed; new users start `Enabled` (code 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UserState {
    #[default]
    Enabled,
    Disabled,
}

impl UserState {
    pub const ALL: [UserState; 2] = [Self::Enabled, Self::Disabled];

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
            .ok_or_else(|| DomainError::validation(format!("unknown user state: {name}")))
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Enabled => 0,
            Self::Disabled => 1,
        }
    }

    pub fn from_code(code: i32) -> DomainResult<Self> {
        match code {
            0 => Ok(Self::Enabled),
            1 => Ok(Self::Disabled),
            other => Err(DomainError::validation(format!("unknown user state code: {other}"))),
        }
    }
}

/// A user belonging to exactly one organisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub organisation_id: OrganisationId,
    pub state: UserState,
}

impl User {
    /// Display name shown to clients as `name`.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

impl Listable for User {
    const LISTING: ListingSpec = ListingSpec {
        search_columns: &[
            Column::text("first_name"),
            Column::text("last_name"),
            Column::integer("id"),
        ],
        sort_fields: &[
            SortField {
                key: "first_name",
                column: Column::text("first_name"),
                fold_case: true,
            },
            SortField {
                key: "last_name",
                column: Column::text("last_name"),
                fold_case: true,
            },
            SortField {
                key: "email",
                column: Column::text("email"),
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
            "first_name" => Some(ColumnValue::Text(&self.first_name)),
            "last_name" => Some(ColumnValue::Text(&self.last_name)),
            "email" => Some(ColumnValue::Text(&self.email)),
            _ => None,
        }
    }
}

/// Fields for creating a user; the id is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub organisation_id: OrganisationId,
    pub state: UserState,
}

impl NewUser {
    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            organisation_id: self.organisation_id,
            state: self.state,
        }
    }
}

/// Partial update: `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub organisation_id: Option<OrganisationId>,
    pub state: Option<UserState>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.organisation_id.is_none()
            && self.state.is_none()
    }

    pub fn apply_to(self, user: &mut User) {
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(organisation_id) = self.organisation_id {
            user.organisation_id = organisation_id;
        }
        if let Some(state) = self.state {
            user.state = state;
        }
    }
}
