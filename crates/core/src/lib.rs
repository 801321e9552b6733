//! `roster-core`: domain foundation for the organisation/user directory.
//!
//! This crate contains **pure domain** types (no infrastructure concerns): the
//! two entities, their typed identifiers and lifecycle enums, partial-update
//! change sets, and the storage-agnostic collection query model.

pub mod entity;
pub mod error;
pub mod id;
pub mod organisation;
pub mod query;
pub mod user;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{OrganisationId, UserId};
pub use organisation::{NewOrganisation, Organisation, OrganisationChanges, OrganisationStatus};
pub use query::{CollectionParams, Listable, ListingPlan, ListingSpec, Page, Pagination};
pub use user::{NewUser, User, UserChanges, UserState};
