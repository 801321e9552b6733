//! Infrastructure layer: relational persistence for organisations and users.

pub mod store;

pub use store::{
    Directory, InMemoryDirectory, OrganisationDeletion, PostgresDirectory, StoreError, StoreResult,
};
