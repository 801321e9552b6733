use axum::{Router, routing::get};

use crate::app::errors::ApiError;

pub mod organisations;
pub mod system;
pub mod users;

/// Router for all versioned endpoints (`/{api_version}/...`).
///
/// Collection routes are registered with and without the trailing slash.
/// A known path hit with an unserved method answers with a JSON 405.
pub fn router() -> Router {
    let organisation_collection = || {
        get(organisations::list)
            .post(organisations::create)
            .fallback(method_not_allowed)
    };
    let user_collection = || get(users::list).post(users::create).fallback(method_not_allowed);

    Router::new()
        .route("/:api_version/organisations", organisation_collection())
        .route("/:api_version/organisations/", organisation_collection())
        .route(
            "/:api_version/organisations/:object_id",
            get(organisations::fetch)
                .patch(organisations::update)
                .delete(organisations::remove)
                .fallback(method_not_allowed),
        )
        .route("/:api_version/users", user_collection())
        .route("/:api_version/users/", user_collection())
        .route(
            "/:api_version/users/:object_id",
            get(users::fetch)
                .patch(users::update)
                .delete(users::remove)
                .fallback(method_not_allowed),
        )
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Anything no route matches.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
