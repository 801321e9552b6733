mod common;

use reqwest::StatusCode;
use serde_json::json;

use common::{TestServer, names};

#[tokio::test]
async fn health_is_unversioned() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn created_organisation_is_retrievable() {
    let srv = TestServer::spawn().await;

    let (status, created) = srv
        .post("/v1/organisations/", json!({ "name": "Nakatomi" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        created,
        json!({ "id": 1, "name": "Nakatomi", "status_name": "ENABLED" })
    );

    let (status, fetched) = srv.get("/v1/organisations/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    // Trailing slash is optional on collections.
    let (status, listing) = srv.get("/v1/organisations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["total"], json!(1));
}

#[tokio::test]
async fn v2_detail_includes_login_flag_and_users() {
    let srv = TestServer::spawn().await;

    let (status, created) = srv
        .post(
            "/v2/organisations/",
            json!({ "name": "Nakatomi", "enable_user_login": true }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        created,
        json!({ "id": 1, "name": "Nakatomi", "status_name": "ENABLED" })
    );
    srv.create_user(1, "Holly", "Genaro").await;

    let (status, detail) = srv.get("/v2/organisations/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        detail,
        json!({
            "id": 1,
            "name": "Nakatomi",
            "status_name": "ENABLED",
            "enable_user_login": true,
            "users": [{
                "id": 1,
                "name": "Holly Genaro",
                "email": "holly.genaro@nakatomi.com",
                "state_name": "ENABLED"
            }]
        })
    );

    let (_, listing) = srv.get("/v2/organisations/").await;
    assert_eq!(listing["total"], json!(1));
    assert_eq!(listing["data"][0], detail);

    let (_, v1) = srv.get("/v1/organisations/1").await;
    assert!(v1.get("enable_user_login").is_none());
    assert!(v1.get("users").is_none());
}

#[tokio::test]
async fn v1_rejects_v2_only_fields() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv
        .post(
            "/v1/organisations/",
            json!({ "name": "Nakatomi", "enable_user_login": true }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body,
        json!({
            "title": "422 Unprocessable Entity",
            "errors": { "enable_user_login": ["Unknown field."] }
        })
    );
}

#[tokio::test]
async fn create_requires_a_name() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.post("/v1/organisations/", json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["errors"]["name"],
        json!(["Missing data for required field."])
    );

    let (status, body) = srv.post("/v1/organisations/", json!({ "name": null })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["name"], json!(["Field may not be null."]));

    let (status, body) = srv.post("/v1/organisations/", json!(["Nakatomi"])).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["_schema"], json!(["Invalid input type."]));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.post_raw("/v1/organisations/", "{\"name\": ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({
            "title": "400 Bad Request",
            "description": "Could not parse the request body as JSON."
        })
    );
}

#[tokio::test]
async fn partial_update_changes_only_supplied_fields() {
    let srv = TestServer::spawn().await;
    srv.create_organisation("Nakatomi").await;

    let (status, body) = srv
        .patch("/v1/organisations/1", json!({ "status": "DISABLED" }))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (_, fetched) = srv.get("/v1/organisations/1").await;
    assert_eq!(
        fetched,
        json!({ "id": 1, "name": "Nakatomi", "status_name": "DISABLED" })
    );

    let (status, _) = srv
        .patch("/v2/organisations/1", json!({ "enable_user_login": true }))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, fetched) = srv.get("/v2/organisations/1").await;
    assert_eq!(fetched["name"], json!("Nakatomi"));
    assert_eq!(fetched["status_name"], json!("DISABLED"));
    assert_eq!(fetched["enable_user_login"], json!(true));
}

#[tokio::test]
async fn update_validates_before_looking_up() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv
        .patch("/v1/organisations/45", json!({ "status": "ARCHIVED" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["errors"]["status"],
        json!(["Must be one of: ENABLED, DISABLED."])
    );

    let (status, body) = srv
        .patch("/v1/organisations/45", json!({ "name": "Nakatomi" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "title": "404 Not Found" }));
}

#[tokio::test]
async fn delete_is_blocked_while_users_exist() {
    let srv = TestServer::spawn().await;
    let org = srv.create_organisation("Nakatomi").await;
    let john = srv.create_user(org, "John", "McClane").await;
    let hans = srv.create_user(org, "Hans", "Gruber").await;

    let (status, body) = srv.delete("/v1/organisations/1").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body,
        json!({
            "title": "409 Conflict",
            "description": "This Organisation is assigned to 2 user(s). Remove users before delete!"
        })
    );

    let (status, _) = srv.get("/v1/organisations/1").await;
    assert_eq!(status, StatusCode::OK);

    for user in [john, hans] {
        let (status, _) = srv.delete(&format!("/v1/users/{user}")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let (status, _) = srv.delete("/v1/organisations/1").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = srv.get("/v1/organisations/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "title": "404 Not Found" }));

    let (status, _) = srv.delete("/v1/organisations/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_positive_or_garbage_ids_are_not_found() {
    let srv = TestServer::spawn().await;
    srv.create_organisation("Nakatomi").await;

    for path in ["/v1/organisations/0", "/v1/organisations/-1", "/v1/organisations/abc"] {
        let (status, body) = srv.get(path).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
        assert_eq!(body, json!({ "title": "404 Not Found" }));
    }
}

#[tokio::test]
async fn organisations_have_no_default_version() {
    let srv = TestServer::spawn().await;

    for (path, raw) in [("/latest/organisations/", "latest"), ("/v3/organisations/", "v3")] {
        let (status, body) = srv.get(path).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
        assert_eq!(
            body,
            json!({
                "title": "400 Bad Request",
                "errors": { "api_version": [format!("Unsupported API version: {raw}")] }
            })
        );
    }

    let (status, _) = srv
        .post("/latest/organisations/", json!({ "name": "Nakatomi" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing was created by the rejected request.
    let (_, listing) = srv.get("/v1/organisations/").await;
    assert_eq!(listing["total"], json!(0));
}

#[tokio::test]
async fn version_prefix_spellings() {
    let srv = TestServer::spawn().await;
    srv.create_organisation("Nakatomi").await;

    for prefix in ["v1", "V1", "1"] {
        let (status, body) = srv.get(&format!("/{prefix}/organisations/1")).await;
        assert_eq!(status, StatusCode::OK, "{prefix}");
        assert_eq!(body["name"], json!("Nakatomi"));
    }
}

#[tokio::test]
async fn listing_searches_sorts_and_paginates() {
    let srv = TestServer::spawn().await;
    for name in ["Nakatomi", "argyle", "Klaxon", "Nakatomi Plaza"] {
        srv.create_organisation(name).await;
    }

    let (_, listing) = srv.get("/v1/organisations/?search=nakatomi").await;
    assert_eq!(listing["total"], json!(2));
    assert_eq!(names(&listing), vec!["Nakatomi", "Nakatomi Plaza"]);

    let (_, listing) = srv.get("/v1/organisations/?search=naka&search=plaza").await;
    assert_eq!(names(&listing), vec!["Nakatomi Plaza"]);

    let (_, listing) = srv.get("/v1/organisations/?search=3").await;
    assert_eq!(names(&listing), vec!["Klaxon"]);

    let (_, listing) = srv.get("/v1/organisations/?sorting=name").await;
    assert_eq!(
        names(&listing),
        vec!["argyle", "Klaxon", "Nakatomi", "Nakatomi Plaza"]
    );

    let (_, listing) = srv.get("/v1/organisations/?sorting=name&size=2&page=1").await;
    assert_eq!(names(&listing), vec!["Nakatomi", "Nakatomi Plaza"]);
    assert_eq!(listing["total"], json!(4));

    let (status, listing) = srv.get("/v1/organisations/?sorting=agehh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing, json!({ "total": 0, "data": [] }));
}

#[tokio::test]
async fn listing_rejects_bad_paging() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.get("/v1/organisations/?page=first&size=-2").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["errors"],
        json!({
            "page": ["Not a valid integer."],
            "size": ["Must be greater than or equal to 0."]
        })
    );
}
