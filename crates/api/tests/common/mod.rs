#![allow(dead_code)]

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use roster_api::app::{build_app, services::AppServices};

pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Same router as prod over a fresh in-memory directory, on an ephemeral port.
    pub async fn spawn() -> Self {
        roster_observability::init_pretty();

        let app = build_app(Arc::new(AppServices::in_memory()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self.client.get(self.url(path)).send().await.unwrap();
        read(res).await
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self.client.post(self.url(path)).json(&body).send().await.unwrap();
        read(res).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self.client.patch(self.url(path)).json(&body).send().await.unwrap();
        read(res).await
    }

    pub async fn delete(&self, path: &str) -> (StatusCode, Value) {
        let res = self.client.delete(self.url(path)).send().await.unwrap();
        read(res).await
    }

    /// Send a hand-built request (custom method or headers).
    pub async fn send(&self, req: reqwest::RequestBuilder) -> (StatusCode, Value) {
        read(req.send().await.unwrap()).await
    }

    /// Send raw bytes as a JSON body.
    pub async fn post_raw(&self, path: &str, body: &'static str) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.url(path))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        read(res).await
    }

    pub async fn create_organisation(&self, name: &str) -> i64 {
        let (status, body) = self
            .post("/v1/organisations/", json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }

    pub async fn create_user(&self, organisation_id: i64, first: &str, last: &str) -> i64 {
        let (status, body) = self
            .post(
                "/v1/users/",
                json!({
                    "first_name": first,
                    "last_name": last,
                    "email": format!("{}.{}@nakatomi.com", first.to_lowercase(), last.to_lowercase()),
                    "organisation_id": organisation_id,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }

    /// One organisation ("Nakatomi", id 1) with four users (ids 1-4) in this order.
    pub async fn seed_die_hard(&self) -> i64 {
        let org = self.create_organisation("Nakatomi").await;
        for (first, last) in [
            ("John", "McClane"),
            ("Hans", "Gruber"),
            ("Holly", "Genaro"),
            ("Zeus", "Carver"),
        ] {
            self.create_user(org, first, last).await;
        }
        org
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn read(res: reqwest::Response) -> (StatusCode, Value) {
    let status = res.status();
    let bytes = res.bytes().await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub fn names(listing: &Value) -> Vec<String> {
    listing["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap().to_string())
        .collect()
}
