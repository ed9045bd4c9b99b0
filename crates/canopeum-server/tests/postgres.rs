//! End-to-end API scenarios against a real Postgres.
//!
//! Run with `cargo test -p canopeum-server --features test-postgres` (needs docker).

#![cfg(feature = "test-postgres")]

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use canopeum::{Coordinate, DisabledGeocoder, Role, Weather, WeatherError, WeatherProvider};
use canopeum_config::Config;
use canopeum_db::queries::batch::{NewBatch, insert_batch};
use canopeum_db::queries::lookup::{LookupTable, insert as insert_lookup};
use canopeum_db::queries::site::{NewSite, create_site};
use canopeum_db::queries::social::insert_post;
use canopeum_db::queries::user::{NewUser, grant_site_admin, insert_invitation, insert_user};
use canopeum_db::{Database, MigrationRunner};
use canopeum_server::{AppState, router};
use jiff::Timestamp;
use serde_json::{Value, json};
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tower::ServiceExt;

struct FixedWeather;

#[async_trait]
impl WeatherProvider for FixedWeather {
    async fn current(&self, _latitude: f64, _longitude: f64) -> Result<Weather, WeatherError> {
        Ok(Weather::from_readings(21.5, 40.0, Some(0)))
    }
}

struct TestApp {
    state: AppState,
    // Dropping the container stops it.
    _container: ContainerAsync<Postgres>,
}

async fn setup() -> TestApp {
    let container = Postgres::default().start().await.unwrap();
    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(5432).await.unwrap();

    let mut config = Config::default();
    config.database.url = Some(format!("postgres://postgres:postgres@{host}:{port}/postgres"));
    config.auth.jwt_secret = Some("test-secret".to_string());
    config.server.public_url = Some("http://api.test".to_string());
    config.server.media_root = Some(std::env::temp_dir().join("canopeum-test-media").display().to_string());

    let db = Database::connect(&config.database).unwrap();
    {
        let mut conn = db.get().await.unwrap();
        MigrationRunner::new(&mut conn).migrate().await.unwrap();
    }
    let state = AppState::new(config, db, Arc::new(DisabledGeocoder), Arc::new(FixedWeather)).unwrap();
    TestApp {
        state,
        _container: container,
    }
}

impl TestApp {
    fn app(&self) -> Router {
        router(self.state.clone())
    }

    fn token(&self, user_id: i64, role: Role) -> String {
        self.state.tokens.access(user_id, role, Timestamp::now()).unwrap()
    }

    async fn user(&self, username: &str, role: Role) -> i64 {
        let conn = self.state.db.get().await.unwrap();
        insert_user(
            &conn,
            &NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: "not-a-real-hash".to_string(),
                role,
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn site(&self, name: &str, is_public: bool) -> i64 {
        let conn = self.state.db.get().await.unwrap();
        let coordinate =
            Coordinate::with_address("45°30'06.1\"N", "73°34'02.3\"W", "Montréal, QC").unwrap();
        create_site(
            &conn,
            &NewSite {
                name: name.to_string(),
                is_public,
                site_type_id: None,
                coordinate,
                description: None,
                size: None,
                research_partnership: None,
                visible_map: None,
                visitor_count: None,
                image_id: None,
                species: Vec::new(),
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn send(&self, method: &str, uri: &str, bearer: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.app().oneshot(request).await.unwrap()
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn stewards_manage_only_their_sites() {
    let t = setup().await;
    let steward = t.user("steward", Role::ForestSteward).await;
    let mine = t.site("Mine", false).await;
    let theirs = t.site("Theirs", true).await;
    {
        let conn = t.state.db.get().await.unwrap();
        grant_site_admin(&conn, steward, mine).await.unwrap();
    }
    let token = t.token(steward, Role::ForestSteward);

    let response = t
        .send("GET", &format!("/analytics/sites/{mine}"), Some(token.as_str()), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Readable because it is public, but not managed.
    let response = t
        .send("GET", &format!("/analytics/sites/{theirs}"), Some(token.as_str()), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = t.send("GET", "/analytics/sites/summary", Some(token.as_str()), None).await;
    let body = json_body(response).await;
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|site| site["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![mine]);
}

#[tokio::test]
async fn private_sites_are_hidden_from_strangers() {
    let t = setup().await;
    let hidden = t.site("Hidden", false).await;

    let response = t.send("GET", &format!("/social/sites/{hidden}"), None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let admin = t.user("admin", Role::MegaAdmin).await;
    let token = t.token(admin, Role::MegaAdmin);
    let response = t
        .send("GET", &format!("/social/sites/{hidden}"), Some(token.as_str()), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["name"], "Hidden");
}

#[tokio::test]
async fn adding_a_composition_twice_conflicts() {
    let t = setup().await;
    let admin = t.user("admin", Role::MegaAdmin).await;
    let token = t.token(admin, Role::MegaAdmin);
    let site_id = t.site("Grove", true).await;
    let (batch_id, fertilizer_id) = {
        let conn = t.state.db.get().await.unwrap();
        let fertilizer = insert_lookup(&conn, LookupTable::FertilizerType, "Manure", "Fumier")
            .await
            .unwrap();
        let batch = insert_batch(
            &conn,
            &NewBatch {
                site_id,
                name: "First Batch".to_string(),
                ..NewBatch::default()
            },
        )
        .await
        .unwrap();
        (batch.id, fertilizer.id)
    };
    let uri = format!("/analytics/batches/{batch_id}/fertilizers");

    let response = t
        .send("POST", &uri, Some(token.as_str()), Some(json!({ "id": fertilizer_id })))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["fertilizers"][0]["en"], "Manure");

    let response = t
        .send("POST", &uri, Some(token.as_str()), Some(json!({ "id": fertilizer_id })))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await, json!("DUPLICATE_ASSOCIATION"));
}

#[tokio::test]
async fn feed_is_paginated_newest_first() {
    let t = setup().await;
    let site_id = t.site("Public", true).await;
    {
        let conn = t.state.db.get().await.unwrap();
        for i in 0..7 {
            insert_post(&conn, site_id, &format!("post {i}"), &[]).await.unwrap();
        }
    }

    let response = t
        .send("GET", &format!("/social/posts?siteId={site_id}&size=5"), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    assert_eq!(page["count"], 7);
    assert_eq!(page["results"].as_array().unwrap().len(), 5);
    assert_eq!(page["results"][0]["body"], "post 6");
    assert_eq!(
        page["next"],
        format!("http://api.test/social/posts?siteId={site_id}&page=2&size=5")
    );
    assert_eq!(page["previous"], Value::Null);

    let response = t
        .send("GET", &format!("/social/posts?siteId={site_id}&page=2&size=5"), None, None)
        .await;
    let page = json_body(response).await;
    assert_eq!(page["results"].as_array().unwrap().len(), 2);
    assert_eq!(page["next"], Value::Null);
}

#[tokio::test]
async fn a_post_is_liked_once_per_user() {
    let t = setup().await;
    let user = t.user("liker", Role::User).await;
    let token = t.token(user, Role::User);
    let site_id = t.site("Public", true).await;
    let post_id = {
        let conn = t.state.db.get().await.unwrap();
        insert_post(&conn, site_id, "planted", &[]).await.unwrap().id
    };
    let uri = format!("/social/posts/{post_id}/likes");

    let response = t.send("POST", &uri, Some(token.as_str()), None).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await, json!({ "like_count": 1 }));

    let response = t.send("POST", &uri, Some(token.as_str()), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!("ALREADY_LIKED"));

    let response = t.send("DELETE", &uri, Some(token.as_str()), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = t.send("DELETE", &uri, Some(token.as_str()), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn site_summary_carries_the_weather() {
    let t = setup().await;
    let admin = t.user("admin", Role::MegaAdmin).await;
    let token = t.token(admin, Role::MegaAdmin);
    let site_id = t.site("Sunny", true).await;

    let response = t
        .send("GET", &format!("/analytics/sites/{site_id}/summary"), Some(token.as_str()), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["weather"]["temperature"], 21.5);
    assert_eq!(body["name"], "Sunny");
}

fn registration(username: &str, email: &str, code: Option<&str>) -> Value {
    json!({
        "username": username,
        "email": email,
        "password": "correct horse",
        "password_confirmation": "correct horse",
        "code": code,
    })
}

#[tokio::test]
async fn login_matches_email_in_any_case() {
    let t = setup().await;
    let response = t
        .send("POST", "/auth/register", None, Some(registration("alice", "alice@example.com", None)))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = t
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "ALICE@example.com", "password": "correct horse" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["user"]["username"], "alice");
    assert!(body["user"]["last_login_at"].is_string());
    assert!(body["token"]["access"].is_string());

    let response = t
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "alice@example.com", "password": "wrong horse" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await, json!("INVALID_CREDENTIALS"));
}

#[tokio::test]
async fn email_taken_in_another_case_keeps_login_working() {
    let t = setup().await;
    let response = t
        .send("POST", "/auth/register", None, Some(registration("alice", "alice@example.com", None)))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    for email in ["alice@example.com", "ALICE@Example.COM"] {
        let response = t
            .send("POST", "/auth/register", None, Some(registration("mallory", email, None)))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{email}");
        assert_eq!(json_body(response).await, json!("EMAIL_TAKEN"));
    }

    let response = t
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "alice@example.com", "password": "correct horse" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn invitation_code_works_once() {
    let t = setup().await;
    let site_id = t.site("Invited", false).await;
    let code = {
        let conn = t.state.db.get().await.unwrap();
        insert_invitation(&conn, "steward@example.com", &[site_id], Timestamp::now())
            .await
            .unwrap()
            .code
    };

    let response = t
        .send(
            "POST",
            "/auth/register",
            None,
            Some(registration("steward", "steward@example.com", Some(code.as_str()))),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await["user"]["admin_site_ids"], json!([site_id]));

    let response = t
        .send(
            "POST",
            "/auth/register",
            None,
            Some(registration("copycat", "copycat@example.com", Some(code.as_str()))),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!("INVITATION_CODE_INVALID"));
}
