//! End-to-end tests of the HTTP surface over the in-memory store

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use forumctl_core::DecayingEngagement;
use forumctl_server::http::extractors::{USER_ID_HEADER, USER_ROLE_HEADER};
use forumctl_server::store::MemoryPostStore;
use forumctl_server::{build_router, AppState, EngineConfig, ForumEngine, ServerConfig};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    router: Router,
    moderator: Uuid,
    member: Uuid,
}

impl TestApp {
    fn new() -> Self {
        Self::with_server_config(ServerConfig {
            rate_limit: 10_000,
            ..ServerConfig::default()
        })
    }

    fn with_server_config(config: ServerConfig) -> Self {
        let store = Arc::new(MemoryPostStore::new(Arc::new(DecayingEngagement::default())));
        let engine = ForumEngine::new(store, EngineConfig::default());
        let state = Arc::new(AppState::new(engine, &config));
        Self {
            router: build_router(state, &config),
            moderator: Uuid::new_v4(),
            member: Uuid::new_v4(),
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<(Uuid, &str)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((id, role)) = user {
            builder = builder
                .header(USER_ID_HEADER, id.to_string())
                .header(USER_ROLE_HEADER, role);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn as_mod(&self) -> Option<(Uuid, &'static str)> {
        Some((self.moderator, "moderator"))
    }

    fn as_member(&self) -> Option<(Uuid, &'static str)> {
        Some((self.member, "member"))
    }

    async fn category(&self, name: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/categories",
                self.as_mod(),
                Some(json!({ "name": name, "description": "talk" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_str().unwrap().to_owned()
    }

    async fn thread(&self, category_id: &str, title: &str, content: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/threads",
                self.as_member(),
                Some(json!({ "category_id": category_id, "title": title, "content": content })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_str().unwrap().to_owned()
    }

    async fn reply(&self, thread_id: &str, parent: Option<&str>, content: &str) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                &format!("/threads/{thread_id}/posts"),
                self.as_member(),
                Some(json!({ "content": content, "parent_post_id": parent })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn only_moderators_create_categories() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::POST,
            "/categories",
            app.as_member(),
            Some(json!({ "name": "General" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    app.category("General").await;
    let (status, body) = app.send(Method::GET, "/categories", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn nested_replies_keep_depth_and_counters() {
    let app = TestApp::new();
    let category = app.category("General").await;
    let thread = app.thread(&category, "Hello", "first thread").await;

    let a = app.reply(&thread, None, "A").await;
    let a_id = a["id"].as_str().unwrap();
    let b = app.reply(&thread, Some(a_id), "B").await;
    let b_id = b["id"].as_str().unwrap();
    let c = app.reply(&thread, Some(b_id), "C").await;

    assert_eq!(a["depth"], 0);
    assert_eq!(b["depth"], 1);
    assert_eq!(c["depth"], 2);

    let (_, body) = app
        .send(Method::GET, &format!("/threads/{thread}"), None, None)
        .await;
    assert_eq!(body["data"]["replies_count"], 3);
    assert_eq!(body["data"]["views_count"], 1);
    assert_eq!(body["data"]["last_post_user_id"], app.member.to_string());

    let (_, body) = app
        .send(Method::GET, &format!("/posts/{a_id}"), None, None)
        .await;
    assert_eq!(body["data"]["replies_count"], 1);

    let (status, body) = app
        .send(Method::GET, &format!("/threads/{thread}/posts"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
    assert_eq!(body["meta"]["count"], 3);
}

#[tokio::test]
async fn thread_listing_is_paginated() {
    let app = TestApp::new();
    let category = app.category("General").await;
    for i in 0..3 {
        app.thread(&category, &format!("thread {i}"), "body").await;
    }

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/threads?category_id={category}&limit=2&sort=oldest"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["title"], "thread 0");
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["hasMore"], true);

    let (status, body) = app
        .send(Method::GET, "/threads?sort=sideways", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn locked_thread_rejects_member_replies() {
    let app = TestApp::new();
    let category = app.category("General").await;
    let thread = app.thread(&category, "Hello", "body").await;

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/threads/{thread}/lock"),
            app.as_member(),
            Some(json!({ "value": true })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/threads/{thread}/lock"),
            app.as_mod(),
            Some(json!({ "value": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_locked"], true);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/threads/{thread}/posts"),
            app.as_member(),
            Some(json!({ "content": "too late" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/threads/{thread}/posts"),
            app.as_mod(),
            Some(json!({ "content": "closing note" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn anonymous_writes_are_unauthenticated() {
    let app = TestApp::new();
    let category = app.category("General").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/threads",
            None,
            Some(json!({ "category_id": category, "title": "t", "content": "c" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "auth_error");
}

#[tokio::test]
async fn malformed_input_is_a_validation_error() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/threads/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = app
        .send(Method::GET, &format!("/threads/{}", Uuid::new_v4()), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let category = app.category("General").await;
    let thread = app.thread(&category, "Hello", "body").await;
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/threads/{thread}/posts"),
            app.as_member(),
            Some(json!({ "content": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["content"].is_string());
}

#[tokio::test]
async fn rate_limit_answers_429_with_retry_after() {
    let app = TestApp::with_server_config(ServerConfig {
        rate_limit: 2,
        rate_window: Duration::from_secs(60),
        ..ServerConfig::default()
    });

    for _ in 0..2 {
        let (status, _) = app.send(Method::GET, "/categories", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    let request = Request::builder()
        .uri("/categories")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));

    // health stays reachable
    let (status, _) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn likes_toggle_through_http() {
    let app = TestApp::new();
    let category = app.category("General").await;
    let thread = app.thread(&category, "Hello", "body").await;
    let post = app.reply(&thread, None, "likeable").await;
    let post_id = post["id"].as_str().unwrap();

    let uri = format!("/posts/{post_id}/like");
    let (_, body) = app.send(Method::POST, &uri, app.as_member(), None).await;
    assert_eq!(body["data"], json!({ "liked": true, "likes_count": 1 }));
    let (_, body) = app.send(Method::POST, &uri, app.as_member(), None).await;
    assert_eq!(body["data"], json!({ "liked": false, "likes_count": 0 }));

    let (_, body) = app
        .send(Method::POST, &format!("/threads/{thread}/like"), app.as_mod(), None)
        .await;
    assert_eq!(body["data"]["likes_count"], 1);
}

#[tokio::test]
async fn tree_context_and_by_depth_views() {
    let app = TestApp::new();
    let category = app.category("General").await;
    let thread = app.thread(&category, "Deep", "body").await;

    let mut parent: Option<String> = None;
    let mut ids = Vec::new();
    for i in 0..4 {
        let post = app.reply(&thread, parent.as_deref(), &format!("level {i}")).await;
        let id = post["id"].as_str().unwrap().to_owned();
        ids.push(id.clone());
        parent = Some(id);
    }

    let (status, body) = app
        .send(Method::GET, &format!("/threads/{thread}/tree?max_depth=2"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let root = &body["data"][0];
    assert_eq!(root["post"]["id"], ids[0].as_str());
    let second = &root["children"][0];
    assert!(second["children"].as_array().unwrap().is_empty());
    assert_eq!(second["continue_thread"]["from_post_id"], ids[1].as_str());

    let (_, body) = app
        .send(
            Method::GET,
            &format!("/threads/{thread}/posts/by-depth?parent_id={}&max_depth=1", ids[1]),
            None,
            None,
        )
        .await;
    let fetched: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(fetched, vec![ids[1].as_str(), ids[2].as_str()]);
    assert_eq!(body["data"][1]["has_children"], true);

    let (_, body) = app
        .send(Method::GET, &format!("/posts/{}/context", ids[2]), None, None)
        .await;
    let kinds: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["context_type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["ancestor", "ancestor", "self"]);
}

#[tokio::test]
async fn deleting_a_post_removes_its_subtree() {
    let app = TestApp::new();
    let category = app.category("General").await;
    let thread = app.thread(&category, "Hello", "body").await;
    let a = app.reply(&thread, None, "A").await;
    let a_id = a["id"].as_str().unwrap();
    let b = app.reply(&thread, Some(a_id), "B").await;
    app.reply(&thread, Some(b["id"].as_str().unwrap()), "C").await;

    let stranger = Some((Uuid::new_v4(), "member"));
    let (status, _) = app
        .send(Method::DELETE, &format!("/posts/{a_id}"), stranger, None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::DELETE, &format!("/posts/{a_id}"), app.as_member(), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], 3);

    let (_, body) = app
        .send(Method::GET, &format!("/threads/{thread}"), None, None)
        .await;
    assert_eq!(body["data"]["replies_count"], 0);
    assert!(body["data"]["last_post_at"].is_null());
}

#[tokio::test]
async fn search_finds_threads_and_posts() {
    let app = TestApp::new();
    let category = app.category("General").await;
    let thread = app.thread(&category, "Borrow checker tips", "lifetimes explained").await;
    app.reply(&thread, None, "the borrow checker saved me").await;
    app.thread(&category, "Gardening", "tomatoes").await;

    let (status, body) = app.send(Method::GET, "/search?q=borrow", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let results = body["data"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(body["meta"]["count"], 2);

    let (_, body) = app
        .send(Method::GET, "/search?q=borrow&type=posts", None, None)
        .await;
    let results = body["data"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["type"], "post");
    assert_eq!(results[0]["title"], "Borrow checker tips");

    let (status, _) = app.send(Method::GET, "/search?q=", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
