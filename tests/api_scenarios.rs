//! End-to-end scenarios over the full HTTP router.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use civic_watch::civic::api::AppState;
use civic_watch::civic::db::{CivicDb, DbHandle};
use civic_watch::civic::geo::DEFAULT_MAP_CENTER;
use civic_watch::civic::identity::LocalIdentity;
use civic_watch::civic::models::Role;
use civic_watch::civic::server::{build_router, build_state};

struct Harness {
    router: Router,
    identity: LocalIdentity,
    state: Arc<AppState>,
}

impl Harness {
    fn new() -> Self {
        let db = DbHandle::new(CivicDb::new_in_memory().unwrap());
        let state = build_state(db.clone(), DEFAULT_MAP_CENTER);
        Self {
            router: build_router(state.clone()),
            identity: LocalIdentity::new(db),
            state,
        }
    }

    /// Register an account and sign it in through the callback, returning
    /// the session cookie value.
    async fn sign_in(&self, email: &str, name: &str) -> String {
        let actor = self
            .identity
            .register(email, name, Role::Citizen)
            .await
            .unwrap();
        let code = self.identity.issue_auth_code(&actor.id).await.unwrap();
        let resp = self
            .send(Request::get(format!("/api/auth/callback?code={}", code)), None, None)
            .await;
        assert!(resp.0.is_redirection());
        resp.2.expect("session cookie")
    }

    async fn send(
        &self,
        builder: axum::http::request::Builder,
        session: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value, Option<String>) {
        let mut builder = builder;
        if let Some(s) = session {
            builder = builder.header(header::COOKIE, format!("civic_session={}", s));
        }
        let req = match body {
            Some(b) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .and_then(|v| v.strip_prefix("civic_session="))
            .map(str::to_string);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json, cookie)
    }
}

fn pothole() -> Value {
    json!({
        "title": "Pothole on Elm St",
        "description": "Deep hole near the bus stop",
        "category": "pothole",
        "latitude": 28.61,
        "longitude": 77.20,
        "address": "Elm St"
    })
}

#[tokio::test]
async fn citizen_reports_and_owner_resolves() {
    let h = Harness::new();
    let a = h.sign_in("asha@example.com", "Asha").await;
    let b = h.sign_in("bilal@example.com", "Bilal").await;

    let (status, issue, _) = h.send(Request::post("/api/issues"), Some(&a), Some(pothole())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(issue["status"], "pending");
    let id = issue["id"].as_str().unwrap().to_string();
    let uri = format!("/api/issues/{}", id);

    // Public listing shows it, newest first, with the reporter attached
    let (status, list, _) = h.send(Request::get("/api/issues"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list[0]["id"], id.as_str());
    assert_eq!(list[0]["reporter"]["full_name"], "Asha");

    // Another citizen cannot change it
    let (status, _, _) = h
        .send(Request::patch(&uri), Some(&b), Some(json!({"status": "resolved"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // But can comment on it
    let (status, _, _) = h
        .send(
            Request::post("/api/comments"),
            Some(&b),
            Some(json!({"issue_id": id, "content": "Same here"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Owner resolves it
    let (status, updated, _) = h
        .send(Request::patch(&uri), Some(&a), Some(json!({"status": "resolved"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "resolved");
    assert_eq!(updated["version"], 2);

    // Detail view carries the comment with its author name
    let (_, detail, _) = h.send(Request::get(&uri), None, None).await;
    assert_eq!(detail["status"], "resolved");
    assert_eq!(detail["comments"][0]["content"], "Same here");
    assert_eq!(detail["comments"][0]["author_name"], "Bilal");

    // Reporter filter and stats agree
    let (_, mine, _) = h
        .send(Request::get(format!("/api/issues?reporter={}", issue["creator_id"].as_str().unwrap())), None, None)
        .await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    let (_, stats, _) = h.send(Request::get("/api/stats"), None, None).await;
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["resolved"], 1);
}

#[tokio::test]
async fn deleting_an_issue_removes_its_comments() {
    let h = Harness::new();
    let a = h.sign_in("asha@example.com", "Asha").await;
    let (_, issue, _) = h.send(Request::post("/api/issues"), Some(&a), Some(pothole())).await;
    let id = issue["id"].as_str().unwrap().to_string();

    h.send(
        Request::post("/api/comments"),
        Some(&a),
        Some(json!({"issue_id": id, "content": "Photo attached"})),
    )
    .await;

    let mut rx = h.state.ws_tx.subscribe();
    let (status, body, _) = h
        .send(Request::delete(format!("/api/issues/{}", id)), Some(&a), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let event: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(event["type"], "IssueDeleted");
    assert_eq!(event["data"]["issue_id"], id.as_str());

    let (status, _, _) = h.send(Request::get(format!("/api/issues/{}", id)), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Commenting on the removed issue is rejected rather than orphaned
    let (status, _, _) = h
        .send(
            Request::post("/api/comments"),
            Some(&a),
            Some(json!({"issue_id": id, "content": "Too late"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn proximity_listing_filters_by_radius() {
    let h = Harness::new();
    let a = h.sign_in("asha@example.com", "Asha").await;
    h.send(Request::post("/api/issues"), Some(&a), Some(pothole())).await;
    let mut far = pothole();
    far["title"] = json!("Far away");
    far["latitude"] = json!(19.07);
    far["longitude"] = json!(72.87);
    h.send(Request::post("/api/issues"), Some(&a), Some(far)).await;

    let (status, near, _) = h
        .send(
            Request::get("/api/issues?near_lat=28.6139&near_lng=77.209&radius_km=5"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = near
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Pothole on Elm St"]);

    let (status, _, _) = h
        .send(Request::get("/api/issues?near_lat=28.6&radius_km=5"), None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn session_cookie_identifies_the_caller() {
    let h = Harness::new();
    let a = h.sign_in("asha@example.com", "Asha").await;
    let (status, me, _) = h.send(Request::get("/api/me"), Some(&a), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["full_name"], "Asha");

    let (status, err, _) = h.send(Request::get("/api/me"), Some("made-up-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["kind"], "unauthenticated");
}
