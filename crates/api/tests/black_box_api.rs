use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

use tenantry_auth::JwtClaims;
use tenantry_core::UserId;
use tenantry_infra::config::AppConfig;

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over a seeded in-memory store, on an ephemeral port.
        let app = tenantry_api::app::build_app(&AppConfig::for_tests(JWT_SECRET))
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct TestUser {
    id: i64,
    token: String,
}

/// Mirrors the classic fixture: two users, one app and one subscription each.
struct Fixture {
    srv: TestServer,
    client: reqwest::Client,
    user1: TestUser,
    user2: TestUser,
    app1: i64,
    app2: i64,
    sub1: i64,
}

async fn register(srv: &TestServer, client: &reqwest::Client, username: &str, email: &str, password: &str) -> TestUser {
    let res = client
        .post(srv.url("/signup"))
        .json(&json!({"username": username, "email": email, "password": password}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(srv.url("/login"))
        .json(&json!({"username": username, "password": password}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();

    TestUser {
        id: body["user"]["id"].as_i64().unwrap(),
        token: body["token"].as_str().unwrap().to_string(),
    }
}

async fn create_app(fx_srv: &TestServer, client: &reqwest::Client, user: &TestUser, name: &str, ty: &str, fw: &str) -> i64 {
    let res = client
        .post(fx_srv.url("/apps"))
        .bearer_auth(&user.token)
        .json(&json!({
            "name": name,
            "description": format!("{name} Application"),
            "type": ty,
            "framework": fw,
            "user": user.id,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json::<Value>().await.unwrap()["id"].as_i64().unwrap()
}

async fn create_subscription(srv: &TestServer, client: &reqwest::Client, user: &TestUser, plan: i64, app: i64, active: bool) -> i64 {
    let res = client
        .post(srv.url("/subscriptions"))
        .bearer_auth(&user.token)
        .json(&json!({"user": user.id, "plan": plan, "app": app, "active": active}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json::<Value>().await.unwrap()["id"].as_i64().unwrap()
}

async fn fixture() -> Fixture {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let user1 = register(&srv, &client, "Test User1", "tu1@test.com", "password1").await;
    let user2 = register(&srv, &client, "Test User2", "tu2@test.com", "password2").await;

    let app1 = create_app(&srv, &client, &user1, "App One", "ty1", "fw1").await;
    let app2 = create_app(&srv, &client, &user2, "App Two", "ty2", "fw2").await;

    let sub1 = create_subscription(&srv, &client, &user1, 1, app1, true).await;
    create_subscription(&srv, &client, &user2, 2, app2, false).await;

    Fixture {
        srv,
        client,
        user1,
        user2,
        app1,
        app2,
        sub1,
    }
}

impl Fixture {
    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.srv.url(path)).bearer_auth(&self.user1.token)
    }

    fn post(&self, path: &str, body: Value) -> reqwest::RequestBuilder {
        self.client.post(self.srv.url(path)).bearer_auth(&self.user1.token).json(&body)
    }

    fn put(&self, path: &str, body: Value) -> reqwest::RequestBuilder {
        self.client.put(self.srv.url(path)).bearer_auth(&self.user1.token).json(&body)
    }

    fn patch(&self, path: &str, body: Value) -> reqwest::RequestBuilder {
        self.client.patch(self.srv.url(path)).bearer_auth(&self.user1.token).json(&body)
    }

    fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.srv.url(path)).bearer_auth(&self.user1.token)
    }

    /// First element of a retrieve response (which is always a list).
    async fn retrieve_one(&self, path: &str) -> Value {
        let res = self.get(path).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let list: Vec<Value> = res.json().await.unwrap();
        assert_eq!(list.len(), 1, "expected exactly one item at {path}");
        list.into_iter().next().unwrap()
    }
}

fn mint_jwt(sub: i64, issued_at: chrono::DateTime<Utc>, ttl: ChronoDuration) -> String {
    let claims = JwtClaims::new(UserId::new(sub), issued_at, ttl);
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

// -------------------------
// Accounts
// -------------------------

#[tokio::test]
async fn register_and_login() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/signup"))
        .json(&json!({"username": "ram", "email": "kramsn@gmail.com", "password": "password1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let user: Value = res.json().await.unwrap();
    assert_eq!(user["username"], "ram");
    assert!(user.get("password").is_none());

    let res = client
        .post(srv.url("/login"))
        .json(&json!({"username": "ram", "email": "kramsn@gmail.com", "password": "password1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert!(body["token"].is_string());
    assert_eq!(body["key"], body["token"]);
    assert_eq!(body["user"]["id"], user["id"]);
}

#[tokio::test]
async fn bad_credentials_and_duplicates_are_400() {
    let fx = fixture().await;

    let res = fx
        .client
        .post(fx.srv.url("/login"))
        .json(&json!({"username": "Test User1", "password": "nope-nope"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = fx
        .client
        .post(fx.srv.url("/signup"))
        .json(&json!({"username": "Test User1", "email": "new@test.com", "password": "password1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expired_and_forged_tokens_are_rejected() {
    let fx = fixture().await;

    let expired = mint_jwt(fx.user1.id, Utc::now() - ChronoDuration::hours(2), ChronoDuration::hours(1));
    let res = fx.client.get(fx.srv.url("/apps")).bearer_auth(expired).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = fx.client.get(fx.srv.url("/apps")).bearer_auth("not-a-jwt").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Legacy `Token` scheme is accepted.
    let res = fx
        .client
        .get(fx.srv.url("/apps"))
        .header("Authorization", format!("Token {}", fx.user1.token))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

// -------------------------
// Plans
// -------------------------

#[tokio::test]
async fn list_plans() {
    let fx = fixture().await;
    let res = fx.get("/plans").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let plans: Vec<Value> = res.json().await.unwrap();
    assert_eq!(plans.len(), 3);
    assert_eq!(plans[0]["name"], "Free");
    assert_eq!(plans[1]["price"], "10.00");
}

#[tokio::test]
async fn plan_writes_not_allowed() {
    let fx = fixture().await;

    let res = fx
        .post("/plans", json!({"name": "Test", "description": "Test Plan", "price": 50}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    let mut plan: Value = fx.get("/plans/1").send().await.unwrap().json().await.unwrap();
    plan["name"] = json!("Update Plan Name");

    let res = fx.put("/plans/1", plan.clone()).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    let res = fx.patch("/plans/1", plan).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    let res = fx.delete("/plans/1").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn plans_require_auth_before_method_checks() {
    let fx = fixture().await;
    let res = fx.client.post(fx.srv.url("/plans")).json(&json!({})).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_plan_is_404() {
    let fx = fixture().await;
    let res = fx.get("/plans/99").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

// -------------------------
// Apps
// -------------------------

#[tokio::test]
async fn list_apps_shows_only_own() {
    let fx = fixture().await;
    let res = fx.get("/apps").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let apps: Vec<Value> = res.json().await.unwrap();
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0]["name"], "App One");
    assert_eq!(apps[0]["type"], "Web");
    assert_eq!(apps[0]["framework"], "Django");
}

#[tokio::test]
async fn list_apps_unauthenticated() {
    let fx = fixture().await;
    let res = fx.client.get(fx.srv.url("/apps")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn apps_create() {
    let fx = fixture().await;
    let res = fx
        .post(
            "/apps",
            json!({
                "name": "Test App 10",
                "description": "10th Application",
                "type": "ty1",
                "framework": "fw1",
                "user": fx.user1.id,
            }),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let app: Value = res.json().await.unwrap();
    assert_eq!(app["name"], "Test App 10");
    assert_eq!(app["user"], fx.user1.id);
}

#[tokio::test]
async fn apps_create_for_another_user_is_401() {
    let fx = fixture().await;
    let res = fx
        .post(
            "/apps",
            json!({
                "name": "Test App 10",
                "description": "10th Application",
                "type": "ty1",
                "framework": "fw1",
                "user": fx.user2.id,
            }),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn apps_create_rejects_bad_payloads() {
    let fx = fixture().await;

    // Duplicate name (owned by another user).
    let res = fx
        .post(
            "/apps",
            json!({"name": "App Two", "description": "d", "type": "Web", "framework": "Django", "user": fx.user1.id}),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Unknown enum choice.
    let res = fx
        .post(
            "/apps",
            json!({"name": "New", "description": "d", "type": "Desktop", "framework": "Django", "user": fx.user1.id}),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Malformed JSON.
    let res = fx
        .client
        .post(fx.srv.url("/apps"))
        .bearer_auth(&fx.user1.token)
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_payload");
}

#[tokio::test]
async fn apps_update() {
    let fx = fixture().await;
    let path = format!("/apps/{}", fx.app1);

    let mut data = fx.retrieve_one(&path).await;
    data["description"] = json!("Updated description");

    let res = fx.put(&path, data).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let app: Value = res.json().await.unwrap();
    assert_eq!(app["description"], "Updated description");
}

#[tokio::test]
async fn apps_update_wrong_user_info() {
    let fx = fixture().await;
    let path = format!("/apps/{}", fx.app1);

    let mut data = fx.retrieve_one(&path).await;
    data["description"] = json!("wrong user update description");
    data["user"] = json!(fx.user2.id);

    let res = fx.put(&path, data).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn apps_rename_onto_taken_name_is_400() {
    let fx = fixture().await;
    let path = format!("/apps/{}", fx.app1);

    let mut data = fx.retrieve_one(&path).await;
    data["name"] = json!("App Two");
    let res = fx.put(&path, data).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = fx.patch(&path, json!({"name": "App Two"})).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let app = fx.retrieve_one(&path).await;
    assert_eq!(app["name"], "App One");
}

#[tokio::test]
async fn apps_patch() {
    let fx = fixture().await;
    let path = format!("/apps/{}", fx.app1);

    let mut data = fx.retrieve_one(&path).await;
    data["description"] = json!("Patched description");
    let obj = data.as_object_mut().unwrap();
    obj.remove("type");
    obj.remove("framework");

    let res = fx.patch(&path, data).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let app: Value = res.json().await.unwrap();
    assert_eq!(app["description"], "Patched description");
    assert_eq!(app["type"], "Web");
}

#[tokio::test]
async fn apps_patch_wrong_user_info() {
    let fx = fixture().await;
    let path = format!("/apps/{}", fx.app1);

    let mut data = fx.retrieve_one(&path).await;
    data["user"] = json!(fx.user2.id);
    let obj = data.as_object_mut().unwrap();
    obj.remove("type");
    obj.remove("framework");

    let res = fx.patch(&path, data).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn foreign_app_is_invisible_and_immutable() {
    let fx = fixture().await;
    let path = format!("/apps/{}", fx.app2);

    let res = fx.get(&path).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let list: Vec<Value> = res.json().await.unwrap();
    assert!(list.is_empty());

    let res = fx
        .put(
            &path,
            json!({"name": "Hijacked", "description": "d", "type": "Web", "framework": "Django", "user": fx.user1.id}),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Non-owner delete reports success but changes nothing.
    let res = fx.delete(&path).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = fx
        .client
        .get(fx.srv.url(&path))
        .bearer_auth(&fx.user2.token)
        .send()
        .await
        .unwrap();
    let list: Vec<Value> = res.json().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["name"], "App Two");
}

#[tokio::test]
async fn app_delete_unknown_id_is_204() {
    let fx = fixture().await;
    let res = fx.delete("/apps/3").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn invalid_ids_are_400() {
    let fx = fixture().await;
    let res = fx.get("/apps/abc").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

// -------------------------
// Subscriptions
// -------------------------

#[tokio::test]
async fn list_subscription() {
    let fx = fixture().await;
    let res = fx.get("/subscriptions").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let subs: Vec<Value> = res.json().await.unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0]["user"], fx.user1.id);
}

#[tokio::test]
async fn list_subscription_unauthenticated() {
    let fx = fixture().await;
    let res = fx.client.get(fx.srv.url("/subscriptions")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn subscription_create_integrity_constraint() {
    let fx = fixture().await;
    let res = fx
        .post("/subscriptions", json!({"user": fx.user1.id, "plan": 1, "app": fx.app1, "active": "true"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn subscription_create() {
    let fx = fixture().await;
    let app = create_app(&fx.srv, &fx.client, &fx.user1, "Second App", "Mobile", "ReactNative").await;

    let res = fx
        .post("/subscriptions", json!({"user": fx.user1.id, "plan": 1, "app": app, "active": "true"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let sub: Value = res.json().await.unwrap();
    assert_eq!(sub["active"], true);
    assert_eq!(sub["app"], app);
}

#[tokio::test]
async fn subscription_create_for_foreign_app_is_401() {
    let fx = fixture().await;
    let res = fx
        .post("/subscriptions", json!({"user": fx.user1.id, "plan": 1, "app": fx.app2, "active": "true"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn subscription_create_unknown_plan_is_400() {
    let fx = fixture().await;
    let app = create_app(&fx.srv, &fx.client, &fx.user1, "Third App", "Web", "Django").await;
    let res = fx
        .post("/subscriptions", json!({"user": fx.user1.id, "plan": 42, "app": app}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn subscription_update() {
    let fx = fixture().await;
    let path = format!("/subscriptions/{}", fx.sub1);

    let mut data = fx.retrieve_one(&path).await;
    data["active"] = json!(false);

    let res = fx.put(&path, data).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let sub: Value = res.json().await.unwrap();
    assert_eq!(sub["active"], false);
}

#[tokio::test]
async fn subscription_update_wrong_user_info() {
    let fx = fixture().await;
    let path = format!("/subscriptions/{}", fx.sub1);

    let mut data = fx.retrieve_one(&path).await;
    data["active"] = json!(false);
    data["user"] = json!(fx.user2.id);

    let res = fx.put(&path, data).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn subscription_patch() {
    let fx = fixture().await;
    let path = format!("/subscriptions/{}", fx.sub1);

    let mut data = fx.retrieve_one(&path).await;
    data["active"] = json!(false);
    let obj = data.as_object_mut().unwrap();
    obj.remove("plan");
    obj.remove("app");

    let res = fx.patch(&path, data).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let sub: Value = res.json().await.unwrap();
    assert_eq!(sub["active"], false);
}

#[tokio::test]
async fn subscription_patch_wrong_user_info() {
    let fx = fixture().await;
    let path = format!("/subscriptions/{}", fx.sub1);

    let mut data = fx.retrieve_one(&path).await;
    data["user"] = json!(fx.user2.id);
    let obj = data.as_object_mut().unwrap();
    obj.remove("plan");
    obj.remove("app");

    let res = fx.patch(&path, data).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn subscription_delete_not_allowed() {
    let fx = fixture().await;

    let res = fx.delete(&format!("/subscriptions/{}", fx.sub1)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    let res = fx.delete("/subscriptions/3").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    let res = fx.client.delete(fx.srv.url("/subscriptions/3")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

// -------------------------
// End-to-end ownership scenario
// -------------------------

#[tokio::test]
async fn ownership_scenario() {
    let fx = fixture().await;

    // user2 tries to subscribe user1's app on its own behalf.
    let res = fx
        .client
        .post(fx.srv.url("/subscriptions"))
        .bearer_auth(&fx.user2.token)
        .json(&json!({"user": fx.user2.id, "plan": 1, "app": fx.app1}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Duplicate (user1, app1).
    let res = fx
        .post("/subscriptions", json!({"user": fx.user1.id, "plan": 1, "app": fx.app1}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Owner deletes the app: 204, app gone, subscription kept but inactive.
    let res = fx.delete(&format!("/apps/{}", fx.app1)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = fx.get(&format!("/apps/{}", fx.app1)).send().await.unwrap();
    let list: Vec<Value> = res.json().await.unwrap();
    assert!(list.is_empty());

    let sub = fx.retrieve_one(&format!("/subscriptions/{}", fx.sub1)).await;
    assert_eq!(sub["active"], false);
    assert_eq!(sub["app"], fx.app1);
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
