//! Integration tests for the field-sales backend.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::storage::{FsStore, ObjectStore};
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    repo: Arc<Repository>,
    storage_dir: PathBuf,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");
        let storage_dir = temp_dir.path().join("storage");

        // Bind first so the local store can sign URLs for the real port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        let store: Arc<dyn ObjectStore> =
            Arc::new(FsStore::new(storage_dir.clone(), base_url.clone()));

        let config = Config {
            db_path,
            bind_addr: addr,
            log_level: "warn".to_string(),
            auth_secret: "test-auth-secret".to_string(),
            token_ttl_secs: 3600,
            bootstrap_secret: Some("bootstrap-secret".to_string()),
            s3_bucket: None,
            storage_dir: storage_dir.clone(),
            public_base_url: base_url.clone(),
        };

        let state = AppState {
            repo: repo.clone(),
            store,
            config: Arc::new(config),
        };

        let app = create_router(state);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            repo,
            storage_dir,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Bootstrap the first RBM and return their session token.
    async fn bootstrap_rbm(&self) -> String {
        let resp = self
            .client
            .post(self.url("/api/users/bootstrap"))
            .json(&json!({
                "secret": "bootstrap-secret",
                "name": "Root RBM",
                "mobile": "9000000001",
                "password": "rbm-pass"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["data"]["empId"], "RBM001");

        self.login("RBM001", "rbm-pass").await
    }

    /// Log in and return the session token.
    async fn login(&self, emp_id: &str, password: &str) -> String {
        let resp = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "empId": emp_id, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]["token"].as_str().unwrap().to_string()
    }

    /// Create a subordinate as `token`, asserting success, and return the
    /// issued employee ID.
    async fn create_subordinate(&self, token: &str, name: &str, role: &str) -> String {
        let resp = self
            .client
            .post(self.url("/api/users"))
            .bearer_auth(token)
            .json(&json!({
                "name": name,
                "role": role,
                "password": "sub-pass"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201, "creating {} as {}", role, name);
        let body: Value = resp.json().await.unwrap();
        body["data"]["empId"].as_str().unwrap().to_string()
    }

    /// The authenticated user's ID.
    async fn my_id(&self, token: &str) -> String {
        let resp = self
            .client
            .get(self.url("/api/users/me"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Upload bytes through the presign flow; returns the storage key.
    async fn upload(&self, token: &str, filename: &str, bytes: &[u8]) -> String {
        let resp = self
            .client
            .post(self.url("/api/uploads/presign"))
            .bearer_auth(token)
            .json(&json!({ "filename": filename, "contentType": "image/jpeg" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        let url = body["data"]["url"].as_str().unwrap().to_string();
        let key = body["data"]["key"].as_str().unwrap().to_string();

        let put_resp = self
            .client
            .put(url.as_str())
            .bearer_auth(token)
            .header("content-type", "image/jpeg")
            .body(bytes.to_vec())
            .send()
            .await
            .unwrap();
        assert_eq!(put_resp.status(), 200);

        key
    }
}

/// A fully built RBM -> AM -> TM -> MDO chain with one token per level.
struct Chain {
    rbm_token: String,
    am_token: String,
    tm_token: String,
    mdo_token: String,
    am_id: String,
    tm_id: String,
    mdo_id: String,
}

async fn build_chain(fixture: &TestFixture) -> Chain {
    let rbm_token = fixture.bootstrap_rbm().await;
    let am_emp = fixture
        .create_subordinate(&rbm_token, "Area One", "AreaManager")
        .await;
    let am_token = fixture.login(&am_emp, "sub-pass").await;
    let tm_emp = fixture
        .create_subordinate(&am_token, "Territory One", "TerritoryManager")
        .await;
    let tm_token = fixture.login(&tm_emp, "sub-pass").await;
    let mdo_emp = fixture
        .create_subordinate(&tm_token, "Mdo One", "MDO")
        .await;
    let mdo_token = fixture.login(&mdo_emp, "sub-pass").await;

    let am_id = fixture.my_id(&am_token).await;
    let tm_id = fixture.my_id(&tm_token).await;
    let mdo_id = fixture.my_id(&mdo_token).await;

    Chain {
        rbm_token,
        am_token,
        tm_token,
        mdo_token,
        am_id,
        tm_id,
        mdo_id,
    }
}

fn special_activity(expense: f64) -> Value {
    json!({
        "farmerName": "Shankar Patil",
        "farmerMobile": "9876543210",
        "village": "Ambewadi",
        "taluka": "Karad",
        "district": "Satara",
        "cropOrHybrid": "Cotton BT",
        "farmersInvolved": 12,
        "activityType": "Special",
        "tentativeExpense": expense,
        "photos": []
    })
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_bootstrap_and_login() {
    let fixture = TestFixture::new().await;

    // Wrong secret is rejected before anything else
    let resp = fixture
        .client
        .post(fixture.url("/api/users/bootstrap"))
        .json(&json!({
            "secret": "wrong",
            "name": "Impostor",
            "password": "x"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let rbm_token = fixture.bootstrap_rbm().await;
    assert!(!rbm_token.is_empty());

    // A second bootstrap conflicts
    let resp = fixture
        .client
        .post(fixture.url("/api/users/bootstrap"))
        .json(&json!({
            "secret": "bootstrap-secret",
            "name": "Second RBM",
            "password": "x"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "CONFLICT");

    // Bad credentials
    let resp = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .json(&json!({ "empId": "RBM001", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .json(&json!({ "empId": "ZZ9999", "password": "whatever" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_unauthenticated_requests_rejected() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/activities"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = fixture
        .client
        .get(fixture.url("/api/activities"))
        .bearer_auth("garbage-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_role_chain_enforcement() {
    let fixture = TestFixture::new().await;
    let rbm_token = fixture.bootstrap_rbm().await;

    // RBM may only create AreaManagers
    for forbidden in ["RBM", "TerritoryManager", "MDO"] {
        let resp = fixture
            .client
            .post(fixture.url("/api/users"))
            .bearer_auth(&rbm_token)
            .json(&json!({ "name": "X", "role": forbidden, "password": "p" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 403, "RBM creating {}", forbidden);
    }

    let am_emp = fixture
        .create_subordinate(&rbm_token, "Area One", "AreaManager")
        .await;
    assert_eq!(am_emp, "AM0001");
    let am_token = fixture.login(&am_emp, "sub-pass").await;

    // AreaManager may only create TerritoryManagers
    let resp = fixture
        .client
        .post(fixture.url("/api/users"))
        .bearer_auth(&am_token)
        .json(&json!({ "name": "X", "role": "MDO", "password": "p" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let tm_emp = fixture
        .create_subordinate(&am_token, "Territory One", "TerritoryManager")
        .await;
    assert_eq!(tm_emp, "TM0001");
    let tm_token = fixture.login(&tm_emp, "sub-pass").await;

    let mdo_emp = fixture
        .create_subordinate(&tm_token, "Mdo One", "MDO")
        .await;
    assert_eq!(mdo_emp, "MDO0001");
    let mdo_token = fixture.login(&mdo_emp, "sub-pass").await;

    // MDOs are leaves
    for forbidden in ["RBM", "AreaManager", "TerritoryManager", "MDO"] {
        let resp = fixture
            .client
            .post(fixture.url("/api/users"))
            .bearer_auth(&mdo_token)
            .json(&json!({ "name": "X", "role": forbidden, "password": "p" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 403, "MDO creating {}", forbidden);
    }
}

#[tokio::test]
async fn test_concurrent_user_creation_yields_distinct_emp_ids() {
    let fixture = TestFixture::new().await;
    let rbm_token = fixture.bootstrap_rbm().await;

    let mut handles = Vec::new();
    for i in 0..5 {
        let client = fixture.client.clone();
        let url = fixture.url("/api/users");
        let token = rbm_token.clone();
        handles.push(tokio::spawn(async move {
            let resp = client
                .post(&url)
                .bearer_auth(&token)
                .json(&json!({
                    "name": format!("Area {}", i),
                    "role": "AreaManager",
                    "password": "p"
                }))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 201);
            let body: Value = resp.json().await.unwrap();
            body["data"]["empId"].as_str().unwrap().to_string()
        }));
    }

    let mut emp_ids: Vec<String> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|h| h.unwrap())
        .collect();
    emp_ids.sort();
    emp_ids.dedup();
    assert_eq!(emp_ids.len(), 5);
    // Monotonic and gap-free from the starting value
    assert_eq!(
        emp_ids,
        vec!["AM0001", "AM0002", "AM0003", "AM0004", "AM0005"]
    );
}

#[tokio::test]
async fn test_activity_validation() {
    let fixture = TestFixture::new().await;
    let rbm_token = fixture.bootstrap_rbm().await;

    // Special without tentativeExpense
    let mut body = special_activity(500.0);
    body.as_object_mut().unwrap().remove("tentativeExpense");
    let resp = fixture
        .client
        .post(fixture.url("/api/activities"))
        .bearer_auth(&rbm_token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["error"]["code"], "VALIDATION_ERROR");

    // General without contactType
    let mut body = special_activity(500.0);
    body["activityType"] = json!("General");
    body.as_object_mut().unwrap().remove("tentativeExpense");
    let resp = fixture
        .client
        .post(fixture.url("/api/activities"))
        .bearer_auth(&rbm_token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Missing required farmer name
    let mut body = special_activity(500.0);
    body["farmerName"] = json!("");
    let resp = fixture
        .client
        .post(fixture.url("/api/activities"))
        .bearer_auth(&rbm_token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Valid Special activity is created already published
    let resp = fixture
        .client
        .post(fixture.url("/api/activities"))
        .bearer_auth(&rbm_token)
        .json(&special_activity(500.0))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["data"]["isPublished"], true);
    assert!(created["data"]["publishedAt"].is_string());
    assert_eq!(created["data"]["tentativeExpense"], 500.0);

    // Valid General activity with contact type
    let mut body = special_activity(0.0);
    body["activityType"] = json!("General");
    body["contactType"] = json!("Calling");
    body.as_object_mut().unwrap().remove("tentativeExpense");
    let resp = fixture
        .client
        .post(fixture.url("/api/activities"))
        .bearer_auth(&rbm_token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
}

#[tokio::test]
async fn test_team_scope_and_expense_redaction() {
    let fixture = TestFixture::new().await;
    let chain = build_chain(&fixture).await;

    // MDO logs a Special activity with an expense
    let resp = fixture
        .client
        .post(fixture.url("/api/activities"))
        .bearer_auth(&chain.mdo_token)
        .json(&special_activity(750.0))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // Creator sees their own expense
    let resp = fixture
        .client
        .get(fixture.url("/api/activities"))
        .bearer_auth(&chain.mdo_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"][0]["tentativeExpense"], 750.0);

    // TM team view includes the MDO's activity but strips the expense
    let resp = fixture
        .client
        .get(fixture.url("/api/activities?scope=team"))
        .bearer_auth(&chain.tm_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let activities = body["data"].as_array().unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0]["creatorId"], chain.mdo_id.as_str());
    assert!(activities[0].get("tentativeExpense").is_none());

    // RBM team view spans the whole subtree and keeps the expense
    let resp = fixture
        .client
        .get(fixture.url("/api/activities?scope=team"))
        .bearer_auth(&chain.rbm_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"][0]["tentativeExpense"], 750.0);

    // Direct manager may view by userId
    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/activities?userId={}", chain.mdo_id)))
        .bearer_auth(&chain.tm_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Grandparent manager is not a direct manager and not RBM
    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/activities?userId={}", chain.mdo_id)))
        .bearer_auth(&chain.am_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Subordinates cannot look upward
    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/activities?userId={}", chain.tm_id)))
        .bearer_auth(&chain.mdo_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_cascade_delete_scenario() {
    let fixture = TestFixture::new().await;
    let chain = build_chain(&fixture).await;

    // MDO uploads a photo, logs an activity with it, and files a plan
    let key = fixture
        .upload(&chain.mdo_token, "field.jpg", b"jpeg-bytes")
        .await;
    let mut activity = special_activity(300.0);
    activity["photos"] = json!([key]);
    let resp = fixture
        .client
        .post(fixture.url("/api/activities"))
        .bearer_auth(&chain.mdo_token)
        .json(&activity)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = fixture
        .client
        .post(fixture.url("/api/daily-plans"))
        .bearer_auth(&chain.mdo_token)
        .json(&json!({ "villages": ["Ambewadi"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // RBM's team view includes the MDO's activity
    let resp = fixture
        .client
        .get(fixture.url("/api/activities?scope=team"))
        .bearer_auth(&chain.rbm_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Non-RBM cannot cascade-delete
    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/users/{}", chain.tm_id)))
        .bearer_auth(&chain.am_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // RBM deletes the AreaManager: the whole subtree goes with them
    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/users/{}", chain.am_id)))
        .bearer_auth(&chain.rbm_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    for id in [&chain.am_id, &chain.tm_id, &chain.mdo_id] {
        let resp = fixture
            .client
            .get(fixture.url(&format!("/api/users/{}", id)))
            .bearer_auth(&chain.rbm_token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    // Deleted users' sessions die with them
    let resp = fixture
        .client
        .get(fixture.url("/api/users/me"))
        .bearer_auth(&chain.mdo_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Their activities are gone from the team view
    let resp = fixture
        .client
        .get(fixture.url("/api/activities?scope=team"))
        .bearer_auth(&chain.rbm_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());

    // The stored photo object was released
    assert!(!fixture.storage_dir.join(&key).exists());
}

#[tokio::test]
async fn test_daily_plans() {
    let fixture = TestFixture::new().await;
    let chain = build_chain(&fixture).await;

    // Villages are required
    let resp = fixture
        .client
        .post(fixture.url("/api/daily-plans"))
        .bearer_auth(&chain.mdo_token)
        .json(&json!({ "villages": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Two plans on the same day both persist
    for villages in [vec!["Ambewadi", "Shirgaon"], vec!["Karad"]] {
        let resp = fixture
            .client
            .post(fixture.url("/api/daily-plans"))
            .bearer_auth(&chain.mdo_token)
            .json(&json!({ "villages": villages, "remarks": "demo day" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    let resp = fixture
        .client
        .get(fixture.url("/api/daily-plans"))
        .bearer_auth(&chain.mdo_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let plans = body["data"].as_array().unwrap();
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0]["date"], plans[1]["date"]);
    let plan_id = plans[0]["id"].as_str().unwrap().to_string();

    // Direct manager can list, subordinate cannot look upward
    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/daily-plans?userId={}", chain.mdo_id)))
        .bearer_auth(&chain.tm_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/daily-plans?userId={}", chain.tm_id)))
        .bearer_auth(&chain.mdo_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Nobody but the owner deletes a plan, not even RBM
    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/daily-plans/{}", plan_id)))
        .bearer_auth(&chain.rbm_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/daily-plans/{}", plan_id)))
        .bearer_auth(&chain.mdo_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .get(fixture.url("/api/daily-plans"))
        .bearer_auth(&chain.mdo_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_round_trip() {
    let fixture = TestFixture::new().await;
    let rbm_token = fixture.bootstrap_rbm().await;

    let key = fixture
        .upload(&rbm_token, "portrait.jpg", b"image-bytes-here")
        .await;
    assert!(key.starts_with("uploads/"));

    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/images/{}", key)))
        .bearer_auth(&rbm_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "image/jpeg"
    );
    assert_eq!(
        resp.headers().get("cache-control").unwrap(),
        "public, max-age=31536000, immutable"
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"image-bytes-here");

    // Unauthenticated image reads are rejected
    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/images/{}", key)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Missing objects are a 404
    let resp = fixture
        .client
        .get(fixture.url("/api/images/uploads/nobody/1-missing.jpg"))
        .bearer_auth(&rbm_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_portfolios() {
    let fixture = TestFixture::new().await;
    let chain = build_chain(&fixture).await;

    // Only RBM creates portfolios
    let resp = fixture
        .client
        .post(fixture.url("/api/portfolios"))
        .bearer_auth(&chain.am_token)
        .json(&json!({ "name": "Kharif 2025", "images": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let key1 = fixture.upload(&chain.rbm_token, "one.jpg", b"one").await;
    let key2 = fixture.upload(&chain.rbm_token, "two.jpg", b"two").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/portfolios"))
        .bearer_auth(&chain.rbm_token)
        .json(&json!({ "name": "Kharif 2025", "images": [key1, key2] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let portfolio_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["images"].as_array().unwrap().len(), 2);

    // Everyone authenticated can read them
    let resp = fixture
        .client
        .get(fixture.url("/api/portfolios"))
        .bearer_auth(&chain.mdo_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Dropping an image from the set releases its stored object
    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/portfolios/{}", portfolio_id)))
        .bearer_auth(&chain.rbm_token)
        .json(&json!({ "name": "Kharif 2025", "images": [key2] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(!fixture.storage_dir.join(&key1).exists());
    assert!(fixture.storage_dir.join(&key2).exists());

    // Deleting the portfolio releases the rest
    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/portfolios/{}", portfolio_id)))
        .bearer_auth(&chain.rbm_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(!fixture.storage_dir.join(&key2).exists());

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/portfolios/{}", portfolio_id)))
        .bearer_auth(&chain.rbm_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_activity_update_and_delete_are_rbm_only() {
    let fixture = TestFixture::new().await;
    let chain = build_chain(&fixture).await;

    let resp = fixture
        .client
        .post(fixture.url("/api/activities"))
        .bearer_auth(&chain.mdo_token)
        .json(&special_activity(200.0))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let activity_id = body["data"]["id"].as_str().unwrap().to_string();

    // Even the creator cannot edit after publishing
    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/activities/{}", activity_id)))
        .bearer_auth(&chain.mdo_token)
        .json(&json!({ "village": "Edited" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/activities/{}", activity_id)))
        .bearer_auth(&chain.rbm_token)
        .json(&json!({ "village": "Shirgaon", "photos": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["village"], "Shirgaon");

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/activities/{}", activity_id)))
        .bearer_auth(&chain.tm_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/activities/{}", activity_id)))
        .bearer_auth(&chain.rbm_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/activities/{}", activity_id)))
        .bearer_auth(&chain.rbm_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_team_stats_roll_up() {
    let fixture = TestFixture::new().await;
    let chain = build_chain(&fixture).await;

    // One activity at each of two levels
    for token in [&chain.mdo_token, &chain.tm_token] {
        let resp = fixture
            .client
            .post(fixture.url("/api/activities"))
            .bearer_auth(token)
            .json(&special_activity(100.0))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    let resp = fixture
        .client
        .get(fixture.url(&format!(
            "/api/analytics/team-stats?managerId={}",
            chain.am_id
        )))
        .bearer_auth(&chain.rbm_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["breakdown"]["MDO"], 1);
    assert_eq!(body["data"]["breakdown"]["TerritoryManager"], 1);
    assert_eq!(body["data"]["breakdown"]["AreaManager"], 0);

    let resp = fixture
        .client
        .get(fixture.url("/api/analytics/team-stats?managerId=no-such-user"))
        .bearer_auth(&chain.rbm_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_orphan_cleanup() {
    let fixture = TestFixture::new().await;
    let chain = build_chain(&fixture).await;

    // Strand the TM subtree by removing the AM row without cascading,
    // simulating a crash mid-walk.
    fixture.repo.delete_user(&chain.am_id).await.unwrap();

    // Only RBM may run the sweep
    let resp = fixture
        .client
        .post(fixture.url("/api/admin/cleanup-orphans"))
        .bearer_auth(&chain.tm_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = fixture
        .client
        .post(fixture.url("/api/admin/cleanup-orphans"))
        .bearer_auth(&chain.rbm_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["orphansFound"], 1);
    assert_eq!(body["data"]["deletedCount"], 1);

    for id in [&chain.tm_id, &chain.mdo_id] {
        let resp = fixture
            .client
            .get(fixture.url(&format!("/api/users/{}", id)))
            .bearer_auth(&chain.rbm_token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    // A second sweep finds nothing
    let resp = fixture
        .client
        .post(fixture.url("/api/admin/cleanup-orphans"))
        .bearer_auth(&chain.rbm_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["orphansFound"], 0);
}

#[tokio::test]
async fn test_profile_self_service() {
    let fixture = TestFixture::new().await;
    let chain = build_chain(&fixture).await;

    // Self view includes the manager join
    let resp = fixture
        .client
        .get(fixture.url("/api/users/me"))
        .bearer_auth(&chain.am_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["empId"], "AM0001");
    assert_eq!(body["data"]["manager"]["role"], "RBM");
    assert_eq!(body["data"]["manager"]["name"], "Root RBM");

    // Update name, mobile, and password; the profile picture comes from
    // an uploaded key and resolves to a URL on read.
    let pic_key = fixture.upload(&chain.am_token, "me.jpg", b"selfie").await;
    let resp = fixture
        .client
        .put(fixture.url("/api/users/me"))
        .bearer_auth(&chain.am_token)
        .json(&json!({
            "name": "Area One Renamed",
            "mobile": "9111111111",
            "password": "new-pass",
            "profilePicKey": pic_key
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["name"], "Area One Renamed");
    assert!(body["data"]["profilePicUrl"]
        .as_str()
        .unwrap()
        .contains("/api/images/"));

    // Old password is dead, new one works
    let resp = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .json(&json!({ "empId": "AM0001", "password": "sub-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    fixture.login("AM0001", "new-pass").await;
}

#[tokio::test]
async fn test_team_listing() {
    let fixture = TestFixture::new().await;
    let chain = build_chain(&fixture).await;

    // Default: own direct reports
    let resp = fixture
        .client
        .get(fixture.url("/api/users/team"))
        .bearer_auth(&chain.rbm_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let team = body["data"].as_array().unwrap();
    assert_eq!(team.len(), 1);
    assert_eq!(team[0]["empId"], "AM0001");
    // The password hash never leaves the server
    assert!(team[0].get("passwordHash").is_none());

    // Explicit managerId
    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/users/team?managerId={}", chain.tm_id)))
        .bearer_auth(&chain.rbm_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"][0]["empId"], "MDO0001");
}
