use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use server::db::AppState;
use server::reasoning::{Completion, ReasoningClient, ReasoningError, Usage};
use server::storage::{ObjectMeta, ObjectStore, PresignedPut, StorageError};
use shared_types::AppConfig;
use sqlx::{Pool, Postgres};
use tokio::sync::Mutex;
use tower::ServiceExt;

/// Global mutex ensuring tests run sequentially against the shared database.
/// Each test acquires this lock before truncating, so concurrent tests cannot
/// wipe each other's rows.
static TEST_MUTEX: std::sync::LazyLock<Mutex<()>> = std::sync::LazyLock::new(|| Mutex::new(()));

pub const PASSWORD: &str = "correct-horse-battery";

/// Everything a test needs: the router, direct pool access for seeding and
/// assertions, and the fakes standing in for S3 and the reasoning service.
/// The guard must live for the whole test.
pub struct TestApp {
    pub router: Router,
    pub pool: Pool<Postgres>,
    pub store: Arc<MemoryStore>,
    pub reasoner: Arc<ScriptedReasoner>,
    pub state: AppState,
    _guard: tokio::sync::MutexGuard<'static, ()>,
}

/// Build a test app backed by a real Postgres pool.
///
/// Returns `None` when neither `TEST_DATABASE_URL` nor `DATABASE_URL` is set,
/// so the suite is skipped rather than failed on machines without a database.
pub async fn test_app() -> Option<TestApp> {
    test_app_with(AppConfig::default()).await
}

/// [`test_app`] with a custom configuration.
pub async fn test_app_with(config: AppConfig) -> Option<TestApp> {
    let guard = TEST_MUTEX.lock().await;

    let _ = dotenvy::dotenv();

    let database_url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()?;

    if std::env::var("JWT_SECRET").map(|s| s.is_empty()).unwrap_or(true) {
        std::env::set_var("JWT_SECRET", "integration-test-secret");
    }

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    sqlx::query("TRUNCATE users, refresh_tokens, cases, documents, case_history, ai_analyses, analysis_requests, subscriptions, usage_tracking CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to truncate");

    let store = Arc::new(MemoryStore::default());
    let reasoner = Arc::new(ScriptedReasoner::default());

    let state = AppState {
        pool: pool.clone(),
        store: store.clone(),
        reasoner: reasoner.clone(),
        jobs: server::analysis::worker::AnalysisJobs::new(),
        config: Arc::new(config),
    };
    let router = server::openapi::build_router(state.clone());

    Some(TestApp {
        router,
        pool,
        store,
        reasoner,
        state,
        _guard: guard,
    })
}

impl TestApp {
    /// Run the analysis worker once, as the background loop would.
    pub async fn run_worker_once(&self) -> Option<uuid::Uuid> {
        server::analysis::worker::process_next(
            &self.pool,
            self.reasoner.as_ref(),
            &self.state.config.analysis,
            "test-worker",
        )
        .await
        .expect("worker step failed")
    }
}

// ── Fakes ────────────────────────────────────────────────────────────

/// In-memory object store. Presigned URLs point nowhere; tests write bytes
/// with [`MemoryStore::insert`] to simulate a client upload.
#[derive(Default)]
pub struct MemoryStore {
    objects: StdMutex<HashMap<String, Vec<u8>>>,
    fail_puts: StdMutex<bool>,
}

impl MemoryStore {
    pub fn insert(&self, key: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn fail_puts(&self) {
        *self.fail_puts.lock().unwrap() = true;
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        "test-bucket"
    }

    fn presign_expiry_secs(&self) -> u64 {
        900
    }

    async fn presign_put(&self, key: &str, content_type: &str) -> Result<PresignedPut, StorageError> {
        let mut required_headers = HashMap::new();
        required_headers.insert("Content-Type".to_string(), content_type.to_string());
        Ok(PresignedPut {
            url: format!("https://storage.test/{key}?signature=put"),
            required_headers,
        })
    }

    async fn presign_get(&self, key: &str) -> Result<String, StorageError> {
        Ok(format!("https://storage.test/{key}?signature=get"))
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError> {
        Ok(self.objects.lock().unwrap().get(key).map(|bytes| ObjectMeta {
            size: Some(bytes.len() as i64),
            version_id: Some("v1".to_string()),
            content_type: None,
        }))
    }

    async fn put(&self, key: &str, _content_type: &str, body: Vec<u8>) -> Result<(), StorageError> {
        if *self.fail_puts.lock().unwrap() {
            return Err(StorageError::Request {
                op: "put_object",
                message: "simulated outage".to_string(),
            });
        }
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Reasoning client that replays queued replies in order. An empty queue
/// answers with a transport error.
#[derive(Default)]
pub struct ScriptedReasoner {
    replies: StdMutex<VecDeque<Result<String, String>>>,
    prompts: StdMutex<Vec<(String, String)>>,
}

impl ScriptedReasoner {
    pub fn reply(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn fail(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    /// `(prompt, context)` pairs seen so far.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningClient for ScriptedReasoner {
    async fn complete(
        &self,
        prompt: &str,
        context: &str,
        _max_tokens: u32,
    ) -> Result<Completion, ReasoningError> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), context.to_string()));
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(Completion {
                text,
                model: "test-model".to_string(),
                usage: Some(Usage {
                    input_tokens: 10,
                    output_tokens: 5,
                }),
            }),
            Some(Err(message)) => Err(ReasoningError::Transport(message)),
            None => Err(ReasoningError::Transport("no scripted reply".to_string())),
        }
    }

    fn model(&self) -> &str {
        "test-model"
    }
}

// ── Requests ─────────────────────────────────────────────────────────

fn builder(method: &str, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let mut b = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        b = b.header("authorization", format!("Bearer {token}"));
    }
    b
}

/// POST JSON, optionally as an authenticated advocate.
pub async fn post_json(app: &Router, uri: &str, body: &Value, token: Option<&str>) -> (StatusCode, Value) {
    let req = builder("POST", uri, token)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

/// POST with no body.
pub async fn post_empty(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    let req = builder("POST", uri, Some(token)).body(Body::empty()).unwrap();
    send(app, req).await
}

pub async fn patch_json(app: &Router, uri: &str, body: &Value, token: &str) -> (StatusCode, Value) {
    let req = builder("PATCH", uri, Some(token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

pub async fn put_json(app: &Router, uri: &str, body: &Value, token: &str) -> (StatusCode, Value) {
    let req = builder("PUT", uri, Some(token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let req = builder("GET", uri, token).body(Body::empty()).unwrap();
    send(app, req).await
}

pub async fn delete(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    let req = builder("DELETE", uri, Some(token)).body(Body::empty()).unwrap();
    send(app, req).await
}

/// POST a multipart form. Each part is `(name, file_name, content)`.
pub async fn post_multipart(
    app: &Router,
    uri: &str,
    parts: &[(&str, Option<&str>, &str)],
    token: &str,
) -> (StatusCode, Value) {
    let boundary = "advocase-test-boundary";
    let mut body = Vec::new();
    for (name, file_name, content) in parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match file_name {
            Some(file) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file}\"\r\nContent-Type: application/pdf\r\n\r\n"
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
        }
        body.extend_from_slice(content.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    let req = builder("POST", uri, Some(token))
        .header("content-type", format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap();
    send(app, req).await
}

/// Send a request through the router and parse the response.
/// An empty body (204) parses as `Value::Null`.
pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(req)
        .await
        .expect("Failed to send request");

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");

    let value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    (status, value)
}

// ── Seeding ──────────────────────────────────────────────────────────

/// Register an advocate and return `(user_id, access_token)`. The account is
/// unverified.
pub async fn register(app: &Router, email: &str) -> (String, String) {
    let (status, body) = post_json(
        app,
        "/api/auth/register",
        &json!({
            "email": email,
            "password": PASSWORD,
            "advocateCode": "KA/1234/2015",
            "advocateName": "Test Advocate",
        }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    (
        body["data"]["user"]["id"].as_str().unwrap().to_string(),
        body["data"]["accessToken"].as_str().unwrap().to_string(),
    )
}

pub async fn login(app: &Router, email: &str) -> Value {
    let (status, body) = post_json(
        app,
        "/api/auth/login",
        &json!({ "email": email, "password": PASSWORD }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["data"].clone()
}

/// Register, mark verified, and log in again so the token carries the flag.
/// Returns `(user_id, access_token)`.
pub async fn verified_advocate(app: &TestApp, email: &str) -> (String, String) {
    let (id, _) = register(&app.router, email).await;
    sqlx::query("UPDATE users SET is_verified = TRUE WHERE email = $1")
        .bind(email)
        .execute(&app.pool)
        .await
        .unwrap();
    let session = login(&app.router, email).await;
    (id, session["accessToken"].as_str().unwrap().to_string())
}

/// Register an admin and return its access token.
pub async fn admin(app: &TestApp, email: &str) -> String {
    register(&app.router, email).await;
    sqlx::query("UPDATE users SET role = 'ADMIN', is_verified = TRUE WHERE email = $1")
        .bind(email)
        .execute(&app.pool)
        .await
        .unwrap();
    login(&app.router, email).await["accessToken"]
        .as_str()
        .unwrap()
        .to_string()
}

pub fn case_body(efiling_number: &str) -> Value {
    json!({
        "efilingNumber": efiling_number,
        "caseType": "WP",
        "caseYear": 2024,
        "partyRole": "PETITIONER",
        "petitionerName": "Ramesh Kumar",
        "respondentName": "State of Karnataka",
        "efilingDate": "2024-03-11",
    })
}

/// Create a case and return its id.
pub async fn create_case(app: &Router, token: &str, efiling_number: &str) -> String {
    let (status, body) = post_json(app, "/api/cases", &case_body(efiling_number), Some(token)).await;
    assert_eq!(status, StatusCode::CREATED, "create case failed: {body}");
    body["data"]["id"].as_str().unwrap().to_string()
}

/// Initiate an upload and return `(document_id, s3_key)`.
pub async fn initiate_upload(app: &TestApp, token: &str, case_id: &str, file_name: &str) -> (String, String) {
    let (status, body) = post_json(
        &app.router,
        &format!("/api/cases/{case_id}/documents"),
        &json!({
            "fileName": file_name,
            "contentType": "application/pdf",
            "fileSize": 1024,
            "category": "CASE_FILE",
        }),
        Some(token),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "initiate failed: {body}");
    let id = body["data"]["document"]["id"].as_str().unwrap().to_string();
    let key: String = sqlx::query_scalar("SELECT s3_key FROM documents WHERE id = $1::uuid")
        .bind(&id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    (id, key)
}

/// A completed document with OCR text, ready for analysis or chat.
pub async fn document_with_text(app: &TestApp, token: &str, case_id: &str, text: &str) -> String {
    let (id, key) = initiate_upload(app, token, case_id, "petition.pdf").await;
    app.store.insert(&key, b"%PDF-1.7 test");
    let (status, body) = post_empty(&app.router, &format!("/api/documents/{id}/confirm"), token).await;
    assert_eq!(status, StatusCode::OK, "confirm failed: {body}");

    for step in ["ocr/request", "ocr/start"] {
        let (status, body) = post_json(
            &app.router,
            &format!("/api/documents/{id}/{step}"),
            &json!({}),
            Some(token),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{step} failed: {body}");
    }
    let (status, body) = post_json(
        &app.router,
        &format!("/api/documents/{id}/ocr/complete"),
        &json!({ "extractedText": text, "confidence": 0.93 }),
        Some(token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "ocr complete failed: {body}");
    id
}

pub const ANALYSIS_REPLY: &str = r#"{
  "schemaVersion": 1,
  "caseTypeClassification": "Writ Petition (Civil)",
  "keyLegalIssues": ["Arbitrary cancellation of tender"],
  "relevantStatutes": ["Article 14, Constitution of India"],
  "precedentCases": [],
  "actionItems": ["File rejoinder"],
  "urgencyLevel": "HIGH",
  "deadlineReminders": [],
  "caseSummary": "Challenge to a tender cancellation.",
  "strengths": [],
  "weaknesses": [],
  "recommendations": []
}"#;
