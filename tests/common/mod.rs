#![allow(dead_code)]

use std::{path::Path, sync::Arc};

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{Request, StatusCode},
    routing::post,
};
use clap::Parser;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tower::ServiceExt;

use dishlens::{AppState, build_app, config::Config};

pub const IDENTIFY_PROMPT: &str = "SYSTEM:IDENTIFY";
pub const DESCRIBE_PROMPT: &str = "SYSTEM:DESCRIBE";
pub const RECIPE_PROMPT: &str = "SYSTEM:RECIPE";
pub const CHEF_PROMPT: &str = "SYSTEM:CHEF";
pub const SECRET: &str = "s3cr3t-value";
pub const HOSTED_URL: &str = "https://res.cloudinary.test/demo/image/upload/dishes/pic.jpg";

/// What the mock answers for one kind of call.
#[derive(Clone, Debug)]
pub enum Reply {
    /// 200 chat envelope whose message content is this string.
    Content(String),
    /// Bare status with a short error body.
    Status(u16),
}

impl Reply {
    pub fn json(v: &Value) -> Self {
        Self::Content(v.to_string())
    }
}

#[derive(Clone, Debug)]
pub struct Script {
    pub upload: Result<String, (u16, String)>,
    pub identify: Reply,
    pub describe: Reply,
    pub healthy: Reply,
    pub mimic: Reply,
    pub chef: Reply,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            upload: Ok(HOSTED_URL.to_string()),
            identify: Reply::json(&json!({ "title": "Chicken Tikka Masala" })),
            describe: Reply::Content(
                "  A creamy, spiced tomato curry with charred chicken. It is orange-red and fragrant.  "
                    .into(),
            ),
            healthy: Reply::json(&sample_recipe("Light Tikka Masala")),
            mimic: Reply::json(&sample_recipe("Restaurant Tikka Masala")),
            chef: Reply::Content("Use Greek yogurt instead of cream.".into()),
        }
    }
}

pub fn sample_recipe(title: &str) -> Value {
    json!({
        "title": title,
        "ingredients": ["500 g chicken thighs", "200 ml yogurt"],
        "instructions": ["Marinate the chicken.", "Grill and simmer in sauce."],
        "servings": 4,
        "prepTime": "20 minutes",
        "cookTime": "35 minutes",
        "nutrition": { "calories": 420, "protein": "38g", "carbs": "14g", "fat": "18g" }
    })
}

#[derive(Default, Debug)]
pub struct Recorded {
    /// Call names in arrival order: upload, identify, describe, healthy, mimic, chef.
    pub calls: Vec<String>,
    pub bodies: Vec<Value>,
    pub upload_bodies: Vec<Bytes>,
}

#[derive(Clone)]
struct MockState {
    script: Arc<Script>,
    recorded: Arc<Mutex<Recorded>>,
}

/// In-process stand-in for both the asset host and the inference provider.
pub struct MockUpstream {
    pub base: String,
    pub recorded: Arc<Mutex<Recorded>>,
}

impl MockUpstream {
    pub async fn start(script: Script) -> Self {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let state = MockState {
            script: Arc::new(script),
            recorded: recorded.clone(),
        };

        let app = Router::new()
            .route("/v1_1/{cloud}/image/upload", post(upload))
            .route("/v1/chat/completions", post(chat))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            recorded,
        }
    }

    pub async fn calls(&self) -> Vec<String> {
        self.recorded.lock().await.calls.clone()
    }

    pub async fn chat_bodies(&self) -> Vec<Value> {
        self.recorded.lock().await.bodies.clone()
    }

    pub async fn upload_bodies(&self) -> Vec<Bytes> {
        self.recorded.lock().await.upload_bodies.clone()
    }
}

async fn upload(State(st): State<MockState>, body: Bytes) -> (StatusCode, Json<Value>) {
    let mut rec = st.recorded.lock().await;
    rec.calls.push("upload".into());
    rec.upload_bodies.push(body);
    match &st.script.upload {
        Ok(url) => (StatusCode::OK, Json(json!({ "secure_url": url, "public_id": "x" }))),
        Err((code, msg)) => (
            StatusCode::from_u16(*code).unwrap(),
            Json(json!({ "error": { "message": msg } })),
        ),
    }
}

fn text_of(msg: &Value) -> String {
    match &msg["content"] {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

async fn chat(State(st): State<MockState>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let system = body["messages"][0]["content"].as_str().unwrap_or_default().to_string();
    let user = body["messages"]
        .as_array()
        .and_then(|m| m.last())
        .map(text_of)
        .unwrap_or_default();

    let unexpected = Reply::Status(418);
    let (name, reply) = if system == IDENTIFY_PROMPT {
        ("identify", &st.script.identify)
    } else if system == DESCRIBE_PROMPT {
        ("describe", &st.script.describe)
    } else if system == RECIPE_PROMPT && user.contains("healthier") {
        ("healthy", &st.script.healthy)
    } else if system == RECIPE_PROMPT {
        ("mimic", &st.script.mimic)
    } else if system.starts_with(CHEF_PROMPT) {
        ("chef", &st.script.chef)
    } else {
        ("unexpected", &unexpected)
    };

    let mut rec = st.recorded.lock().await;
    rec.calls.push(name.into());
    rec.bodies.push(body.clone());

    match reply {
        Reply::Content(c) => (
            StatusCode::OK,
            Json(json!({ "choices": [ { "message": { "role": "assistant", "content": c } } ] })),
        ),
        Reply::Status(code) => (
            StatusCode::from_u16(*code).unwrap(),
            Json(json!({ "error": { "message": "scripted failure" } })),
        ),
    }
}

pub fn test_config(upstream: &str, scratch: &Path) -> Config {
    let asset_url = format!("{upstream}/v1_1");
    let llm_url = format!("{upstream}/v1");
    let scratch = scratch.to_string_lossy().to_string();
    Config::try_parse_from([
        "dishlens",
        "--openai-api-key",
        "sk-test",
        "--llm-api-url",
        llm_url.as_str(),
        "--asset-api-url",
        asset_url.as_str(),
        "--cloudinary-cloud-name",
        "demo",
        "--cloudinary-api-key",
        "key-123",
        "--cloudinary-api-secret",
        SECRET,
        "--scratch-dir",
        scratch.as_str(),
        "--identify-timeout-secs",
        "5",
        "--recipe-timeout-secs",
        "5",
        "--upload-timeout-secs",
        "5",
        "--system-prompt-identify",
        IDENTIFY_PROMPT,
        "--system-prompt-describe",
        DESCRIBE_PROMPT,
        "--system-prompt-recipe",
        RECIPE_PROMPT,
        "--system-prompt-chef",
        CHEF_PROMPT,
    ])
    .unwrap()
}

pub struct TestCtx {
    pub scratch: tempfile::TempDir,
    pub upstream: MockUpstream,
    pub app: Router,
}

impl TestCtx {
    pub async fn new(script: Script) -> Self {
        Self::with_config(script, |_| {}).await
    }

    pub async fn with_config(script: Script, tweak: impl FnOnce(&mut Config)) -> Self {
        let scratch = tempfile::tempdir().unwrap();
        let upstream = MockUpstream::start(script).await;
        let mut config = test_config(&upstream.base, scratch.path());
        tweak(&mut config);
        let app = build_app(AppState::from_config(config).unwrap());
        Self {
            scratch,
            upstream,
            app,
        }
    }

    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }
}

pub async fn json_req(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| json!({"_raw": String::from_utf8_lossy(&bytes)}))
    };
    (status, body)
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// A few bytes of "photo", base64 encoded.
pub fn photo_b64() -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.encode(b"\xff\xd8\xff\xe0fake-jpeg-bytes")
}
