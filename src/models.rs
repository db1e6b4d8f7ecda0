use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

use crate::{cloudinary::AssetHost, config::Config, llm::ChatMessage, llm::LlmClient, recipe::Recipe};

/* ---------- App state ---------- */

/// Read-only after startup; cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http: reqwest::Client,
    pub llm: LlmClient,
    pub assets: AssetHost,
}

impl AppState {
    /// # Errors
    ///
    /// Returns an error if the outbound HTTP client cannot be built.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("dishlens/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let llm = LlmClient::new(
            config.llm_api_url.clone(),
            config.openai_api_key.clone().unwrap_or_default(),
            config.llm_model.clone(),
        );
        let assets = AssetHost::from_config(&config);
        Ok(Self {
            config: Arc::new(config),
            http,
            llm,
            assets,
        })
    }
}

/* ---------- API models ---------- */

#[derive(Deserialize, Debug, Default)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    /// Optional client-chosen asset id; generated when absent.
    #[serde(default)]
    pub public_id: Option<String>,
    #[serde(default)]
    pub folder: Option<String>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DishAnalysis {
    pub title: String,
    pub description: String,
    pub healthy_recipe: Recipe,
    pub mimic_recipe: Recipe,
    pub image_url: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum AnalyzeResponse {
    Analyzed(DishAnalysis),
    /// Tells the client to ask the user what the dish is.
    Unknown { trigger: &'static str },
}

impl AnalyzeResponse {
    #[must_use]
    pub const fn unknown() -> Self {
        Self::Unknown { trigger: "unknown" }
    }
}

/// Raw signature request; values are checked key by key so every missing
/// key can be reported at once.
pub type SignatureRequest = Map<String, JsonValue>;

#[derive(Serialize, Debug)]
pub struct SignatureResponse {
    pub signature: String,
    pub timestamp: JsonValue,
    pub api_key: String,
    pub cloud_name: String,
    pub folder: JsonValue,
    pub public_id: JsonValue,
    pub upload_preset: JsonValue,
}

#[derive(Deserialize, Debug)]
pub struct ChefRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct ChefReply {
    pub reply: String,
}
