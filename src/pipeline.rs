//! The inference sequence run after the photo is hosted:
//! identify -> (early exit on unknown) -> describe -> healthy recipe -> mimic recipe.

use std::fmt::Write as _;

use crate::{
    dish::{self, UNKNOWN_DISH},
    error::UpstreamError,
    llm::{ChatMessage, ImageChatRequest},
    models::{AnalyzeResponse, AppState, DishAnalysis},
    recipe::{Recipe, RecipeVariant},
};

pub const NO_DESCRIPTION: &str = "No description available.";

/// Outcome of one inference call: the real answer, or the fallback used in
/// its place together with the reason.
#[derive(Debug)]
pub enum Step<T> {
    Fresh(T),
    Fallback(T, UpstreamError),
}

impl<T> Step<T> {
    fn settle(step: &'static str, res: Result<T, UpstreamError>, fallback: impl FnOnce() -> T) -> Self {
        match res {
            Ok(v) => Self::Fresh(v),
            Err(e) => {
                tracing::warn!(step, error = %e, "inference step failed, using fallback");
                Self::Fallback(fallback(), e)
            }
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Fresh(v) | Self::Fallback(v, _) => v,
        }
    }
}

/// Runs the whole sequence for an already-hosted photo.
pub async fn analyze(state: &AppState, image_url: String, caption: Option<&str>) -> AnalyzeResponse {
    let title = identify(state, &image_url, caption).await.into_value();
    if dish::is_unknown(&title) {
        tracing::info!(image_url = %image_url, "dish not identified, asking the client");
        return AnalyzeResponse::unknown();
    }
    tracing::info!(dish = %title, "dish identified");

    let description = describe(state, &title, caption).await.into_value();
    let healthy_recipe = recipe(state, &title, RecipeVariant::Healthy).await.into_value();
    let mimic_recipe = recipe(state, &title, RecipeVariant::Mimic).await.into_value();

    AnalyzeResponse::Analyzed(DishAnalysis {
        title,
        description,
        healthy_recipe,
        mimic_recipe,
        image_url,
    })
}

pub async fn identify(state: &AppState, image_url: &str, caption: Option<&str>) -> Step<String> {
    let mut prompt = String::new();
    if let Some(c) = caption {
        let _ = writeln!(prompt, "CAPTION FROM THE USER: {c}\n");
    }
    prompt.push_str("What dish is shown in this photo? Answer with the JSON object only.");

    let urls = [image_url.to_string()];
    let res = state
        .llm
        .chat_json_images(ImageChatRequest {
            http: &state.http,
            system: &state.config.system_prompt_identify,
            text_prompt: &prompt,
            image_urls: &urls,
            temperature: 0.2,
            timeout: state.config.identify_timeout(),
            max_tokens: Some(100),
        })
        .await
        .map(|reply| dish::title_from_reply(&reply));

    Step::settle("identify", res, || UNKNOWN_DISH.to_string())
}

pub async fn describe(state: &AppState, title: &str, caption: Option<&str>) -> Step<String> {
    let mut user = format!("DISH: {title}");
    if let Some(c) = caption {
        let _ = write!(user, "\nCAPTION: {c}");
    }

    let messages = [
        ChatMessage::system(state.config.system_prompt_describe.as_str()),
        ChatMessage::user(user),
    ];
    let res = state
        .llm
        .chat_text(
            &state.http,
            &messages,
            0.7,
            state.config.identify_timeout(),
            Some(200),
        )
        .await;

    Step::settle("describe", res, || NO_DESCRIPTION.to_string())
}

pub async fn recipe(state: &AppState, title: &str, variant: RecipeVariant) -> Step<Recipe> {
    let res = state
        .llm
        .chat_json(
            &state.http,
            &state.config.system_prompt_recipe,
            &variant.user_prompt(title),
            0.4,
            state.config.recipe_timeout(),
            Some(1200),
        )
        .await
        .and_then(|reply| Recipe::from_llm_json(&reply, variant));

    Step::settle(variant.label(), res, || Recipe::empty_shell(variant))
}

/// Strips blank captions so prompts never carry an empty `CAPTION:` line.
#[must_use]
pub fn clean_caption(caption: Option<&str>) -> Option<&str> {
    caption.map(str::trim).filter(|c| !c.is_empty())
}
