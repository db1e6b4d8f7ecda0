use clap::{ArgAction, Args, Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

#[derive(Parser, Debug)]
#[command(name = "dishlens", version, about = "Photo-to-recipe relay server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub config: Config,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print a direct-upload signature computed with the configured Cloudinary secret
    Sign(SignArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SignArgs {
    #[arg(long)]
    pub public_id: String,
    #[arg(long)]
    pub folder: String,
    /// Unix timestamp; defaults to now
    #[arg(long)]
    pub timestamp: Option<String>,
    #[arg(long)]
    pub upload_preset: String,
}

/// Dishlens server configuration
#[derive(Parser, Debug, Clone)]
pub struct Config {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease verbosity (-q, -qq, -qqq)
    #[arg(short = 'q', action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Address to bind the HTTP server to
    #[arg(long, env = "DISHLENS_BIND_ADDR", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// Log file path (logs are written to stdout + this file)
    #[arg(long, env = "DISHLENS_LOG_FILE", default_value = "dishlens.logs")]
    pub log_file: PathBuf,

    /// Inference provider API key
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    /// Multimodal model used for every inference call
    #[arg(long, env = "DISHLENS_LLM_MODEL", default_value = "gpt-4o")]
    pub llm_model: String,

    /// Inference API base URL (OpenAI-compatible)
    #[arg(long, env = "DISHLENS_LLM_API_URL", default_value = "https://api.openai.com/v1")]
    pub llm_api_url: String,

    /// Cloudinary cloud name
    #[arg(long, env = "CLOUDINARY_CLOUD_NAME", default_value = "")]
    pub cloudinary_cloud_name: String,

    /// Cloudinary API key
    #[arg(long, env = "CLOUDINARY_API_KEY", default_value = "")]
    pub cloudinary_api_key: String,

    /// Cloudinary API secret (never returned to clients)
    #[arg(long, env = "CLOUDINARY_API_SECRET", default_value = "")]
    pub cloudinary_api_secret: String,

    /// Cloudinary API base URL
    #[arg(long, env = "DISHLENS_ASSET_API_URL", default_value = "https://api.cloudinary.com/v1_1")]
    pub asset_api_url: String,

    /// Folder uploaded photos land in
    #[arg(long, env = "DISHLENS_UPLOAD_FOLDER", default_value = "dishes")]
    pub upload_folder: String,

    /// Directory for the transient copy of uploaded photos (defaults to the OS temp dir)
    #[arg(long, env = "DISHLENS_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Maximum accepted request body, in MiB
    #[arg(long, env = "DISHLENS_MAX_BODY_MB", default_value_t = 25)]
    pub max_body_mb: usize,

    /// Timeout for identification, description and chat calls
    #[arg(long, env = "DISHLENS_IDENTIFY_TIMEOUT_SECS", default_value_t = 30)]
    pub identify_timeout_secs: u64,

    /// Timeout for each recipe call
    #[arg(long, env = "DISHLENS_RECIPE_TIMEOUT_SECS", default_value_t = 60)]
    pub recipe_timeout_secs: u64,

    /// Timeout for the asset upload
    #[arg(long, env = "DISHLENS_UPLOAD_TIMEOUT_SECS", default_value_t = 60)]
    pub upload_timeout_secs: u64,

    /// System prompt for dish identification
    #[arg(long, env = "DISHLENS_SYSTEM_PROMPT_IDENTIFY", default_value = DEFAULT_SYSTEM_PROMPT_IDENTIFY)]
    pub system_prompt_identify: String,

    /// System prompt for the dish description
    #[arg(long, env = "DISHLENS_SYSTEM_PROMPT_DESCRIBE", default_value = DEFAULT_SYSTEM_PROMPT_DESCRIBE)]
    pub system_prompt_describe: String,

    /// System prompt for both recipe variants
    #[arg(long, env = "DISHLENS_SYSTEM_PROMPT_RECIPE", default_value = DEFAULT_SYSTEM_PROMPT_RECIPE)]
    pub system_prompt_recipe: String,

    /// Persona prompt for the chef chat (context is appended)
    #[arg(long, env = "DISHLENS_SYSTEM_PROMPT_CHEF", default_value = DEFAULT_SYSTEM_PROMPT_CHEF)]
    pub system_prompt_chef: String,
}

const DEFAULT_SYSTEM_PROMPT_IDENTIFY: &str = r#"You are a food recognition expert.

Look at the photo and name the dish it shows.

OUTPUT: STRICT JSON with exactly one key:
{"title": string}

Rules:
- "title" is the common English name of the dish, 1 to 5 words, Title Case.
- No cuisine labels, adjectives about quality, or commentary.
- If the photo does not show food, or you cannot tell what dish it is,
  answer {"title": "Unknown Dish"}.
Answer only with the JSON object."#;

const DEFAULT_SYSTEM_PROMPT_DESCRIBE: &str = "You are a food writer. \
Describe the dish you are given in exactly two sentences: what it is, \
and how it typically looks and tastes. Plain text only, no lists, no headings.";

const DEFAULT_SYSTEM_PROMPT_RECIPE: &str = r#"You are a professional recipe developer.

OUTPUT: STRICT JSON with exactly these keys:
{
  "title": string,
  "ingredients": [string],
  "instructions": [string],
  "servings": integer,
  "prepTime": string,
  "cookTime": string,
  "nutrition": {
    "calories": integer,
    "protein": string,
    "carbs": string,
    "fat": string
  }
}

Rules:
- "ingredients": one entry per ingredient, quantity and unit first, e.g. "200 g chicken breast".
- "instructions": ordered steps, one action per step, no numbering.
- "prepTime" and "cookTime" are human readable, e.g. "15 minutes".
- "nutrition" is PER SERVING; protein, carbs and fat as grams, e.g. "32g".
- Never add extra keys or commentary.
Answer only with the final JSON."#;

const DEFAULT_SYSTEM_PROMPT_CHEF: &str = "You are ChefGPT, a charming culinary expert who helps users \
improve recipes, suggest substitutions, and make things healthier or tastier.";

impl Config {
    #[must_use]
    pub fn verbosity_delta(&self) -> i16 {
        i16::from(self.verbose) - i16::from(self.quiet)
    }
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity_delta() {
            d if d <= -2 => "error",
            -1 => "warn",
            0 => "info,dishlens=info,axum=info,tower_http=info",
            1 => "debug,dishlens=debug,axum=info,tower_http=info,reqwest=info",
            2 => "trace,dishlens=trace,axum=debug,tower_http=trace,reqwest=debug,hyper=info",
            _ => "trace,dishlens=trace,axum=trace,tower_http=trace,reqwest=trace,hyper=debug",
        }
    }

    #[must_use]
    pub const fn identify_timeout(&self) -> Duration {
        Duration::from_secs(self.identify_timeout_secs)
    }

    #[must_use]
    pub const fn recipe_timeout(&self) -> Duration {
        Duration::from_secs(self.recipe_timeout_secs)
    }

    #[must_use]
    pub const fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    #[must_use]
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_mb.saturating_mul(1024 * 1024)
    }

    #[must_use]
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
