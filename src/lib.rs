#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod app;
pub mod cloudinary;
pub mod config;
pub mod dish;
pub mod error;
pub mod llm;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod recipe;
pub mod routes;

pub use app::build_app;
pub use models::AppState;
