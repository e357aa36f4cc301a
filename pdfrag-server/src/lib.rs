//! `pdfrag-server` serves a single-page upload-and-ask UI over a [`pdfrag`]
//! session, plus the JSON API the page talks to.

pub mod embedder;
pub mod error;
pub mod server;

pub use embedder::build_embedder;
pub use error::ApiError;
pub use server::{AppState, ServerConfig, app_router, run_server};
