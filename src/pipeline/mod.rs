mod config;
mod runner;
mod sheets;

pub use config::{QaConfig, DEFAULT_REPORT};
pub use runner::{QaPipeline, RunOutput};
pub use sheets::SheetWriter;
