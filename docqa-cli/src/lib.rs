//! # docqa-cli
//!
//! The `docqa` command: index PDFs or JSON record exports and answer
//! questions about them with a hosted language model.
//!
//! ```text
//! docqa pdf report.pdf --question "What does the report conclude?"
//! docqa records --json data/blogging.json
//! docqa records --from-mongo
//! ```
//!
//! Credentials and model choices come from the environment (and `.env`):
//! `HUGGINGFACE_TOKEN`, `MONGO_URI`, `DOCQA_CHAT_MODEL`,
//! `DOCQA_EMBEDDING_MODEL`, `DOCQA_EMBEDDING_DIMENSIONS`, `DOCQA_INDEX_DIR`.

pub mod cli;
pub mod commands;
pub mod console;

pub use cli::{Cli, Commands, QueryArgs};
