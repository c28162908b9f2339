//! Blikk - Video Frame Retrieval and Grounded Q&A
//!
//! A CLI tool and HTTP service that answers questions about videos from
//! their extracted frames.
//!
//! The name "Blikk" comes from the Norwegian word for "glance."
//!
//! # Overview
//!
//! Blikk allows you to:
//! - Index per-frame descriptions of a video into a remote vector collection
//! - Ask questions and get answers grounded in the most relevant frames
//! - Rebuild a chronological overview of everything indexed for a video
//!
//! Frame extraction itself is an external collaborator: it hands Blikk a
//! list of `{frame_id, timestamp, description, path}` records per video.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `frames` - Frame records and image loading
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector index abstraction and provisioning
//! - `rag` - Analyze engine for grounded question answering
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use blikk::config::Settings;
//! use blikk::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let response = orchestrator
//!         .analyze(None, Some("42"), "What happens after the car stops?", None, false)
//!         .await?;
//!     println!("{}", response.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod frames;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod vector_store;

pub use error::{BlikkError, Result};
