//! NER model comparison - base model vs. fine-tuned LoRA adapter.
//!
//! Sends the same text to two OpenAI-compatible chat-completion endpoints,
//! recovers the named entities from each free-form response and compares
//! the two lists.
//!
//! # Quick Start
//!
//! ```no_run
//! use ner_compare::{config::Config, dispatch::Dispatcher, metrics::score};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     config.validate()?;
//!
//!     let dispatcher = Dispatcher::from_config(&config)?;
//!     let result = dispatcher.compare("美国(-39.01,-141.10)拥有448枚洲际弹道导弹").await;
//!
//!     if !result.lora.success {
//!         eprintln!("adapter failed: {:?}", result.lora.error_message);
//!     }
//!     println!("common: {}", result.comparison.common);
//!     println!("improvement: {:+}", result.comparison.improvement);
//!
//!     let s = score(Some(result.base.entities.as_slice()), &result.lora.entities);
//!     println!("lora F1 against base: {:.3}", s.f1);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **parser**: free-form text -> deduplicated [`Entity`] list, never fails
//! - **dispatch**: both endpoints concurrently, failures as data
//! - **compare** / **metrics**: overlap statistics and precision/recall/F1
//! - **batch**: the comparison over many inputs with a summary
//! - **llm**: chat-completion client and the NER prompt

pub mod batch;
pub mod compare;
pub mod config;
pub mod dispatch;
pub mod entity;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod parser;

// Re-export commonly used types
pub use batch::{BatchResults, BatchRunner, BatchSummary, CaseResult};
pub use compare::{EntityComparison, EntityDiff, compare_entities, diff_entities, type_distribution};
pub use config::Config;
pub use dispatch::{Dispatcher, InferenceResult, ModelComparison};
pub use entity::{Entity, EntityType};
pub use error::{NerCompareError, Result};
pub use llm::LlmClient;
pub use metrics::{Score, score};
pub use parser::{ParseOutcome, ParseStatus, parse_response};
