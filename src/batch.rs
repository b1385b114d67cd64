//! Batch runner: compare both models over a sequence of inputs.

use crate::compare::EntityComparison;
use crate::dispatch::{Dispatcher, InferenceResult};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Characters of input kept in a case preview.
const PREVIEW_CHARS: usize = 100;

/// Results for a single input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    /// 1-based position in the batch.
    pub case_id: usize,
    /// Start of the input text.
    pub text_preview: String,
    pub base: InferenceResult,
    pub lora: InferenceResult,
    pub comparison: EntityComparison,
}

/// Aggregated batch results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Inputs processed.
    pub total_cases: usize,
    /// Sum of base list lengths.
    pub total_base_entities: usize,
    /// Sum of adapter list lengths.
    pub total_lora_entities: usize,
    /// `total_lora_entities - total_base_entities`.
    pub total_improvement: i64,
    /// Mean base inference time (seconds).
    pub avg_base_time: f64,
    /// Mean adapter inference time (seconds).
    pub avg_lora_time: f64,
    /// `avg_lora_time - avg_base_time`.
    pub avg_time_diff: f64,
    /// Calls (on either side) that ended with `success == false`.
    pub failed_calls: usize,
    /// Wall-clock time for the whole batch (seconds).
    pub total_time_secs: f64,
}

/// Full batch output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResults {
    pub summary: BatchSummary,
    pub cases: Vec<CaseResult>,
}

impl BatchResults {
    /// Calculate summary statistics from case results.
    pub fn calculate_summary(&mut self) {
        let total_time_secs = self.summary.total_time_secs;
        self.summary = BatchSummary {
            total_time_secs,
            ..BatchSummary::default()
        };

        if self.cases.is_empty() {
            return;
        }

        let summary = &mut self.summary;
        summary.total_cases = self.cases.len();

        let mut base_time = 0.0;
        let mut lora_time = 0.0;
        for case in &self.cases {
            summary.total_base_entities += case.comparison.base_total;
            summary.total_lora_entities += case.comparison.lora_total;
            base_time += case.base.inference_time;
            lora_time += case.lora.inference_time;
            summary.failed_calls += usize::from(!case.base.success) + usize::from(!case.lora.success);
        }

        let n = self.cases.len() as f64;
        summary.total_improvement =
            summary.total_lora_entities as i64 - summary.total_base_entities as i64;
        summary.avg_base_time = base_time / n;
        summary.avg_lora_time = lora_time / n;
        summary.avg_time_diff = summary.avg_lora_time - summary.avg_base_time;
    }

    /// Print summary to stdout.
    pub fn print_summary(&self) {
        let s = &self.summary;
        println!("\n========== Batch Results ==========");
        println!("Cases: {}", s.total_cases);
        println!("------------------------------------");
        println!("Total entities (base): {}", s.total_base_entities);
        println!("Total entities (lora): {}", s.total_lora_entities);
        println!("Total improvement:     {:+}", s.total_improvement);
        println!("------------------------------------");
        println!("Avg base time: {:.2}s", s.avg_base_time);
        println!("Avg lora time: {:.2}s", s.avg_lora_time);
        println!("Avg time diff: {:+.2}s", s.avg_time_diff);
        if s.failed_calls > 0 {
            println!("Failed calls:  {}", s.failed_calls);
        }
        println!("------------------------------------");
        println!("Total time: {:.1}s", s.total_time_secs);
        println!("====================================\n");
    }
}

/// First [`PREVIEW_CHARS`] characters of `text`, with an ellipsis when cut.
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Runs the comparison over each input in turn.
pub struct BatchRunner {
    dispatcher: Dispatcher,
}

impl BatchRunner {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Process inputs in order. Failed calls are recorded, never fatal.
    pub async fn run<I, S>(&self, inputs: I) -> BatchResults
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let start = Instant::now();
        let mut results = BatchResults::default();

        for (idx, input) in inputs.into_iter().enumerate() {
            let text = input.as_ref();
            let case_id = idx + 1;

            let compared = self.dispatcher.compare(text).await;
            info!(
                case_id,
                base_entities = compared.comparison.base_total,
                lora_entities = compared.comparison.lora_total,
                improvement = compared.comparison.improvement,
                "case finished"
            );

            results.cases.push(CaseResult {
                case_id,
                text_preview: preview(text),
                base: compared.base,
                lora: compared.lora,
                comparison: compared.comparison,
            });
        }

        results.summary.total_time_secs = start.elapsed().as_secs_f64();
        results.calculate_summary();
        results
    }
}
