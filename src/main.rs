//! NER comparison CLI
//!
//! Runs the same text through the base model and the LoRA adapter and
//! shows what each one extracted.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ner_compare::{
    batch::BatchRunner,
    compare::{EntityDiff, diff_entities, type_distribution},
    config::Config,
    dispatch::{Dispatcher, InferenceResult, ModelComparison},
    entity::{Entity, EntityType},
    metrics::score,
    parser,
};
use std::io::{self, BufRead, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Keys listed per row of the entity diff.
const DIFF_EXAMPLES: usize = 5;

/// Compare NER output of a base model and its fine-tuned adapter
#[derive(Parser)]
#[command(name = "ner-compare")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract entities with both models and compare them
    Compare {
        /// Input texts; more than one runs a batch
        texts: Vec<String>,

        /// Also read one input text per line from stdin
        #[arg(long)]
        stdin: bool,

        /// Print results as JSON instead of formatted text
        #[arg(long)]
        json: bool,

        /// Save results to a JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a raw model response read from stdin
    Parse,

    /// Score predicted entities against ground truth (JSON entity lists)
    Score {
        /// Ground-truth entities, e.g. '[{"name":"坦克","type":"军事装备"}]'
        #[arg(long)]
        truth: String,

        /// Predicted entities
        #[arg(long)]
        predicted: String,
    },

    /// Test connection to both endpoints
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("ner_compare=debug,info")
        } else {
            EnvFilter::new("ner_compare=warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Compare {
            texts,
            stdin,
            json,
            output,
        } => cmd_compare(texts, stdin, json, output).await,
        Commands::Parse => cmd_parse(),
        Commands::Score { truth, predicted } => cmd_score(&truth, &predicted),
        Commands::Test => cmd_test().await,
    }
}

fn load_dispatcher() -> Result<Dispatcher> {
    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    eprintln!("Base: {} @ {}", config.base.model, config.base.api_base);
    eprintln!("LoRA: {} @ {}", config.lora.model, config.lora.api_base);

    Dispatcher::from_config(&config).context("Failed to create LLM clients")
}

async fn cmd_compare(
    mut texts: Vec<String>,
    read_stdin: bool,
    json: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    if read_stdin {
        for line in io::stdin().lock().lines() {
            let line = line.context("Failed to read stdin")?;
            if !line.trim().is_empty() {
                texts.push(line);
            }
        }
    }

    texts.retain(|t| !t.trim().is_empty());
    if texts.is_empty() {
        anyhow::bail!("No input text. Pass it as an argument or use --stdin.");
    }

    let dispatcher = load_dispatcher()?;

    let payload = if texts.len() == 1 {
        let result = dispatcher.compare(&texts[0]).await;
        if json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print_single(&result);
        }
        serde_json::to_string_pretty(&result)?
    } else {
        eprintln!("Running batch of {} texts...", texts.len());
        let runner = BatchRunner::new(dispatcher);
        let results = runner.run(&texts).await;
        if json {
            println!("{}", serde_json::to_string_pretty(&results)?);
        } else {
            for case in &results.cases {
                println!(
                    "[{}] base {} | lora {} | {:+}  {}",
                    case.case_id,
                    entity_count(&case.base),
                    entity_count(&case.lora),
                    case.comparison.improvement,
                    case.text_preview
                );
            }
            results.print_summary();
        }
        serde_json::to_string_pretty(&results)?
    };

    if let Some(path) = output {
        std::fs::write(&path, payload)
            .with_context(|| format!("Failed to write results to {}", path.display()))?;
        eprintln!("Results saved to {}", path.display());
    }

    Ok(())
}

fn entity_count(result: &InferenceResult) -> String {
    if result.success {
        result.entities.len().to_string()
    } else {
        "failed".to_string()
    }
}

fn print_single(result: &ModelComparison) {
    print_model("Base Model", &result.base);
    print_model("LoRA Model", &result.lora);

    let cmp = &result.comparison;
    println!("=== Summary ===");
    println!("  Base entities:  {}", cmp.base_total);
    println!("  LoRA entities:  {}", cmp.lora_total);
    let status = match cmp.improvement {
        i if i > 0 => "improved",
        0 => "unchanged",
        _ => "fewer",
    };
    println!("  Improvement:    {:+} ({})", cmp.improvement, status);

    let time_diff = result.lora.inference_time - result.base.inference_time;
    let speed = if time_diff > 0.0 {
        "LoRA slower"
    } else if time_diff < 0.0 {
        "LoRA faster"
    } else {
        "same"
    };
    println!("  Time diff:      {:+.2}s ({})", time_diff, speed);

    println!("\n=== Entity types ===");
    let base_types = type_distribution(&result.base.entities);
    let lora_types = type_distribution(&result.lora.entities);
    println!("  {:<12} {:>6} {:>6}", "type", "base", "lora");
    for entity_type in EntityType::ALL {
        println!(
            "  {:<12} {:>6} {:>6}",
            entity_type.label(),
            base_types[&entity_type],
            lora_types[&entity_type]
        );
    }

    let diff = diff_entities(&result.base.entities, &result.lora.entities);
    print_diff(&diff);
}

fn print_model(title: &str, result: &InferenceResult) {
    println!(
        "=== {} ({}, {:.2}s) ===",
        title, result.model_name, result.inference_time
    );

    if let Some(error) = &result.error_message {
        println!("  Error: {}\n", error);
        return;
    }

    if result.entities.is_empty() {
        println!("  No entities extracted\n");
        return;
    }

    for entity in &result.entities {
        println!("  • {}", entity);
    }
    println!();
}

fn print_diff(diff: &EntityDiff) {
    println!("\n=== Entity diff ===");
    for (label, keys) in [
        ("Base only", &diff.base_only),
        ("LoRA only", &diff.lora_only),
        ("Common", &diff.common),
    ] {
        if keys.is_empty() {
            continue;
        }
        let examples: Vec<&str> = keys.iter().take(DIFF_EXAMPLES).map(String::as_str).collect();
        let more = if keys.len() > DIFF_EXAMPLES { ", ..." } else { "" };
        println!("  {:<10} {:>3}  {}{}", label, keys.len(), examples.join(", "), more);
    }
}

fn cmd_parse() -> Result<()> {
    let mut raw = String::new();
    io::stdin()
        .read_to_string(&mut raw)
        .context("Failed to read stdin")?;

    let outcome = parser::parse(&raw);
    eprintln!("Status: {:?}", outcome.status());
    if let parser::ParseOutcome::Degraded { reason, .. } = &outcome {
        eprintln!("Reason: {}", reason);
    }
    println!("{}", serde_json::to_string_pretty(outcome.entities())?);

    Ok(())
}

fn cmd_score(truth: &str, predicted: &str) -> Result<()> {
    let truth: Vec<Entity> =
        serde_json::from_str(truth).context("Failed to parse --truth as an entity list")?;
    let predicted: Vec<Entity> =
        serde_json::from_str(predicted).context("Failed to parse --predicted as an entity list")?;

    if truth.is_empty() {
        eprintln!("Ground truth is empty; all metrics are reported as zero.");
    }

    let s = score(Some(truth.as_slice()), &predicted);
    println!("Precision: {:.3}", s.precision);
    println!("Recall:    {:.3}", s.recall);
    println!("F1:        {:.3}", s.f1);
    println!(
        "TP: {}  FP: {}  FN: {}",
        s.true_positives, s.false_positives, s.false_negatives
    );

    Ok(())
}

async fn cmd_test() -> Result<()> {
    let dispatcher = load_dispatcher()?;

    let (base, lora) = tokio::join!(
        dispatcher.base_client().test_connection(),
        dispatcher.lora_client().test_connection()
    );

    let mut failed = false;
    for (label, result) in [("Base", base), ("LoRA", lora)] {
        match result {
            Ok(()) => println!("{}: connection successful", label),
            Err(e) => {
                println!("{}: connection failed: {}", label, e);
                failed = true;
            }
        }
    }

    if failed {
        anyhow::bail!("At least one endpoint is unreachable");
    }
    Ok(())
}
