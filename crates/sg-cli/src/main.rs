//! SweepGuard CLI
//!
//! CLI tool for compiling filter lists into policies and checking URLs
//! against them.

mod bench;
mod policy;

use std::path::Path;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use sg_core::{Classifier, PolicyStore};

use crate::bench::{BenchMode, BenchOptions, DEFAULT_SEED};

#[derive(Parser)]
#[command(name = "sg-cli")]
#[command(about = "SweepGuard policy compiler and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify URLs against a policy
    Classify {
        /// Engine config JSON (built-in policy if omitted)
        #[arg(short, long)]
        policy: Option<String>,

        /// Print one JSON object per URL
        #[arg(long)]
        json: bool,

        /// URLs to classify
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Compile filter lists into an engine config
    Compile {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Output config file
        #[arg(short, long, default_value = "policy.json")]
        output: String,

        /// Append to the built-in policy instead of starting empty
        #[arg(long)]
        with_defaults: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a policy and print its contents
    Info {
        /// Engine config JSON
        #[arg(short, long)]
        policy: String,
    },

    /// Time classification and sweeping on a synthetic workload
    Bench {
        /// Engine config JSON (built-in policy if omitted)
        #[arg(short, long)]
        policy: Option<String>,

        #[arg(long, value_enum, default_value = "both")]
        mode: BenchMode,

        #[arg(long, default_value_t = 100)]
        iterations: usize,

        /// Synthetic URLs per iteration
        #[arg(long, default_value_t = 1000)]
        urls: usize,

        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Classify { policy, json, urls } => cmd_classify(policy.as_deref(), json, &urls),
        Commands::Compile {
            input,
            output,
            with_defaults,
            verbose,
        } => cmd_compile(&input, &output, with_defaults, verbose),
        Commands::Info { policy } => cmd_info(&policy),
        Commands::Bench {
            policy,
            mode,
            iterations,
            urls,
            seed,
        } => bench::run(BenchOptions {
            policy_path: policy,
            mode,
            iterations,
            urls,
            seed,
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[derive(Serialize)]
struct VerdictLine<'a> {
    url: &'a str,
    classification: &'static str,
    reason: String,
}

fn load_classifier(path: Option<&str>) -> Result<Classifier, String> {
    let config = policy::read_policy(path)?;
    let store = PolicyStore::from_config(&config.policy).map_err(|e| format!("Invalid policy: {}", e))?;
    Ok(Classifier::new(Rc::new(store)))
}

fn cmd_classify(policy_path: Option<&str>, json: bool, urls: &[String]) -> Result<(), String> {
    let classifier = load_classifier(policy_path)?;

    for url in urls {
        let verdict = classifier.explain(url);
        if json {
            let line = VerdictLine {
                url,
                classification: verdict.classification.as_str(),
                reason: verdict.reason.to_string(),
            };
            let text = serde_json::to_string(&line).map_err(|e| format!("Failed to encode result: {}", e))?;
            println!("{}", text);
        } else {
            println!("{:5}  {}  ({})", verdict.classification.as_str(), url, verdict.reason);
        }
    }

    Ok(())
}

fn cmd_compile(inputs: &[String], output: &str, with_defaults: bool, verbose: bool) -> Result<(), String> {
    let (config, stats) = policy::compile_policy(inputs, with_defaults, verbose)?;
    policy::write_policy(Path::new(output), &config)?;

    println!("Compiled {} filter lists to '{}'", inputs.len(), output);
    println!("  Lines:      {}", stats.lines);
    println!(
        "  Parsed:     {} allow, {} block, {} tld, {} selectors ({} skipped)",
        stats.entries.allow, stats.entries.block, stats.entries.suspicious, stats.entries.selectors, stats.entries.skipped
    );
    println!(
        "  Policy:     {} allow, {} block, {} tld, {} selectors",
        stats.allow, stats.block, stats.suspicious, stats.selectors
    );
    println!("  Time:       {:.1}ms", stats.total_ms);

    Ok(())
}

fn cmd_info(path: &str) -> Result<(), String> {
    let config = policy::read_policy(Some(path))?;
    let store = PolicyStore::from_config(&config.policy).map_err(|e| format!("Invalid policy: {}", e))?;

    println!("Policy: {}", path);
    println!("  Sweep interval:  {}ms", config.sweep_interval_ms);
    println!("  Sweep targets:   {:?}", config.sweep_targets);
    println!("  Interceptors:    {:?}", config.interceptors);
    println!();

    println!("Lists:");
    println!("  Allow:           {} entries", store.allow_entries().len());
    println!("  Block:           {} entries", store.block_entries().len());
    println!("  Suspicious TLDs: {}", store.suspicious_tlds().join(" "));
    match store.random_host_run() {
        Some(run) => println!("  Random host run: {} chars", run),
        None => println!("  Random host run: disabled"),
    }
    println!("  Player keywords: {}", store.player_keywords().join(" "));
    println!();

    println!("Container selectors:");
    for selector in store.container_selectors() {
        println!("  {}", selector);
    }

    Ok(())
}
