//! cogeval - replay recorded response data through predictive models
//!
//! ## Commands
//!
//! - `run`: evaluate the models of a benchmark file
//! - `eval`: evaluate models given directly on the command line
//! - `models`: list the model kinds manifests may use

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};

use cogeval_core::{
    file_digest, render_summary_md, search_path_from_env, write_summary_json, Benchmark,
    EvaluationReport, Evaluator, ModelCatalog, ModelLoader, RunSummaryArtifact,
};

#[derive(Parser)]
#[command(name = "cogeval")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate predictive models on recorded response data", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the models listed in a benchmark file
    Run {
        /// Benchmark JSON file
        #[arg(short, long)]
        benchmark: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Evaluate models against datasets given as arguments
    Eval {
        /// Test data CSV
        #[arg(long)]
        test: PathBuf,

        /// Training data CSV used for pre-training
        #[arg(long)]
        train: Option<PathBuf>,

        /// Training and test subject ids refer to the same people
        #[arg(long)]
        corresponding: bool,

        /// Model manifest (repeatable)
        #[arg(short, long = "model", required = true)]
        models: Vec<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// List model kinds available to manifests
    Models,
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Write the result table as CSV
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the run summary as JSON
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    cogeval_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run { benchmark, output } => {
            let benchmark = Benchmark::from_path(&benchmark)
                .with_context(|| format!("Failed to read benchmark {:?}", benchmark))?;
            cmd_evaluate(&benchmark, &output)
        }
        Commands::Eval {
            test,
            train,
            corresponding,
            models,
            output,
        } => {
            let mut benchmark =
                Benchmark::new(test, models).with_corresponding_data(corresponding);
            if let Some(train) = train {
                benchmark = benchmark.with_train(train);
            }
            cmd_evaluate(&benchmark, &output)
        }
        Commands::Models => cmd_models(),
    }
}

fn model_loader() -> ModelLoader {
    search_path_from_env()
        .into_iter()
        .fold(ModelLoader::new(ModelCatalog::with_baselines()), |loader, root| {
            loader.with_search_path(root)
        })
}

fn cmd_evaluate(benchmark: &Benchmark, output: &OutputArgs) -> Result<()> {
    info!(
        test = %benchmark.test.display(),
        models = benchmark.models.len(),
        "Starting evaluation"
    );

    let mut evaluator = Evaluator::from_benchmark(benchmark)
        .context("Failed to prepare evaluation")?
        .with_loader(model_loader());
    let report = evaluator.evaluate().context("Evaluation failed")?;

    if let Some(path) = &output.output {
        report
            .results
            .write_csv_path(path)
            .with_context(|| format!("Failed to write results to {:?}", path))?;
        info!(path = %path.display(), rows = report.results.len(), "Results written");
    }

    let artifact = summarize(benchmark, &report)?;
    if let Some(path) = &output.summary {
        write_summary_json(path, &artifact)?;
        info!(path = %path.display(), "Summary written");
    }

    println!("{}", render_summary_md(&artifact));
    Ok(())
}

fn summarize(benchmark: &Benchmark, report: &EvaluationReport) -> Result<RunSummaryArtifact> {
    let test_digest = file_digest(&benchmark.test)?;
    let train_digest = benchmark
        .train
        .as_deref()
        .map(file_digest)
        .transpose()?;
    Ok(RunSummaryArtifact::new(
        report,
        test_digest,
        train_digest,
        benchmark.corresponding_data,
    ))
}

fn cmd_models() -> Result<()> {
    let loader = model_loader();
    println!("Model kinds:");
    for kind in loader.catalog().kinds() {
        println!("  {}", kind);
    }
    for root in loader.search_path() {
        println!("Search path: {}", root.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn eval_requires_a_model() {
        let parsed = Cli::try_parse_from(["cogeval", "eval", "--test", "t.csv"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn eval_collects_repeated_models() {
        let cli = Cli::try_parse_from([
            "cogeval", "eval", "--test", "t.csv", "-m", "a.json", "-m", "b.json",
            "--corresponding",
        ])
        .unwrap();
        match cli.command {
            Commands::Eval {
                models,
                corresponding,
                train,
                ..
            } => {
                assert_eq!(models, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
                assert!(corresponding);
                assert!(train.is_none());
            }
            _ => panic!("expected eval command"),
        }
    }

    #[test]
    fn run_accepts_outputs() {
        let cli = Cli::try_parse_from([
            "cogeval", "--json", "run", "-b", "bench.json", "-o", "out.csv", "--summary",
            "s.json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Run { benchmark, output } => {
                assert_eq!(benchmark, PathBuf::from("bench.json"));
                assert_eq!(output.output, Some(PathBuf::from("out.csv")));
                assert_eq!(output.summary, Some(PathBuf::from("s.json")));
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn evaluate_writes_results_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let test = dir.path().join("test.csv");
        std::fs::write(
            &test,
            "id,domain,response_type,task,choices,response,sequence\n\
             1,syllogistic,single-choice,AA1,Aac|NVC,NVC,1\n\
             1,syllogistic,single-choice,AA1,Aac|NVC,Aac,2\n",
        )
        .unwrap();
        let model = dir.path().join("nvc.json");
        std::fs::write(
            &model,
            r#"{"models": [{"kind": "constant", "params": {"name": "nvc", "response": "NVC",
                "domains": ["syllogistic"], "response_types": ["single-choice"]}}]}"#,
        )
        .unwrap();

        let output = OutputArgs {
            output: Some(dir.path().join("results.csv")),
            summary: Some(dir.path().join("summary.json")),
        };
        cmd_evaluate(&Benchmark::new(test, vec![model]), &output).unwrap();

        let results = std::fs::read_to_string(dir.path().join("results.csv")).unwrap();
        assert_eq!(results.lines().count(), 3);
        assert!(results.starts_with("model,id,domain,sequence,task,choices,truth,prediction,hit"));

        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("summary.json")).unwrap())
                .unwrap();
        assert_eq!(summary["total_trials"], 2);
        assert_eq!(summary["models"][0]["hits"], 1.0);
    }
}
