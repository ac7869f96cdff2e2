//! Command-line interface for model selection and prediction.

use clap::{Parser, Subcommand};
use colored::*;
use ndarray::{s, Array2};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::export::{read_artifact, load_model, SerializationFormat};
use crate::selection::{
    default_catalog, default_search_catalog, ModelTrainer, TrainerConfig, DEFAULT_MODEL_IDS,
    QUALITY_FLOOR,
};
use crate::training::Regressor;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "regressor-selection")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Select, tune and persist the best regression model")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare every candidate and persist the best one
    Train {
        /// Training CSV (numeric columns, target last)
        #[arg(long)]
        train: PathBuf,

        /// Test CSV with the same columns
        #[arg(long)]
        test: PathBuf,

        /// Artifact directory
        #[arg(long)]
        artifacts: Option<PathBuf>,

        /// Cross-validation folds for grid search
        #[arg(long)]
        cv_folds: Option<usize>,

        /// Artifact format (binary, json)
        #[arg(long)]
        format: Option<String>,

        /// JSON trainer config; flags override its fields
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Predict with a persisted model
    Predict {
        /// Artifact written by `train`
        #[arg(short, long)]
        model: PathBuf,

        /// Input CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Input CSV still carries the target as its last column
        #[arg(long)]
        has_target: bool,

        /// Output predictions CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the candidate models and their search grids
    Catalog,
}

// ─── Data loading ──────────────────────────────────────────────────────────────

/// Read a headered CSV of numeric columns into a row-major matrix
pub fn load_matrix(path: &Path) -> anyhow::Result<Array2<f64>> {
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    dataframe_to_matrix(&df)
}

fn dataframe_to_matrix(df: &DataFrame) -> anyhow::Result<Array2<f64>> {
    let n_rows = df.height();
    let col_data: Vec<Vec<f64>> = df
        .get_columns()
        .iter()
        .map(|column| {
            let name = column.name().to_string();
            let cast = column.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    v.ok_or_else(|| anyhow::anyhow!("column '{}' has no numeric value at row {}", name, row))
                })
                .collect::<anyhow::Result<Vec<f64>>>()
        })
        .collect::<anyhow::Result<_>>()?;

    Ok(Array2::from_shape_fn((n_rows, col_data.len()), |(r, c)| col_data[c][r]))
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    train_path: &Path,
    test_path: &Path,
    artifacts: Option<&Path>,
    cv_folds: Option<usize>,
    format: Option<&str>,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");

    let mut config = match config_path {
        Some(path) => TrainerConfig::from_json_file(path)?,
        None => TrainerConfig::default(),
    };
    if let Some(dir) = artifacts {
        config = config.with_artifact_dir(dir);
    }
    if let Some(folds) = cv_folds {
        config = config.with_cv_folds(folds);
    }
    if let Some(format) = format {
        config = config.with_format(format.parse::<SerializationFormat>()?);
    }

    step_run("Loading data");
    let start = Instant::now();
    let train = load_matrix(train_path)?;
    let test = load_matrix(test_path)?;
    step_done(&format!(
        "train {}×{}, test {}×{} in {:?}",
        train.nrows(), train.ncols(), test.nrows(), test.ncols(), start.elapsed()
    ));

    step_run(&format!("Evaluating {} candidates", DEFAULT_MODEL_IDS.len()));
    let start = Instant::now();
    let trainer = ModelTrainer::new(config);
    let catalog = default_catalog(trainer.config().random_state)?;
    let search = default_search_catalog();
    let outcome = trainer.select_and_persist_with(&train, &test, catalog, Some(&search))?;
    step_done(&format!("{:.2?}", start.elapsed()));

    println!();
    line_box_top();
    line_box(&format!("{}", "Held-out R²".white().bold()));
    line_box_sep();
    for (id, score) in outcome.scores.iter() {
        let marker = if id == outcome.best_model { ok("★").to_string() } else { " ".to_string() };
        let tuned = outcome
            .searches
            .get(id)
            .map(|r| format!("{}", dim(&r.best_params.to_string())))
            .unwrap_or_default();
        line_box(&format!("{} {:<18} {:>8.4}  {}", marker, id, score, tuned));
    }
    line_box_sep();
    line_box(&kv("Best       ", &outcome.best_model));
    line_box(&kv("Test R²    ", &format!("{:.4}", outcome.test_score)));
    line_box(&kv("Floor      ", &format!("{:.2}", QUALITY_FLOOR)));
    line_box(&kv("Artifact   ", &outcome.artifact_path.display().to_string()));
    line_box_bottom();
    println!();

    Ok(())
}

pub fn cmd_predict(
    model_path: &Path,
    data_path: &Path,
    has_target: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let (artifact, format) = read_artifact(model_path)?;
    let model = load_model(model_path)?;
    step_done(&format!("{} ({:?})", artifact.model_name, format));

    step_run("Loading data");
    let mut data = load_matrix(data_path)?;
    if has_target {
        if data.ncols() == 0 {
            anyhow::bail!("input has no columns");
        }
        data = data.slice(s![.., ..data.ncols() - 1]).to_owned();
    }
    step_done(&format!("{} rows × {} features", data.nrows(), data.ncols()));

    step_run("Predicting");
    let start = Instant::now();
    let predictions = model.predict(&data)?;
    step_done(&format!("{:?}", start.elapsed()));

    match output {
        Some(path) => {
            let mut df = DataFrame::new(vec![Column::new(
                "prediction".into(),
                predictions.to_vec(),
            )])?;
            let mut file = std::fs::File::create(path)?;
            CsvWriter::new(&mut file).finish(&mut df)?;
            println!("  {} {}", ok("✓"), kv("Saved to", &path.display().to_string()));
        }
        None => {
            println!();
            for (i, p) in predictions.iter().take(10).enumerate() {
                println!("  {:>4}  {:.6}", dim(&i.to_string()), p);
            }
            if predictions.len() > 10 {
                println!("  {}", dim(&format!("... {} more", predictions.len() - 10)));
            }
        }
    }
    println!();

    Ok(())
}

pub fn cmd_catalog() -> anyhow::Result<()> {
    section("Catalog");
    let search = default_search_catalog();

    line_box_top();
    for id in DEFAULT_MODEL_IDS {
        let grid = search.get(id);
        let n = grid.map(|g| if g.is_empty() { 0 } else { g.n_configurations() }).unwrap_or(0);
        line_box(&format!("{:<18} {}", id.white().bold(), muted(&format!("{} configurations", n))));
        if let Some(grid) = grid {
            for (name, values) in grid.iter() {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                line_box(&format!("  {} {{{}}}", dim(name), values.join(", ")));
            }
        }
    }
    line_box_bottom();
    println!();

    Ok(())
}
