//! costflow CLI - formula evaluation, logic checks and offer costing

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use costflow::prelude::*;
use costflow::{infer_type, parse_formula, SymbolTable, ValidationRequest, ValueType};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "costflow")]
#[command(author, version, about = "Offer cost calculation and formula tooling")]
struct Cli {
    /// Log more (repeat for debug output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a single formula
    Eval {
        formula: String,

        /// Context as a JSON object of name → value
        #[arg(short, long)]
        context: Option<String>,

        /// Read the context from a JSON file instead
        #[arg(long, conflicts_with = "context")]
        context_file: Option<PathBuf>,
    },

    /// Validate calculator logic
    Check {
        /// JSON file with params, inputs, logic and (optionally) outputs
        input: PathBuf,
    },

    /// Calculate an offer and print the result as JSON
    #[command(alias = "calculate")]
    Calc {
        /// Calculation request file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the requested quantity
        #[arg(short, long)]
        quantity: Option<f64>,

        /// Pretty-print the JSON result
        #[arg(short, long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Eval {
            formula,
            context,
            context_file,
        } => eval(&formula, context.as_deref(), context_file.as_deref()),
        Commands::Check { input } => check(&input),
        Commands::Calc {
            input,
            output,
            quantity,
            pretty,
        } => calc(&input, output.as_deref(), quantity, pretty),
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))
}

fn eval(formula: &str, context: Option<&str>, context_file: Option<&Path>) -> Result<()> {
    let text = match (context, context_file) {
        (Some(json), _) => json.to_string(),
        (None, Some(path)) => read_file(path)?,
        (None, None) => "{}".to_string(),
    };
    let values: BTreeMap<String, Value> =
        serde_json::from_str(&text).context("Context must be a JSON object")?;

    let expr = parse_formula(formula).context("Failed to parse formula")?;

    let mut symbols = SymbolTable::new();
    for (name, value) in &values {
        symbols.add_input(name.as_str(), None, Some(ValueType::of_value(value)));
    }
    let report = infer_type(&expr, &symbols);

    let ctx: costflow::Context = values.into_iter().collect();
    let value = costflow::evaluate(&expr, &ctx).context("Failed to evaluate formula")?;

    println!("{}", value);
    eprintln!("Type: {}", report.value_type);
    let names = expr.identifiers();
    if !names.is_empty() {
        eprintln!("Identifiers: {}", names.join(", "));
    }
    for issue in &report.issues {
        eprintln!("{}: {}", issue.severity, issue.message);
    }
    Ok(())
}

/// Input document of `costflow check`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckDocument {
    #[serde(default)]
    params: Vec<ParamDeclaration>,
    #[serde(default)]
    inputs: Vec<InputWiring>,
    #[serde(default, alias = "logicJson")]
    logic: LogicDefinition,
    #[serde(default)]
    outputs: Option<Vec<OutputMapping>>,
    #[serde(default)]
    current_stage: usize,
}

fn check(input: &Path) -> Result<()> {
    let text = read_file(input)?;
    let doc: CheckDocument = serde_json::from_str(&text)
        .with_context(|| format!("Invalid logic document '{}'", input.display()))?;

    let report = validate_logic(&ValidationRequest {
        params: &doc.params,
        inputs: &doc.inputs,
        logic: &doc.logic,
        outputs: doc.outputs.as_deref(),
        current_stage: doc.current_stage,
    });

    for issue in &report.issues {
        println!("{}", issue);
        if let Some(hint) = &issue.hint {
            println!("    hint: {}", hint);
        }
    }
    for (name, value_type) in &report.var_types {
        log::info!("{}: {}", name, value_type);
    }

    let errors = report.errors().count();
    let warnings = report.warnings().count();
    eprintln!("{} error(s), {} warning(s)", errors, warnings);
    if errors > 0 {
        bail!("Logic in '{}' is invalid", input.display());
    }
    Ok(())
}

fn calc(input: &Path, output: Option<&Path>, quantity: Option<f64>, pretty: bool) -> Result<()> {
    let text = read_file(input)?;
    let mut request = CalculationRequest::from_json(&text)
        .with_context(|| format!("Invalid calculation request '{}'", input.display()))?;
    if quantity.is_some() {
        request.quantity = quantity;
    }

    let result = request
        .calculator()
        .calculate_with_progress(&request.options(), |p| {
            log::info!("Stage {}/{}", p.current, p.total)
        })
        .context("Failed to calculate offer")?;

    eprintln!(
        "Calculated {} stage(s) ({} fallback, {} unresolved, {} formula errors)",
        result.stats.stages_calculated,
        result.stats.fallbacks,
        result.stats.unresolved,
        result.stats.evaluation_errors
    );

    let json = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };

    if let Some(path) = output {
        std::fs::write(path, &json)
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
        eprintln!("Wrote result to '{}'", path.display());
    } else {
        let mut stdout = io::stdout();
        writeln!(stdout, "{}", json).context("Failed to write to stdout")?;
    }
    Ok(())
}
