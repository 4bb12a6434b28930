//! Form Check CLI
//!
//! Runs the form controller against a document snapshot without a host UI.
//!
//! # Usage
//!
//! ```bash
//! # Visibility plan for a saved document
//! form-check visibility doc.json
//!
//! # Resolve cascades against the configured catalogs
//! form-check --json cascade doc.json
//!
//! # Load and validate a form definition
//! form-check validate-config config/onboarding_form.yaml
//! ```
//!
//! Documents use the shape `{ "name": "OF-0001", "fields": { ... } }`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use onboarding_forms::{
    CascadeOutcome, DocumentStore, FieldMutation, FormConfig, FormLoader, FormSession,
    MemoryDocument, StaticOptionLookup, VisibilityPlan,
};

#[derive(Parser)]
#[command(name = "form-check")]
#[command(about = "Evaluate onboarding form rules against a document snapshot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Form definition (defaults to the bundled onboarding form)
    #[arg(long, short = 'c', global = true, env = "FORM_CONFIG")]
    config: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which fields a document would show, hide and clear
    Visibility {
        /// Document JSON file
        document: PathBuf,
    },

    /// Run every cascade against the configured catalogs
    Cascade {
        /// Document JSON file
        document: PathBuf,
    },

    /// Load a form definition and report rule-table problems
    ValidateConfig {
        /// Form definition YAML
        file: PathBuf,
    },
}

#[derive(Serialize)]
struct SectionSummary {
    trigger: String,
    name: String,
    visible: bool,
}

#[derive(Serialize)]
struct VisibilityReport {
    document: Option<String>,
    sections: Vec<SectionSummary>,
    plan: VisibilityPlan,
    resets: Vec<FieldMutation>,
}

#[derive(Serialize)]
struct CascadeReport {
    dependent: String,
    parent: Option<String>,
    options: Vec<String>,
    cleared: Option<FieldMutation>,
    error: Option<String>,
}

#[derive(Serialize)]
struct ConfigReport {
    form: String,
    sections: usize,
    controlled_fields: usize,
    resets: usize,
    cascades: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Visibility { document } => cmd_visibility(&cli, document),
        Commands::Cascade { document } => cmd_cascade(&cli, document).await,
        Commands::ValidateConfig { file } => cmd_validate_config(&cli, file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
            } else {
                eprintln!("error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<FormConfig> {
    match &cli.config {
        Some(path) => FormLoader::load_from_file(path)
            .with_context(|| format!("Failed to load form definition {}", path.display())),
        None => FormConfig::onboarding_default().context("Bundled form definition is invalid"),
    }
}

fn load_document(path: &Path) -> Result<MemoryDocument> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    MemoryDocument::from_json(&content)
        .with_context(|| format!("Failed to parse document {}", path.display()))
}

fn cmd_visibility(cli: &Cli, path: &Path) -> Result<()> {
    let config = load_config(cli)?;
    let mut session = FormSession::from_config(&config)?;
    let mut doc = load_document(path)?;

    let update = session.on_refresh(&mut doc);
    let sections = session
        .rule_table()
        .rules()
        .iter()
        .map(|rule| SectionSummary {
            trigger: rule.trigger.clone(),
            name: rule.display_name().to_string(),
            visible: doc.is_checked(&rule.trigger),
        })
        .collect();
    let report = VisibilityReport {
        document: doc.name.clone(),
        sections,
        plan: update.visibility.unwrap_or_default(),
        resets: update.resets,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Document: {}",
        report.document.as_deref().unwrap_or("(unsaved)")
    );
    for section in &report.sections {
        let state = if section.visible { "shown" } else { "hidden" };
        println!("{} ({}): {}", section.name, section.trigger, state);
    }
    for update in &report.plan.field_updates {
        let marker = if update.visible { "show" } else { "hide" };
        let header = if update.section { " [section]" } else { "" };
        println!("  {:<5} {}{}", marker, update.field, header);
    }
    for mutation in report.plan.mutations.iter().chain(report.resets.iter()) {
        println!("  clear {} (was {})", mutation.field, mutation.previous);
    }
    Ok(())
}

async fn cmd_cascade(cli: &Cli, path: &Path) -> Result<()> {
    let config = load_config(cli)?;
    let mut session = FormSession::from_config(&config)?;
    let mut doc = load_document(path)?;

    let update = session.on_refresh(&mut doc);
    let mut outcomes: Vec<(String, Option<String>, CascadeOutcome)> = update
        .cascades
        .into_iter()
        .map(|(dependent, outcome)| (dependent, None, outcome))
        .collect();

    for ticket in &update.pending {
        let def = config
            .cascade_for(&ticket.dependent)
            .with_context(|| format!("No cascade for {}", ticket.dependent))?;
        let catalog = config.catalog_for(def).cloned().unwrap_or_default();
        let lookup = StaticOptionLookup::new(catalog);
        let resolved = session
            .run_cascades(&mut doc, std::slice::from_ref(ticket), &lookup)
            .await?;
        for outcome in resolved {
            outcomes.push((ticket.dependent.clone(), Some(ticket.parent.clone()), outcome));
        }
    }

    let reports: Vec<CascadeReport> = outcomes
        .into_iter()
        .map(|(dependent, parent, outcome)| {
            let cleared = outcome.cleared().cloned();
            match outcome {
                CascadeOutcome::Applied { options, .. } => CascadeReport {
                    dependent,
                    parent,
                    options,
                    cleared,
                    error: None,
                },
                CascadeOutcome::Failed { error, .. } => CascadeReport {
                    dependent,
                    parent,
                    options: Vec::new(),
                    cleared,
                    error: Some(error.to_string()),
                },
                CascadeOutcome::Stale { seq, latest } => CascadeReport {
                    dependent,
                    parent,
                    options: Vec::new(),
                    cleared: None,
                    error: Some(format!("stale response {} (latest {})", seq, latest)),
                },
            }
        })
        .collect();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for report in &reports {
        println!(
            "{} <- {}",
            report.dependent,
            report.parent.as_deref().unwrap_or("(empty)")
        );
        for option in &report.options {
            println!("  - {}", option);
        }
        if let Some(cleared) = &report.cleared {
            println!("  cleared (was {})", cleared.previous);
        }
        if let Some(error) = &report.error {
            println!("  error: {}", error);
        }
    }
    Ok(())
}

fn cmd_validate_config(cli: &Cli, path: &Path) -> Result<()> {
    let config = FormLoader::load_from_file(path)
        .with_context(|| format!("Invalid form definition {}", path.display()))?;
    let table = config.rule_table()?;

    let report = ConfigReport {
        form: config.form.clone(),
        sections: table.rules().len(),
        controlled_fields: table.field_count(),
        resets: config.resets.len(),
        cascades: config.cascades.len(),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{}: {} sections, {} controlled fields, {} resets, {} cascades",
            report.form,
            report.sections,
            report.controlled_fields,
            report.resets,
            report.cascades
        );
    }
    Ok(())
}
