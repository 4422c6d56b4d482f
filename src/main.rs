mod api;
mod server;

use clap::{Args, Parser, Subcommand};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use persona_report::{AppConfig, FormSubmission, ReportGenerator, ScoringPipeline, SkillScores};

#[derive(Parser)]
#[command(name = "persona-report", about = "AI opportunity persona report generator")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Derive the dominant skills and persona without calling the model.
    Persona(PersonaArgs),
    /// Generate a full report for a form submission.
    Generate(GenerateArgs),
    /// Run the relay and report HTTP server.
    Serve(ServeArgs),
    /// Write the default configuration to disk.
    InitConfig(InitConfigArgs),
}

#[derive(Args, Debug, Clone)]
struct PersonaArgs {
    /// Raw 0-10 scores, e.g. communication=9,creative=8,strategy=9.
    #[arg(long, conflicts_with = "input")]
    scores: Option<String>,
    /// Form submission JSON file; reads stdin when neither flag is given.
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug, Clone)]
struct GenerateArgs {
    /// Form submission JSON file; reads stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long, conflicts_with = "markdown")]
    json: bool,
    #[arg(long)]
    markdown: bool,
    /// Write the rendered report here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub web_root: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct InitConfigArgs {
    #[arg(long, default_value = "config/persona-report.toml")]
    path: PathBuf,
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() {
    load_dotenv();
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();

    if let Command::InitConfig(args) = &cli.command {
        return run_init_config(args);
    }

    let (config, config_path) = AppConfig::load(cli.config).map_err(|err| err.to_string())?;
    if let Some(path) = config_path.as_ref().filter(|path| path.exists()) {
        info!(path = %path.display(), "loaded config");
    }

    match cli.command {
        Command::Persona(args) => run_persona(args, &config),
        Command::Generate(args) => run_generate(args, &config).await,
        Command::Serve(args) => server::serve(args, config).await,
        Command::InitConfig(_) => Ok(()),
    }
}

fn run_persona(args: PersonaArgs, config: &AppConfig) -> Result<(), String> {
    let scores = match args.scores {
        Some(pairs) => SkillScores::parse_pairs(&pairs)?,
        None => {
            let form = read_form(args.input.as_deref())?;
            form.validate().map_err(|err| err.to_string())?;
            form.scores
        }
    };

    let profile = ScoringPipeline::from_config(config)
        .score(&scores)
        .map_err(|err| err.to_string())?;
    if args.json {
        let payload = serde_json::to_string_pretty(&profile)
            .map_err(|err| format!("failed to encode profile: {}", err))?;
        println!("{}", payload);
        return Ok(());
    }

    println!("Persona: {}", profile.persona);
    println!("Top skills: {}", profile.dominant.keys().join(", "));
    println!("Scores (0-100):");
    for (skill, value) in profile.normalized.iter() {
        println!("  {:<14} {:>3}", skill.label(), value);
    }
    Ok(())
}

async fn run_generate(args: GenerateArgs, config: &AppConfig) -> Result<(), String> {
    let form = read_form(args.input.as_deref())?;
    let generator = ReportGenerator::from_config(config).map_err(|err| err.to_string())?;

    let generated = generator
        .generate_observed(form, |stage| eprintln!("... {}", stage.label()))
        .await
        .map_err(|err| err.to_string())?;

    let rendered = if args.json {
        generated.report.to_json_pretty().map_err(|err| err.to_string())?
    } else if args.markdown {
        generated.report.to_markdown()
    } else {
        generated.report.to_text()
    };

    match args.out {
        Some(path) => {
            std::fs::write(&path, rendered)
                .map_err(|err| format!("failed to write {}: {}", path.display(), err))?;
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{}", rendered),
    }

    // Let the webhooks finish before the runtime shuts down.
    if let Some(handle) = generated.webhooks {
        if let Ok(report) = handle.await {
            info!(?report, "webhooks settled");
        }
    }
    Ok(())
}

fn run_init_config(args: &InitConfigArgs) -> Result<(), String> {
    if args.path.exists() && !args.force {
        return Err(format!(
            "{} already exists; pass --force to overwrite",
            args.path.display()
        ));
    }
    AppConfig::default()
        .write(&args.path)
        .map_err(|err| err.to_string())?;
    println!("Wrote {}", args.path.display());
    Ok(())
}

fn read_form(path: Option<&Path>) -> Result<FormSubmission, String> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|err| format!("failed reading {}: {}", path.display(), err))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|err| format!("failed reading stdin: {}", err))?;
            buffer
        }
    };
    if raw.trim().is_empty() {
        return Err("missing form submission: pass --input or pipe JSON on stdin".to_string());
    }
    serde_json::from_str(&raw).map_err(|err| format!("invalid form submission: {}", err))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_dotenv() {
    let _ = dotenvy::dotenv();
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let manifest_path = Path::new(manifest_dir).join(".env");
    let _ = dotenvy::from_path(manifest_path);
}
