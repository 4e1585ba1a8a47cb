mod display;

use anyhow::{Context, Result};
use ciflux_core::{BuildInfo, IdGenerator, IdSnapshot, Pipeline, Planner, Settings, Variables};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "ciflux",
    version,
    about = "ciflux — evaluate a GitLab-CI-like pipeline for a commit",
    long_about = "Normalize a CI definition, decide which jobs run for the given branch, \
                  trigger source and variables, and show the resulting stage matrix."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the prepared pipeline as YAML or JSON
    Dump {
        #[command(flatten)]
        run: RunArgs,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Dump the canonical pipeline instead of the stage matrix
        #[arg(long)]
        canonical: bool,
    },

    /// Print the stage/job tree of the prepared pipeline
    Matrix {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Show what a run would execute, stage by stage
    Run {
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Path to the CI definition
    #[arg(default_value = ".ci.yml")]
    cifile: PathBuf,

    /// Branch or tag name the pipeline runs for
    #[arg(long, default_value = "master")]
    branch: String,

    /// How the pipeline was triggered (push, web, trigger, schedule, api, pipeline)
    #[arg(long, default_value = "trigger")]
    source: String,

    /// Commit hash
    #[arg(long, default_value = "0000000000000000000000000000000000000000")]
    sha: String,

    /// Full commit message
    #[arg(long, default_value = "No message.")]
    msg: String,

    /// Commit tag, when building a tag
    #[arg(long)]
    tag: Option<String>,

    /// Force a variable (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env)]
    env: Vec<(String, String)>,

    /// Settings file (defaults to ./ciflux.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON file holding the last issued ids; read before and updated after the run
    #[arg(long)]
    state: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Dump {
            run,
            format,
            canonical,
        } => cmd_dump(&run, &format, canonical),
        Commands::Matrix { run } => cmd_matrix(&run),
        Commands::Run { run } => cmd_run(&run),
    }
}

fn parse_env(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s.split_once('=').unwrap_or((s, ""));
    if key.is_empty() {
        return Err(format!("invalid variable '{}': expected KEY=VALUE", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn build_info(args: &RunArgs) -> BuildInfo {
    let build = BuildInfo::new(&args.branch, &args.source, &args.msg, &args.sha);
    match &args.tag {
        Some(tag) => build.with_tag(tag),
        None => build,
    }
}

fn load_ids(path: Option<&Path>) -> Result<IdGenerator> {
    let Some(path) = path.filter(|p| p.exists()) else {
        return Ok(IdGenerator::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read id state: {}", path.display()))?;
    let snapshot: IdSnapshot = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse id state: {}", path.display()))?;
    Ok(IdGenerator::from_snapshot(snapshot))
}

fn save_ids(path: &Path, snapshot: IdSnapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write id state: {}", path.display()))?;
    log::info!("Saved id state to {}", path.display());
    Ok(())
}

/// Read, normalize and prepare the definition named by `args`.
fn prepare(args: &RunArgs) -> Result<Pipeline> {
    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    let settings =
        Settings::discover(args.config.as_deref(), &cwd).context("Failed to load settings")?;

    let ids = Arc::new(load_ids(args.state.as_deref())?);
    let forced: Variables = args.env.iter().cloned().collect();
    let planner = Planner::new(settings, Arc::clone(&ids)).with_forced_variables(forced);

    let content = std::fs::read_to_string(&args.cifile)
        .with_context(|| format!("Failed to read CI file: {}", args.cifile.display()))?;
    let pipeline = planner
        .normalize_str(&content)
        .with_context(|| format!("Failed to normalize {}", args.cifile.display()))?;

    let prepared = planner.prepare(pipeline, &build_info(args));

    if let Some(path) = &args.state {
        save_ids(path, ids.current_ids())?;
    }
    Ok(prepared)
}

fn cmd_dump(args: &RunArgs, format: &str, canonical: bool) -> Result<()> {
    let pipeline = prepare(args)?;

    let output = match (format, canonical) {
        ("json", true) => serde_json::to_string_pretty(&pipeline)?,
        ("json", false) => serde_json::to_string_pretty(&pipeline.to_matrix())?,
        ("yaml", true) => serde_yaml::to_string(&pipeline)?,
        ("yaml", false) => serde_yaml::to_string(&pipeline.to_matrix())?,
        (other, _) => anyhow::bail!("Unknown format '{}'. Use 'yaml' or 'json'.", other),
    };
    println!("{}", output);

    Ok(())
}

fn cmd_matrix(args: &RunArgs) -> Result<()> {
    let pipeline = prepare(args)?;
    display::print_matrix(&args.cifile, &pipeline.to_matrix());
    Ok(())
}

fn cmd_run(args: &RunArgs) -> Result<()> {
    let pipeline = prepare(args)?;
    display::print_run(&pipeline.to_matrix().run_listing());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env() {
        assert_eq!(
            parse_env("KEY=some=value").unwrap(),
            ("KEY".to_string(), "some=value".to_string())
        );
        assert_eq!(parse_env("FLAG").unwrap(), ("FLAG".to_string(), String::new()));
        assert!(parse_env("=value").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["ciflux", "run"]).unwrap();
        let Commands::Run { run } = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(run.cifile, PathBuf::from(".ci.yml"));
        assert_eq!(run.branch, "master");
        assert_eq!(run.source, "trigger");
        assert_eq!(run.sha.len(), 40);
        assert!(run.tag.is_none());
    }

    #[test]
    fn test_cli_repeated_env() {
        let cli = Cli::try_parse_from([
            "ciflux", "dump", "pipeline.yml", "--env", "A=1", "--env", "B=2", "--format",
            "json",
        ])
        .unwrap();
        let Commands::Dump { run, format, .. } = cli.command else {
            panic!("expected dump subcommand");
        };
        assert_eq!(run.env.len(), 2);
        assert_eq!(format, "json");

        let build = build_info(&run);
        assert_eq!(build.commit_ref_name, "master");
        assert!(build.is_triggered());
    }
}
