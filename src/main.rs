use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use voynich_roles::{
    embedding::provider_from_config,
    pipeline::stages,
    probe::{run_probe_stage, ProbeTarget},
    PipelineConfig,
};

#[derive(Parser, Debug)]
#[command(name = "voynich", about = "Cluster-to-role inference over the Voynich transcription")]
struct Cli {
    /// Path to config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Override the results directory
    #[arg(long, global = true)]
    results_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stem the corpus, embed, cluster, and write the lookup.
    Cluster {
        /// Corpus text file, or a directory of token files
        #[arg(long)]
        corpus: PathBuf,
    },

    /// Project tagged corpus lines onto cluster labels.
    Project {
        /// Corpus text file (one tagged paragraph per line)
        #[arg(long)]
        corpus: PathBuf,
    },

    /// Summarize clusters and infer roles.
    Roles,

    /// Build the cluster transition matrix.
    Transitions,

    /// Assemble the candidate lexicon.
    Lexicon,

    /// Compare cluster words with reference words of known languages.
    Probe {
        /// Cluster to probe
        #[arg(long, conflicts_with = "words")]
        cluster: Option<u32>,
        /// Explicit comma-separated word list
        #[arg(long, value_delimiter = ',')]
        words: Vec<String>,
    },

    /// Run cluster, project, roles, transitions and lexicon in order.
    Run {
        /// Corpus text file
        #[arg(long)]
        corpus: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.data_dir, cli.results_dir)?;

    match cli.command {
        Commands::Cluster { corpus } => cmd_cluster(&config, &corpus)?,
        Commands::Project { corpus } => {
            stages::run_project_stage(&config, &corpus).context("project stage failed")?;
        }
        Commands::Roles => cmd_roles(&config)?,
        Commands::Transitions => {
            stages::run_transitions_stage(&config).context("transitions stage failed")?;
        }
        Commands::Lexicon => {
            let records = stages::run_lexicon_stage(&config).context("lexicon stage failed")?;
            println!("{} lexicon candidates", records.len());
        }
        Commands::Probe { cluster, words } => cmd_probe(&config, cluster, words)?,
        Commands::Run { corpus } => {
            cmd_cluster(&config, &corpus)?;
            stages::run_project_stage(&config, &corpus).context("project stage failed")?;
            cmd_roles(&config)?;
            stages::run_transitions_stage(&config).context("transitions stage failed")?;
            stages::run_lexicon_stage(&config).context("lexicon stage failed")?;
        }
    }

    Ok(())
}

fn load_config(
    path: Option<&Path>,
    data_dir: Option<PathBuf>,
    results_dir: Option<PathBuf>,
) -> anyhow::Result<PipelineConfig> {
    let mut config = match path {
        Some(p) => PipelineConfig::from_json_file(p)
            .with_context(|| format!("failed to load config {}", p.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(d) = data_dir {
        config.data_dir = d;
    }
    if let Some(d) = results_dir {
        config.results_dir = d;
    }
    config.validate()?;
    tracing::debug!("Using config: {:?}", config);
    Ok(config)
}

fn cmd_cluster(config: &PipelineConfig, corpus: &Path) -> anyhow::Result<()> {
    let provider = provider_from_config(&config.embedding).context("failed to build embedding provider")?;
    let outcome = stages::run_cluster_stage(config, corpus, provider.as_ref())
        .with_context(|| format!("cluster stage failed on {}", corpus.display()))?;
    println!(
        "{} stems in {} clusters (inertia {:.4}, {:?} projection)",
        outcome.stems.len(),
        outcome.k,
        outcome.inertia,
        outcome.projection.method
    );
    Ok(())
}

fn cmd_roles(config: &PipelineConfig) -> anyhow::Result<()> {
    let summary = stages::run_roles_stage(config).context("roles stage failed")?;
    println!("{:<8} {:>8} {:>8} {:>8} {:>8}  Role", "Cluster", "Total", "Unique", "Starts", "Ends");
    for s in &summary {
        println!(
            "{:<8} {:>8} {:>8} {:>8} {:>8}  {}",
            s.cluster, s.total, s.unique, s.starts, s.ends, s.role
        );
    }
    Ok(())
}

fn cmd_probe(config: &PipelineConfig, cluster: Option<u32>, words: Vec<String>) -> anyhow::Result<()> {
    let target = match cluster {
        Some(c) => ProbeTarget::Cluster(c),
        None if !words.is_empty() => ProbeTarget::Words(words),
        None => anyhow::bail!("pass --cluster or --words"),
    };
    let provider = provider_from_config(&config.embedding).context("failed to build embedding provider")?;
    let rows = run_probe_stage(config, provider.as_ref(), &target).context("probe failed")?;
    for r in &rows {
        println!("{:<12} {:<10} {:.4}", r.word, r.language, r.similarity);
    }
    Ok(())
}
