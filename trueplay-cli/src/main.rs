//! # trueplay CLI
//!
//! Command-line interface for the trueplay script playground.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "trueplay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "trueplay.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script file, stdin, or a bundled template
    Run {
        /// Script file, or `-` for stdin
        #[arg(conflicts_with = "template")]
        file: Option<PathBuf>,

        /// Run the template with this id instead of a file
        #[arg(long)]
        template: Option<String>,

        /// Print the run's log as JSON
        #[arg(long)]
        json: bool,

        /// How to show the response
        #[arg(long, value_enum, default_value_t = ResultView::Code)]
        view: ResultView,
    },

    /// List the bundled templates
    Templates {
        /// Only list templates in this category
        #[arg(long)]
        category: Option<String>,

        /// Return JSON for machine consumption
        #[arg(long)]
        json: bool,
    },

    /// Print the code of a template
    Show {
        /// Template id
        id: String,
    },

    /// Write a default trueplay.yml
    Init {
        /// Target directory (defaults to current directory)
        path: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, ValueEnum)]
pub enum ResultView {
    Code,
    Table,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so stdout stays parseable
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::WARN.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run {
            file,
            template,
            json,
            view,
        } => {
            let source = match (file, template) {
                (_, Some(id)) => commands::ScriptSource::Template(id),
                (Some(path), None) => commands::ScriptSource::File(path),
                (None, None) => commands::ScriptSource::Stdin,
            };
            commands::run_script(&cli.config, source, json, view)
        }
        Commands::Templates { category, json } => commands::list_templates(category.as_deref(), json),
        Commands::Show { id } => commands::show_template(&id),
        Commands::Init { path } => commands::init_project(path.as_deref()),
    }
}
