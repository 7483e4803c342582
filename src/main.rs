mod cli;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use penny::settings::load_settings;

fn init_tracing() {
    let level = load_settings().log_level;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir)?,
        Commands::Add(args) => cli::records::add(args)?,
        Commands::Update { id, fields } => cli::records::update(id, fields)?,
        Commands::Delete { id } => cli::records::delete(id)?,
        Commands::List(args) => cli::list::run(args)?,
        Commands::Search { term } => cli::search::run(&term)?,
        Commands::Summary => cli::summary::run()?,
        Commands::Import { file } => {
            cli::import::run(&file).with_context(|| format!("importing {file}"))?
        }
        Commands::Demo { count } => cli::demo::run(count)?,
        Commands::Status => cli::status::run()?,
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
