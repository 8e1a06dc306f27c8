use clap::{CommandFactory, Parser};
use colored::Colorize;
use env_logger::{Builder, Env, Target};
use fileder::app::App;
use fileder::cli::{Cli, Commands};
use fileder::config::Config;
use fileder::error::{FilederError, Result as FilederResult};
use fileder::interactive::InteractiveSession;
use log::{LevelFilter, info, warn};
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

fn main() -> FilederResult<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    setup_logging(&cli, &config)?;

    let start_time = Instant::now();
    info!("Application started with command: {:?}", cli.command);
    if let Some(source) = &config.source {
        info!("Using configuration {}", source.display());
    }

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        if let Err(e) = ctrlc::set_handler(move || {
            cancel.store(true, Ordering::SeqCst);
        }) {
            warn!("Could not install Ctrl-C handler: {e}");
        }
    }

    let mut app = App::new(config, cancel);

    match &cli.command {
        Commands::Search {
            pattern,
            path,
            no_recursive,
            args,
        } => {
            let outcome = app.run_search(path, pattern, !no_recursive, args)?;
            app.report(&outcome, args)?;
        }
        Commands::Archives {
            pattern,
            path,
            scratch,
            args,
        } => {
            let outcome = app.run_archive_search(path, pattern, scratch.as_deref(), args)?;
            app.report(&outcome, args)?;
        }
        Commands::Load { file, json } => match file {
            Some(file) => app.show_saved(file, *json)?,
            None => app.list_saved()?,
        },
        Commands::Config { action } => app.handle_config(action)?,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "fileder", &mut std::io::stdout());
        }
        Commands::Interactive => {
            if let Err(e) = InteractiveSession::new(&mut app).run() {
                eprintln!("{}", format!("Interactive mode error: {e}").red());
                return Err(e);
            }
        }
    }

    info!(
        "Application finished. Total elapsed time: {:.2?}",
        start_time.elapsed()
    );
    Ok(())
}

fn setup_logging(cli: &Cli, config: &Config) -> FilederResult<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or(&config.general.log_level));
    if cli.verbose {
        builder.filter_level(LevelFilter::Debug);
    }

    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.module_path().unwrap_or("unknown"),
            record.args()
        )
    });

    if let Some(log_path) = &cli.log {
        if let Some(parent_dir) = log_path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                fs::create_dir_all(parent_dir).map_err(FilederError::Io)?;
            }
        }
        let log_file = fs::File::create(log_path).map_err(FilederError::Io)?;
        builder.target(Target::Pipe(Box::new(log_file)));
    } else {
        builder.target(Target::Stderr);
    }

    builder
        .try_init()
        .map_err(|e| FilederError::Other(e.to_string()))?;
    Ok(())
}
