//! Command handling shared by the subcommands and the interactive menu
use crate::archive::ArchiveSearcher;
use crate::cli::{ConfigAction, SearchArgs};
use crate::config::Config;
use crate::context::SearchContext;
use crate::error::{FilederError, Result};
use crate::options::{SearchOptions, SearchPattern};
use crate::output::{GridTable, format_config, format_results, format_stats};
use crate::results::{self, MatchRecord, SavedSearch, SearchStats};
use crate::walker::DirectoryWalker;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use is_terminal::IsTerminal;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// Matches and statistics of one finished run.
#[derive(Debug)]
pub struct SearchOutcome {
    pub pattern: SearchPattern,
    pub directory: PathBuf,
    pub matches: Vec<MatchRecord>,
    pub stats: SearchStats,
}

pub struct App {
    config: Config,
    cancel: Arc<AtomicBool>,
}

impl App {
    pub fn new(config: Config, cancel: Arc<AtomicBool>) -> Self {
        Self { config, cancel }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    fn options(&self, args: &SearchArgs) -> Result<SearchOptions> {
        let mut options = self.config.search_options()?;
        if let Some(context) = args.context {
            options.context_chars = context;
        }
        if let Some(depth) = args.max_depth {
            options.max_depth = depth;
        }
        if let Some(timeout) = args.timeout {
            options.timeout_seconds = timeout;
        }
        if args.hidden {
            options.search_hidden_files = true;
        }
        if let Some(exts) = &args.extensions {
            options = options.with_included_extensions(exts);
        }
        Ok(options)
    }

    fn context(&self, options: SearchOptions) -> SearchContext {
        let mut ctx = SearchContext::new(options).with_cancel_flag(Arc::clone(&self.cancel));
        if std::io::stderr().is_terminal() {
            ctx = ctx.with_progress_bar(spinner());
        }
        ctx
    }

    pub fn run_search(
        &self,
        root: &Path,
        pattern: &str,
        recursive: bool,
        args: &SearchArgs,
    ) -> Result<SearchOutcome> {
        let pattern = SearchPattern::new(pattern, args.case_sensitive)?;
        check_root(root)?;
        let ctx = self.context(self.options(args)?);
        info!("Searching {} for '{}'", root.display(), pattern.text());

        let (matches, stats) = DirectoryWalker::new(ctx).walk(root, &pattern, recursive);
        Ok(SearchOutcome {
            pattern,
            directory: root.to_path_buf(),
            matches,
            stats,
        })
    }

    pub fn run_archive_search(
        &self,
        root: &Path,
        pattern: &str,
        scratch: Option<&Path>,
        args: &SearchArgs,
    ) -> Result<SearchOutcome> {
        let pattern = SearchPattern::new(pattern, args.case_sensitive)?;
        check_root(root)?;
        let ctx = self.context(self.options(args)?);
        info!("Searching archives in {} for '{}'", root.display(), pattern.text());

        let mut searcher = ArchiveSearcher::new(ctx);
        if let Some(dir) = scratch {
            searcher = searcher.with_scratch_root(dir);
        }
        let (matches, stats) = searcher.search_archives(root, &pattern);
        Ok(SearchOutcome {
            pattern,
            directory: root.to_path_buf(),
            matches,
            stats,
        })
    }

    /// Prints the outcome and saves it when configured; returns the saved file.
    pub fn report(&self, outcome: &SearchOutcome, args: &SearchArgs) -> Result<Option<PathBuf>> {
        if args.json {
            let saved = SavedSearch::new(
                outcome.pattern.text(),
                &outcome.directory,
                outcome.matches.clone(),
                outcome.stats.clone(),
            );
            println!("{}", serde_json::to_string_pretty(&saved)?);
        } else {
            println!(
                "{}",
                format_results(
                    &GridTable,
                    &outcome.matches,
                    Some((outcome.pattern.text(), outcome.pattern.case_sensitive())),
                    self.config.output.highlight_matches,
                )
            );
            println!("{}", format_stats(&outcome.stats));
        }

        if !self.config.output.save_results || args.no_save {
            return Ok(None);
        }
        let path = results::save_results(
            &self.config.output.results_folder,
            outcome.pattern.text(),
            &outcome.directory,
            &outcome.matches,
            &outcome.stats,
        )?;
        if !args.json {
            println!("{} {}", "Results saved to".green(), path.display());
        }
        Ok(Some(path))
    }

    pub fn show_saved(&self, file: &Path, json: bool) -> Result<()> {
        let saved = results::load_results(file)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&saved)?);
            return Ok(());
        }
        println!(
            "{} '{}' in {} ({})",
            "Search for".green(),
            saved.search_pattern,
            saved.directory,
            saved.timestamp
        );
        println!(
            "{}",
            format_results(&GridTable, &saved.results, None, false)
        );
        println!("{}", format_stats(&saved.stats));
        Ok(())
    }

    pub fn saved_files(&self) -> Result<Vec<PathBuf>> {
        results::list_saved_results(&self.config.output.results_folder)
    }

    pub fn list_saved(&self) -> Result<()> {
        let files = self.saved_files()?;
        if files.is_empty() {
            println!(
                "{} {}",
                "No saved results in".yellow(),
                self.config.output.results_folder.display()
            );
        }
        for file in files {
            println!("{}", file.display());
        }
        Ok(())
    }

    pub fn handle_config(&mut self, action: &ConfigAction) -> Result<()> {
        match action {
            ConfigAction::Show => print!("{}", format_config(&self.config)),
            ConfigAction::Save { path } => {
                let path = path.clone().unwrap_or_else(|| self.config.target_path());
                self.config.save(&path)?;
                println!("{} {}", "Configuration saved to".green(), path.display());
            }
            ConfigAction::Reset => {
                self.config.reset();
                let path = self.config.target_path();
                self.config.save(&path)?;
                println!("{} {}", "Configuration reset:".green(), path.display());
            }
            ConfigAction::SuggestExcludes { apply } => {
                let suggested = Config::suggested_excluded_paths();
                if suggested.is_empty() {
                    println!("No suggestions for this platform.");
                    return Ok(());
                }
                for path in &suggested {
                    println!("  {path}");
                }
                if *apply {
                    let added = self.config.add_excluded_paths(&suggested);
                    let path = self.config.target_path();
                    self.config.save(&path)?;
                    println!("{} {added} path(s) to {}", "Added".green(), path.display());
                }
            }
        }
        Ok(())
    }
}

fn check_root(root: &Path) -> Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        warn!("Refusing to search {}: not a directory", root.display());
        Err(FilederError::InvalidRoot(root.to_path_buf()))
    }
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
    {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn app(results_folder: &Path) -> App {
        let mut config = Config::default();
        config.output.results_folder = results_folder.to_path_buf();
        config.filters.max_depth = 0;
        App::new(config, Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn cli_overrides_apply_on_top_of_config() {
        let dir = tempdir().unwrap();
        let args = SearchArgs {
            context: Some(3),
            max_depth: Some(9),
            hidden: true,
            extensions: Some(vec!["RS".into()]),
            ..SearchArgs::default()
        };
        let opts = app(dir.path()).options(&args).unwrap();
        assert_eq!(opts.context_chars, 3);
        assert_eq!(opts.max_depth, 9);
        assert!(opts.search_hidden_files);
        assert_eq!(opts.included_extensions, vec![".rs"]);
    }

    #[test]
    fn search_and_save() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir(&data).unwrap();
        fs::write(data.join("a.txt"), "hello world").unwrap();
        let results_dir = dir.path().join("results");

        let app = app(&results_dir);
        let args = SearchArgs {
            json: true,
            ..SearchArgs::default()
        };
        let outcome = app.run_search(&data, "HELLO", true, &args).unwrap();
        assert_eq!(outcome.matches.len(), 1);

        let saved = app.report(&outcome, &args).unwrap().unwrap();
        let loaded = results::load_results(&saved).unwrap();
        assert_eq!(loaded.results, outcome.matches);
        assert_eq!(app.saved_files().unwrap(), vec![saved]);
    }

    #[test]
    fn invalid_root_and_pattern_are_errors() {
        let dir = tempdir().unwrap();
        let app = app(dir.path());
        let args = SearchArgs::default();
        assert!(matches!(
            app.run_search(&dir.path().join("missing"), "x", true, &args),
            Err(FilederError::InvalidRoot(_))
        ));
        assert!(matches!(
            app.run_search(dir.path(), "", true, &args),
            Err(FilederError::InvalidPattern(_))
        ));
    }
}
