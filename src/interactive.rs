//! Menu-driven session on top of [`App`]
use crate::app::App;
use crate::cli::{ConfigAction, SearchArgs};
use crate::error::{FilederError, Result};
use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use log::{error, info};
use std::path::PathBuf;

const MAIN_MENU: &[&str] = &[
    "Search files for a text",
    "Search archives",
    "Show configuration",
    "Edit configuration",
    "Load saved results",
    "System information",
    "Quit",
];

const CONFIG_FIELDS: &[&str] = &[
    "context_chars",
    "max_file_size_mb",
    "search_hidden_files",
    "timeout_seconds",
    "log_level",
    "excluded_extensions",
    "included_extensions",
    "max_depth",
    "excluded_paths",
    "save_results",
    "results_folder",
    "highlight_matches",
    "Add suggested excluded paths",
    "Save configuration",
    "Reset configuration",
    "Back",
];

fn prompt_error(e: dialoguer::Error) -> FilederError {
    FilederError::Other(format!("prompt failed: {e}"))
}

pub struct InteractiveSession<'a> {
    app: &'a mut App,
    theme: ColorfulTheme,
}

impl<'a> InteractiveSession<'a> {
    pub fn new(app: &'a mut App) -> Self {
        Self {
            app,
            theme: ColorfulTheme::default(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        info!("Starting interactive session");
        println!("{}", "fileder: literal text search".cyan().bold());
        loop {
            let choice = Select::with_theme(&self.theme)
                .with_prompt("Choose an option")
                .items(MAIN_MENU)
                .default(0)
                .interact()
                .map_err(prompt_error)?;

            // A failing action must not end the session.
            let outcome = match choice {
                0 => self.search(false),
                1 => self.search(true),
                2 => self.app.handle_config(&ConfigAction::Show),
                3 => self.edit_config(),
                4 => self.load_results(),
                5 => {
                    self.system_info();
                    Ok(())
                }
                _ => break,
            };
            if let Err(e) = outcome {
                error!("{e}");
                println!("{} {e}", "Error:".red().bold());
            }
        }
        Ok(())
    }

    fn search(&mut self, archives: bool) -> Result<()> {
        let pattern: String = Input::with_theme(&self.theme)
            .with_prompt("Text to search for")
            .interact_text()
            .map_err(prompt_error)?;
        let directory: String = Input::with_theme(&self.theme)
            .with_prompt("Directory")
            .default(".".to_string())
            .interact_text()
            .map_err(prompt_error)?;
        let case_sensitive = Confirm::with_theme(&self.theme)
            .with_prompt("Case sensitive?")
            .default(false)
            .interact()
            .map_err(prompt_error)?;

        let args = SearchArgs {
            case_sensitive,
            ..SearchArgs::default()
        };
        let root = PathBuf::from(directory.trim());
        let outcome = if archives {
            self.app.run_archive_search(&root, &pattern, None, &args)?
        } else {
            let recursive = Confirm::with_theme(&self.theme)
                .with_prompt("Search subdirectories?")
                .default(true)
                .interact()
                .map_err(prompt_error)?;
            self.app.run_search(&root, &pattern, recursive, &args)?
        };
        self.app.report(&outcome, &args)?;
        Ok(())
    }

    fn load_results(&mut self) -> Result<()> {
        let files = self.app.saved_files()?;
        if files.is_empty() {
            return self.app.list_saved();
        }
        let names: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
        let choice = Select::with_theme(&self.theme)
            .with_prompt("Saved results")
            .items(&names)
            .default(names.len() - 1)
            .interact()
            .map_err(prompt_error)?;
        self.app.show_saved(&files[choice], false)
    }

    fn edit_config(&mut self) -> Result<()> {
        loop {
            let choice = Select::with_theme(&self.theme)
                .with_prompt("Configuration")
                .items(CONFIG_FIELDS)
                .default(0)
                .interact()
                .map_err(prompt_error)?;

            match CONFIG_FIELDS[choice] {
                "Back" => return Ok(()),
                "Save configuration" => self.app.handle_config(&ConfigAction::Save { path: None })?,
                "Reset configuration" => self.app.handle_config(&ConfigAction::Reset)?,
                "Add suggested excluded paths" => {
                    self.app
                        .handle_config(&ConfigAction::SuggestExcludes { apply: true })?
                }
                field => self.edit_field(field)?,
            }
        }
    }

    fn edit_field(&mut self, field: &str) -> Result<()> {
        let current = {
            let c = self.app.config();
            match field {
                "context_chars" => c.general.context_chars.to_string(),
                "max_file_size_mb" => c.general.max_file_size_mb.to_string(),
                "search_hidden_files" => c.general.search_hidden_files.to_string(),
                "timeout_seconds" => c.general.timeout_seconds.to_string(),
                "log_level" => c.general.log_level.clone(),
                "excluded_extensions" => c.filters.excluded_extensions.join(","),
                "included_extensions" => c.filters.included_extensions.join(","),
                "max_depth" => c.filters.max_depth.to_string(),
                "excluded_paths" => c.filters.excluded_paths.join(","),
                "save_results" => c.output.save_results.to_string(),
                "results_folder" => c.output.results_folder.display().to_string(),
                "highlight_matches" => c.output.highlight_matches.to_string(),
                _ => return Ok(()),
            }
        };

        let value: String = Input::with_theme(&self.theme)
            .with_prompt(field)
            .default(current)
            .allow_empty(true)
            .interact_text()
            .map_err(prompt_error)?;
        apply_field(self.app, field, value.trim())
    }

    fn system_info(&self) {
        println!("{}", "System information".cyan().bold());
        println!("  OS:           {}", std::env::consts::OS);
        println!("  Architecture: {}", std::env::consts::ARCH);
        println!("  CPUs:         {}", num_cpus::get());
        println!(
            "  Workers:      {}",
            crate::walker::worker_count()
        );
        let suggested = crate::config::Config::suggested_excluded_paths();
        if !suggested.is_empty() {
            println!("  Paths worth excluding: {}", suggested.join(", "));
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| FilederError::Config(format!("invalid value for {field}: '{value}'")))
}

/// Sets one configuration field from its textual form.
pub fn apply_field(app: &mut App, field: &str, value: &str) -> Result<()> {
    let c = app.config_mut();
    match field {
        "context_chars" => c.general.context_chars = parse(field, value)?,
        "max_file_size_mb" => {
            let mb: u64 = parse(field, value)?;
            if mb == 0 {
                return Err(FilederError::Config(
                    "max_file_size_mb must be greater than 0".to_string(),
                ));
            }
            c.general.max_file_size_mb = mb;
        }
        "search_hidden_files" => c.general.search_hidden_files = parse(field, value)?,
        "timeout_seconds" => c.general.timeout_seconds = parse(field, value)?,
        "log_level" => c.general.log_level = value.to_string(),
        "excluded_extensions" => c.filters.excluded_extensions = split_list(value),
        "included_extensions" => c.filters.included_extensions = split_list(value),
        "max_depth" => c.filters.max_depth = parse(field, value)?,
        "excluded_paths" => c.filters.excluded_paths = split_list(value),
        "save_results" => c.output.save_results = parse(field, value)?,
        "results_folder" => c.output.results_folder = PathBuf::from(value),
        "highlight_matches" => c.output.highlight_matches = parse(field, value)?,
        other => return Err(FilederError::Config(format!("unknown setting {other}"))),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    fn app() -> App {
        App::new(Config::default(), Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn fields_are_parsed_into_config() {
        let mut app = app();
        apply_field(&mut app, "context_chars", "42").unwrap();
        apply_field(&mut app, "search_hidden_files", "true").unwrap();
        apply_field(&mut app, "included_extensions", ".rs, .md ,").unwrap();
        let c = app.config();
        assert_eq!(c.general.context_chars, 42);
        assert!(c.general.search_hidden_files);
        assert_eq!(c.filters.included_extensions, vec![".rs", ".md"]);
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut app = app();
        assert!(apply_field(&mut app, "max_depth", "deep").is_err());
        assert!(apply_field(&mut app, "max_file_size_mb", "0").is_err());
        assert!(apply_field(&mut app, "nope", "1").is_err());
        assert_eq!(app.config().filters.max_depth, 5);
    }

    #[test]
    fn every_editable_field_is_known() {
        let mut app = app();
        for field in CONFIG_FIELDS.iter().take(12) {
            let value = match *field {
                "search_hidden_files" | "save_results" | "highlight_matches" => "false",
                "log_level" | "results_folder" | "excluded_extensions"
                | "included_extensions" | "excluded_paths" => "x",
                _ => "1",
            };
            apply_field(&mut app, field, value).unwrap();
        }
    }
}
