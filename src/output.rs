//! Terminal rendering of matches, run statistics and configuration
use crate::config::Config;
use crate::matcher::LiteralMatcher;
use crate::results::{MatchRecord, SearchStats};
use byte_unit::{Byte, UnitType};
use colored::Colorize;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt::Write;

/// Hex characters shown for a binary match before the context is cut.
pub const BINARY_PREVIEW_CHARS: usize = 60;

lazy_static! {
    static ref ANSI_ESCAPE: Regex = Regex::new(r"\x1b\[[0-9;]*m").unwrap();
}

/// Renders rows of cells under a header.
pub trait TableFormatter {
    fn render(&self, headers: &[&str], rows: &[Vec<String>]) -> String;
}

/// Boxed grid with `=` under the header row.
#[derive(Debug, Default, Clone, Copy)]
pub struct GridTable;

impl TableFormatter for GridTable {
    fn render(&self, headers: &[&str], rows: &[Vec<String>]) -> String {
        let mut widths: Vec<usize> = headers.iter().map(|h| visible_width(h)).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(visible_width(cell));
                }
            }
        }

        let mut out = render_rule(&widths, '-');
        out.push_str(&render_line(&widths, headers));
        out.push_str(&render_rule(&widths, '='));
        for row in rows {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            out.push_str(&render_line(&widths, &cells));
            out.push_str(&render_rule(&widths, '-'));
        }
        out
    }
}

fn render_rule(widths: &[usize], fill: char) -> String {
    let mut line = String::from("+");
    for w in widths {
        line.extend(std::iter::repeat(fill).take(w + 2));
        line.push('+');
    }
    line.push('\n');
    line
}

fn render_line(widths: &[usize], cells: &[&str]) -> String {
    let mut out = String::from("|");
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).copied().unwrap_or("");
        out.push(' ');
        out.push_str(cell);
        out.extend(std::iter::repeat(' ').take(w - visible_width(cell) + 1));
        out.push('|');
    }
    out.push('\n');
    out
}

fn visible_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}

pub fn strip_ansi(s: &str) -> String {
    ANSI_ESCAPE.replace_all(s, "").into_owned()
}

/// Match table with File / Position / Context columns.
///
/// With `highlight` set, occurrences of `pattern` inside text contexts are
/// colored.
pub fn format_results(
    table: &dyn TableFormatter,
    results: &[MatchRecord],
    pattern: Option<(&str, bool)>,
    highlight: bool,
) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    let matcher = pattern
        .filter(|_| highlight)
        .map(|(text, case_sensitive)| LiteralMatcher::text(text, case_sensitive));

    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| {
            let (position, context) = if r.is_binary {
                ("Binary data".to_string(), binary_preview(r))
            } else {
                let context = match &matcher {
                    Some(m) => highlight_matches(&r.context, m),
                    None => r.context.clone(),
                };
                (format!("Line {}", r.line_number), context)
            };
            vec![r.file_path.clone(), position, context]
        })
        .collect();

    table.render(&["File", "Position", "Context"], &rows)
}

fn binary_preview(record: &MatchRecord) -> String {
    if record.context.len() > BINARY_PREVIEW_CHARS {
        format!(
            "Position {}: {}...",
            record.byte_position,
            &record.context[..BINARY_PREVIEW_CHARS]
        )
    } else {
        format!("Position {}: {}", record.byte_position, record.context)
    }
}

fn highlight_matches(context: &str, matcher: &LiteralMatcher) -> String {
    let chars: Vec<char> = context.chars().collect();
    let len = matcher.needle_len_chars();
    let mut out = String::with_capacity(context.len());
    let mut cursor = 0;
    for start in matcher.find_in_line(context) {
        if start < cursor {
            continue;
        }
        let end = (start + len).min(chars.len());
        out.extend(&chars[cursor..start]);
        let hit: String = chars[start..end].iter().collect();
        out.push_str(&hit.green().bold().to_string());
        cursor = end;
    }
    out.extend(&chars[cursor..]);
    out
}

pub fn format_stats(stats: &SearchStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "Search statistics:".green().bold());
    let mut row = |label: &str, value: String| {
        let _ = writeln!(out, "  {}: {}", label.cyan(), value);
    };
    if stats.archives_searched > 0 || stats.archives_skipped > 0 {
        row("Archives searched", stats.archives_searched.to_string());
        row("Archives skipped", stats.archives_skipped.to_string());
        row(
            "Files in archives searched",
            stats.files_in_archives_searched.to_string(),
        );
    } else {
        row("Files searched", stats.files_searched.to_string());
        row("Files skipped", stats.files_skipped.to_string());
    }
    row("Directories searched", stats.dirs_searched.to_string());
    row("Directories skipped", stats.dirs_skipped.to_string());
    row("Matches found", stats.matches_found.to_string());
    row("Errors", stats.errors.to_string());
    row("Duration", format!("{:.2}s", stats.duration_seconds));
    out
}

pub fn format_config(config: &Config) -> String {
    let size = Byte::from_u64(config.general.max_file_size_mb.saturating_mul(crate::options::MB))
        .get_appropriate_unit(UnitType::Binary);
    let list = |items: &[String]| {
        if items.is_empty() {
            "(none)".to_string()
        } else {
            items.join(", ")
        }
    };

    let mut out = String::new();
    if let Some(source) = &config.source {
        let _ = writeln!(out, "Loaded from {}", source.display());
    }
    let _ = writeln!(out, "{}", "[general]".yellow());
    let _ = writeln!(out, "  context_chars       = {}", config.general.context_chars);
    let _ = writeln!(
        out,
        "  max_file_size_mb    = {} ({:.2} {})",
        config.general.max_file_size_mb,
        size.get_value(),
        size.get_unit()
    );
    let _ = writeln!(out, "  search_hidden_files = {}", config.general.search_hidden_files);
    let _ = writeln!(out, "  timeout_seconds     = {}", config.general.timeout_seconds);
    let _ = writeln!(out, "  log_level           = {}", config.general.log_level);
    let _ = writeln!(out, "{}", "[filters]".yellow());
    let _ = writeln!(out, "  excluded_extensions = {}", list(&config.filters.excluded_extensions));
    let _ = writeln!(out, "  included_extensions = {}", list(&config.filters.included_extensions));
    let _ = writeln!(out, "  max_depth           = {}", config.filters.max_depth);
    let _ = writeln!(out, "  excluded_paths      = {}", list(&config.filters.excluded_paths));
    let _ = writeln!(out, "{}", "[output]".yellow());
    let _ = writeln!(out, "  save_results        = {}", config.output.save_results);
    let _ = writeln!(out, "  results_folder      = {}", config.output.results_folder.display());
    let _ = writeln!(out, "  highlight_matches   = {}", config.output.highlight_matches);
    out
}
