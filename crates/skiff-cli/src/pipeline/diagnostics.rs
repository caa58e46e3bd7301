//! Compiler diagnostic parsing.
//!
//! The compiler's raw text output is parsed into structured diagnostics when
//! it matches the expected grammar:
//!
//! ```text
//! /abs/path/File.swift:12:5: error: cannot find 'foo' in scope
//!     foo()
//!     ^
//! ```
//!
//! Consecutive diagnostics referencing the same file are grouped. The
//! grammar is a best-effort contract with the toolchain, not a stable
//! interface: on any mismatch parsing exits gracefully and the caller falls
//! back to the raw text.

use owo_colors::OwoColorize;
use std::collections::VecDeque;
use std::path::PathBuf;

/// All diagnostic places reported for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerDiagnostic {
    /// The file the compiler pointed at
    pub file: PathBuf,
    /// Places inside that file, in reported order
    pub places: Vec<DiagnosticPlace>,
}

/// One error location: reason, offending source line and caret pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticPlace {
    /// 1-based line in the file
    pub line: u32,
    /// Human-readable reason
    pub reason: String,
    /// Source snippet the compiler echoed
    pub code: String,
    /// Caret pointer line marking the column
    pub pointer: String,
}

/// Parse raw compiler output into structured diagnostics.
///
/// Returns `None` when nothing in the output matches the grammar; callers
/// surface the raw text instead.
pub fn parse(raw: &str) -> Option<Vec<CompilerDiagnostic>> {
    let mut lines: VecDeque<&str> = raw.lines().collect();
    let mut errors: Vec<CompilerDiagnostic> = Vec::new();

    while let Some(line) = lines.pop_front() {
        if !line_is_place(line) {
            continue;
        }

        let mut places: Vec<DiagnosticPlace> = Vec::new();
        let mut file: Option<PathBuf> = None;
        let mut current = Some(line);

        while let Some(place_line) = current.take() {
            let Some(components) = place_error_components(place_line) else {
                break;
            };
            let path = components[0];
            file.get_or_insert_with(|| PathBuf::from(path));

            let Ok(line_in_file) = components[1].parse::<u32>() else {
                break;
            };
            let reason = components[4].trim().to_string();

            // The grammar requires the snippet line followed by a caret.
            let Some(code) = lines.pop_front() else {
                break;
            };
            let Some(pointer) = lines.pop_front() else {
                break;
            };
            if !pointer.contains('^') {
                break;
            }

            places.push(DiagnosticPlace {
                line: line_in_file,
                reason,
                code: code.to_string(),
                pointer: pointer.to_string(),
            });

            // Fold a consecutive diagnostic for the same file into this group.
            if let Some(next) = lines.front() {
                if line_is_place(next)
                    && place_error_components(next).map(|c| c[0]) == Some(path)
                {
                    current = lines.pop_front();
                }
            }
        }

        if let (Some(file), false) = (file, places.is_empty()) {
            errors.push(CompilerDiagnostic { file, places });
        }
    }

    if errors.is_empty() {
        None
    } else {
        Some(errors)
    }
}

fn line_is_place(line: &str) -> bool {
    line.starts_with('/') && line.split('/').count() > 1 && line.contains(".swift:")
}

fn place_error_components(line: &str) -> Option<Vec<&str>> {
    let components: Vec<&str> = line.split(':').collect();
    if components.len() != 5 || !components[3].contains("error") {
        return None;
    }
    Some(components)
}

/// Render diagnostics for the terminal.
pub fn render(diagnostics: &[CompilerDiagnostic]) -> String {
    let mut out = String::new();
    for diagnostic in diagnostics {
        let name = diagnostic
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        out.push_str(&format!(
            "\n {} {}\n\n",
            name.green().bold(),
            diagnostic.file.display().dimmed()
        ));
        for place in &diagnostic.places {
            let line_label = format!("{} |", place.line);
            out.push_str(&format!(
                "   {} {}\n",
                " ERROR ".white().on_red().bold(),
                place.reason
            ));
            out.push_str(&format!("   {} {}\n", line_label.cyan(), place.code));
            let gutter = " ".repeat(line_label.len().saturating_sub(1));
            out.push_str(&format!(
                "   {}{} {}\n\n",
                gutter,
                "|".cyan(),
                place.pointer.red()
            ));
        }
    }
    out
}
