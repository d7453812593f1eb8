//! Writing command results.
//!
//! A [`Printer`] carries the `--output`, `--color` and `--quiet` choices
//! and knows the three shapes towersync prints: a listing of cached
//! objects, a raw GraphQL document, and a stream of watch deltas written
//! one line at a time.

use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Local};
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};
use towersync_core::{Delta, Object, ObjectKind};

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};

/// Whether to emit ANSI color for `mode`, given what stdout is and
/// whether `NO_COLOR` is set.
fn color_enabled(mode: &ColorMode, is_terminal: bool, no_color: bool) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => is_terminal && !no_color,
    }
}

/// One delta in the JSON output modes.
#[derive(Serialize)]
struct DeltaLine<'a> {
    time: String,
    kind: ObjectKind,
    action: &'static str,
    key: &'a str,
    object: &'a Object,
}

pub struct Printer<W> {
    out: W,
    format: OutputFormat,
    color: bool,
    quiet: bool,
}

impl Printer<io::Stdout> {
    pub fn stdout(global: &GlobalOpts) -> Self {
        let out = io::stdout();
        let color = color_enabled(
            &global.color,
            out.is_terminal(),
            std::env::var_os("NO_COLOR").is_some(),
        );
        Self::new(out, global.output.clone(), color, global.quiet)
    }
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, format: OutputFormat, color: bool, quiet: bool) -> Self {
        Self {
            out,
            format,
            color,
            quiet,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print a listing: `R` rows as a table, the items themselves as
    /// JSON, or one key per line.
    pub fn listing<T, R>(
        &mut self,
        items: &[T],
        to_row: impl Fn(&T) -> R,
        key: impl Fn(&T) -> &str,
    ) -> io::Result<()>
    where
        T: Serialize,
        R: Tabled,
    {
        let text = match self.format {
            OutputFormat::Table => {
                let rows: Vec<R> = items.iter().map(to_row).collect();
                Table::new(rows).with(Style::rounded()).to_string()
            }
            OutputFormat::Json => json_pretty(items),
            OutputFormat::JsonCompact => json_compact(items),
            OutputFormat::Plain => items.iter().map(key).collect::<Vec<_>>().join("\n"),
        };
        self.line(&text)
    }

    /// Print a GraphQL document. Tables don't fit arbitrary response
    /// shapes, so `table` and `plain` fall back to pretty JSON.
    pub fn document<T: Serialize>(&mut self, doc: &T) -> io::Result<()> {
        let text = match self.format {
            OutputFormat::JsonCompact => json_compact(doc),
            OutputFormat::Table | OutputFormat::Json | OutputFormat::Plain => json_pretty(doc),
        };
        self.line(&text)
    }

    /// Print one watch delta observed at `at` and flush it.
    pub fn delta(&mut self, at: DateTime<Local>, kind: ObjectKind, delta: &Delta) -> io::Result<()> {
        let text = match self.format {
            OutputFormat::Json | OutputFormat::JsonCompact => json_compact(&DeltaLine {
                time: at.to_rfc3339(),
                kind,
                action: delta.action(),
                key: delta.key(),
                object: delta.object().as_ref(),
            }),
            OutputFormat::Plain => format!("{} {kind} {}", delta.action(), delta.key()),
            OutputFormat::Table => format!(
                "{} {} {kind:<5} {} {}",
                at.format("%H:%M:%S"),
                self.action_label(delta),
                delta.key(),
                display_name(delta.object()),
            ),
        };
        self.line(&text)?;
        self.out.flush()
    }

    /// The padded action word, colored by what happened.
    fn action_label(&self, delta: &Delta) -> String {
        let action = format!("{:<7}", delta.action());
        if !self.color {
            return action;
        }
        match delta {
            Delta::Added(_) => action.green().to_string(),
            Delta::Updated { .. } => action.yellow().to_string(),
            Delta::Deleted(_) => action.red().to_string(),
            Delta::Resync(_) => action.dimmed().to_string(),
        }
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        if self.quiet || text.is_empty() {
            return Ok(());
        }
        writeln!(self.out, "{text}")
    }
}

/// A short human-readable name for an object.
fn display_name(object: &Object) -> String {
    match object {
        Object::Vm(vm) => vm.name.clone(),
        Object::Label(label) => match label.value {
            Some(ref value) => format!("{}={value}", label.key),
            None => label.key.clone(),
        },
    }
}

fn json_pretty<T: Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string_pretty(data).expect("serialization should not fail")
}

fn json_compact<T: Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string(data).expect("serialization should not fail")
}
