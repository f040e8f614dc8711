use std::cell::Cell;
use std::io::{self, Write};

use crossterm::ExecutableCommand;
use crossterm::cursor::MoveToColumn;
use crossterm::terminal::{Clear, ClearType};
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, RunSummary, indent};

const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

/// Human-readable line for every event except byte transfers.
pub fn describe(event: &ProgressEvent) -> Option<String> {
    match event {
        ProgressEvent::ProjectHeader { id, name } => Some(format!("Project: [{id}] {name}")),
        ProgressEvent::SampleHeader { id, name, depth } => {
            Some(format!("{}Sample: [{id}] {name}", indent(*depth)))
        }
        ProgressEvent::File {
            id,
            name,
            size,
            depth,
        } => Some(format!(
            "{}[{id}] {name} ({})",
            indent(*depth),
            bytes_to_human(*size)
        )),
        ProgressEvent::Skipped {
            name,
            reason,
            depth,
        } => Some(format!("{}{name} skipped: {reason}", indent(*depth))),
        ProgressEvent::Transfer { .. } | ProgressEvent::Completed { .. } => None,
    }
}

pub fn progress_line(done: u64, total: u64, depth: usize) -> String {
    let percent = if total == 0 {
        100
    } else {
        (done.min(total) as u128 * 100 / total as u128) as u8
    };
    format!(
        "{}{} {} / {}",
        indent(depth),
        progress_bar(percent),
        bytes_to_human(done),
        bytes_to_human(total)
    )
}

fn progress_bar(percent: u8) -> String {
    let filled = (percent as usize * BAR_WIDTH) / 100;
    let mut out = String::from("[");
    for i in 0..BAR_WIDTH {
        out.push(if i < filled { '=' } else { ' ' });
    }
    out.push(']');
    out
}

pub fn bytes_to_human(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let value = bytes as f64;
    if value >= GB {
        format!("{:.1} GB", value / GB)
    } else if value >= MB {
        format!("{:.1} MB", value / MB)
    } else if value >= KB {
        format!("{:.1} KB", value / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Writes headers to stderr and redraws a single progress line in place.
#[derive(Default)]
pub struct TerminalOutput {
    bar_open: Cell<bool>,
}

impl TerminalOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn redraw(&self, line: &str) -> io::Result<()> {
        let mut stderr = io::stderr();
        stderr.execute(MoveToColumn(0))?;
        stderr.execute(Clear(ClearType::CurrentLine))?;
        write!(stderr, "{line}")?;
        stderr.flush()
    }

    fn close_bar(&self) {
        if self.bar_open.replace(false) {
            eprintln!();
        }
    }
}

impl ProgressSink for TerminalOutput {
    fn event(&self, event: ProgressEvent) {
        match &event {
            ProgressEvent::Transfer { done, total, depth } => {
                if self.redraw(&progress_line(*done, *total, *depth)).is_ok() {
                    self.bar_open.set(true);
                }
            }
            ProgressEvent::Completed { .. } => self.close_bar(),
            other => {
                self.close_bar();
                if let Some(line) = describe(other) {
                    eprintln!("{line}");
                }
            }
        }
    }
}

impl Drop for TerminalOutput {
    fn drop(&mut self) {
        self.close_bar();
    }
}

/// Plain stderr lines for logs and CI, plus a JSON summary on stdout.
pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, event: ProgressEvent) {
        match &event {
            ProgressEvent::Completed { name, bytes, depth } => {
                eprintln!("{}{name} done ({})", indent(*depth), bytes_to_human(*bytes));
            }
            other => {
                if let Some(line) = describe(other) {
                    eprintln!("{line}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::SkipReason;

    #[test]
    fn header_lines_are_indented() {
        let sample = ProgressEvent::SampleHeader {
            id: "17".parse().unwrap(),
            name: "NA12878".to_string(),
            depth: 1,
        };
        assert_eq!(describe(&sample).unwrap(), "  Sample: [17] NA12878");

        let skipped = ProgressEvent::Skipped {
            name: "a.fastq.gz".to_string(),
            reason: SkipReason::AlreadyExists,
            depth: 2,
        };
        assert_eq!(
            describe(&skipped).unwrap(),
            "    a.fastq.gz skipped: already exists"
        );
    }

    #[test]
    fn progress_line_clamps_and_handles_zero_total() {
        assert_eq!(
            progress_line(50, 100, 0),
            "[==========          ] 50 B / 100 B"
        );
        assert!(progress_line(500, 100, 0).starts_with("[===================="));
        assert!(progress_line(0, 0, 1).starts_with("  [===================="));
    }

    #[test]
    fn human_sizes() {
        assert_eq!(bytes_to_human(512), "512 B");
        assert_eq!(bytes_to_human(2048), "2.0 KB");
        assert_eq!(bytes_to_human(3 * 1024 * 1024 * 1024), "3.0 GB");
    }
}
