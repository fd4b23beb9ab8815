use super::step::{Step, StepOutcome};
use colored::{ColoredString, Colorize};

const COLUMN_GAP: usize = 3;
const HEADERS: [&str; 5] = ["Model", "API Level", "Locale", "Orientation", "Outcome"];

/// Human-readable label: the summary word followed by one parenthesized
/// suffix per set detail flag, e.g. `failure(Crashed)(TimedOut)`.
pub fn outcome_label(outcome: &StepOutcome) -> String {
    let mut label = outcome.summary().to_string();
    let mut suffix = |set: bool, name: &str| {
        if set {
            label.push('(');
            label.push_str(name);
            label.push(')');
        }
    };

    match outcome {
        StepOutcome::Failure(detail) => {
            suffix(detail.crashed, "Crashed");
            suffix(detail.not_installed, "NotInstalled");
            suffix(detail.other_native_crash, "OtherNativeCrash");
            suffix(detail.timed_out, "TimedOut");
            suffix(detail.unable_to_crawl, "UnableToCrawl");
        }
        StepOutcome::Inconclusive(detail) => {
            suffix(detail.aborted_by_user, "AbortedByUser");
            suffix(detail.infrastructure_failure, "InfrastructureFailure");
        }
        StepOutcome::Skipped(detail) => {
            suffix(detail.incompatible_app_version, "IncompatibleAppVersion");
            suffix(detail.incompatible_architecture, "IncompatibleArchitecture");
            suffix(detail.incompatible_device, "IncompatibleDevice");
        }
        StepOutcome::Success | StepOutcome::Unrecognized(_) => {}
    }

    label
}

/// Terminal coloring for an already rendered label. Presentation only.
pub fn colorize(outcome: &StepOutcome, text: &str) -> ColoredString {
    match outcome {
        StepOutcome::Success => text.green(),
        StepOutcome::Failure(_) => text.red(),
        StepOutcome::Inconclusive(_) => text.yellow(),
        StepOutcome::Skipped(_) => text.blue(),
        StepOutcome::Unrecognized(_) => text.normal(),
    }
}

/// Row cells for one step: model, API level, locale, orientation, outcome.
pub fn table_row(step: &Step) -> [String; 5] {
    let cell = |key: &str| step.dimension.get(key).unwrap_or_default().to_string();
    [
        cell("Model"),
        cell("Version"),
        cell("Locale"),
        cell("Orientation"),
        outcome_label(&step.outcome),
    ]
}

/// Render the per-step results table, one line per step in input order.
pub fn results_table(steps: &[Step]) -> String {
    let rows: Vec<[String; 5]> = steps.iter().map(table_row).collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &HEADERS.map(String::from), &widths, None);
    for (row, step) in rows.iter().zip(steps) {
        push_line(&mut out, row, &widths, Some(&step.outcome));
    }
    out
}

fn push_line(out: &mut String, cells: &[String; 5], widths: &[usize; 5], outcome: Option<&StepOutcome>) {
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        let padding = " ".repeat(width - cell.chars().count() + COLUMN_GAP);
        // Pad before coloring so escape codes don't skew the columns.
        match outcome {
            Some(outcome) if i == cells.len() - 1 => {
                out.push_str(&colorize(outcome, cell).to_string())
            }
            _ => out.push_str(cell),
        }
        out.push_str(&padding);
    }
    let trimmed = out.trim_end_matches(' ').len();
    out.truncate(trimmed);
    out.push('\n');
}
