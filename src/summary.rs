use std::io::Write;
use std::time::Duration;

use crate::dispatch::RunSummary;

/// Lines printed once the run has drained.
pub(crate) fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let mut lines = Vec::new();
    if summary.cancelled {
        lines.push(format!(
            "Run cancelled after {} of {} requests.",
            summary.completed, summary.total
        ));
    } else {
        lines.push("All manifest requests completed!".to_owned());
    }
    lines.push(format!("Time taken: {}", format_elapsed(summary.elapsed)));
    lines.push(format!(
        "Average rate: {} requests/second",
        summary.rate_per_second()
    ));
    lines.push(format!(
        "Outcomes: {} succeeded, {} auth failures, {} request failures",
        summary.tally.successes, summary.tally.auth_failures, summary.tally.request_failures
    ));
    lines
}

/// Writes the summary block, preceded by a blank line.
///
/// # Errors
///
/// Returns an error when the writer fails.
pub fn write_summary<W: Write>(writer: &mut W, summary: &RunSummary) -> std::io::Result<()> {
    writeln!(writer)?;
    for line in summary_lines(summary) {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()
}

fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    let secs = millis.checked_div(1000).unwrap_or(0);
    let rem = millis.checked_rem(1000).unwrap_or(0);
    format!("{}.{:03}s", secs, rem)
}
