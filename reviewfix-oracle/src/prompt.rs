use reviewfix_types::{Finding, SourceBuffer};
use std::fmt::Write;

/// Build the single batched prompt for `findings` against `buffer`.
///
/// The artifact is sent as numbered lines so the oracle can anchor each finding's range.
pub fn build_prompt(buffer: &SourceBuffer, findings: &[Finding]) -> String {
    let width = buffer.line_count().max(1).to_string().len();
    let mut out = String::new();

    out.push_str("Here is the original code, one numbered line per row:\n\n");
    for (i, line) in buffer.lines().iter().enumerate() {
        let _ = writeln!(out, "{:>width$} | {line}", i + 1);
    }

    out.push_str("\nPlease apply the following code review recommendations:\n");
    for f in findings {
        let _ = writeln!(
            out,
            "- id {:?}, lines {}-{}: {}",
            f.id.as_str(),
            f.start_line,
            f.end_line,
            f.description.trim()
        );
    }

    out.push_str(
        "\nFor each recommendation, write replacement code for exactly its line range, \
         without line numbers. Respond with only a JSON object of the form\n\
         {\"corrections\":[{\"id\":\"<recommendation id>\",\"replacement\":\"<code>\"}]}\n\
         Use an empty replacement when you have no correction for a recommendation.\n",
    );
    out
}
