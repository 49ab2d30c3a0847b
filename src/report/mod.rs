pub mod types;

pub use types::{Report, ReportHeader};

use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Output the report to terminal (default) or to a markdown file.
#[instrument(skip(report), fields(target = %report.header.target, source = %report.source))]
pub fn output(report: &Report, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing report to terminal");
            print_terminal_report(report);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing report to file");
            write_markdown_report(report, path)
        }
    }
}

/// Print the report with a colored summary line:
///
/// org/repo: main ← feature
/// Files changed: 7 | +320 -45 | Commits: 3 | rule-based
///
/// ═══ Description ═══
/// ...
fn print_terminal_report(report: &Report) {
    let stats = &report.stats;
    println!();
    println!(
        "{}: {} ← {}",
        report.header.target.bold(),
        report.header.base,
        report.header.head
    );
    println!(
        "Files changed: {} | {} {} | Commits: {} | {}",
        stats.total_files,
        format!("+{}", stats.total_additions).green(),
        format!("-{}", stats.total_deletions).red(),
        stats.commits,
        colorize_source(report)
    );
    println!();
    println!("═══ Description ═══");
    if report.body.is_empty() {
        println!("  No changes to describe.");
    } else {
        println!("{}", report.body);
    }
    println!();
}

fn write_markdown_report(report: &Report, path: &Path) -> Result<(), ReportError> {
    std::fs::write(path, render_markdown(report))?;
    Ok(())
}

/// The markdown written to a file. The body is emitted as-is so the file can
/// be passed straight to `create --body-file`.
pub fn render_markdown(report: &Report) -> String {
    let mut md = String::new();
    if report.body.is_empty() {
        md.push_str("_No changes to describe._\n");
    } else {
        md.push_str(&report.body);
        md.push('\n');
    }
    md.push_str(&format!(
        "\n<!-- {}: {}...{} | files: {} | +{} -{} | commits: {} | {} -->\n",
        report.header.target,
        report.header.base,
        report.header.head,
        report.stats.total_files,
        report.stats.total_additions,
        report.stats.total_deletions,
        report.stats.commits,
        report.source
    ));
    md
}

fn colorize_source(report: &Report) -> colored::ColoredString {
    let label = report.source.to_string();
    if report.is_rule_based() {
        label.yellow().bold()
    } else {
        label.green().bold()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::{Description, DescriptionSource, DiffStats};

    fn sample_report(source: DescriptionSource, body: &str) -> Report {
        Report::new(
            ReportHeader {
                target: "org/repo".to_string(),
                base: "main".to_string(),
                head: "feature".to_string(),
            },
            Description {
                body: body.to_string(),
                source,
                stats: DiffStats {
                    total_files: 7,
                    total_additions: 320,
                    total_deletions: 45,
                    commits: 3,
                },
            },
        )
    }

    #[test]
    fn test_render_markdown() {
        let report = sample_report(
            DescriptionSource::Generated {
                model: "gemini-2.5-flash".to_string(),
            },
            "## Summary\nAdds OAuth2 login.",
        );
        let md = render_markdown(&report);
        assert!(md.starts_with("## Summary\nAdds OAuth2 login.\n"));
        assert!(md.contains("org/repo: main...feature"));
        assert!(md.contains("+320 -45"));
        assert!(md.contains("generated by gemini-2.5-flash"));
    }

    #[test]
    fn test_write_markdown_report() {
        let report = sample_report(DescriptionSource::Algorithmic, "### 🔧 Improvements\n- Enhanced existing features");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("description.md");
        output(&report, Some(&path)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("### 🔧 Improvements"));
        assert!(content.contains("rule-based"));
    }

    #[test]
    fn test_empty_body_markdown() {
        let report = sample_report(DescriptionSource::Algorithmic, "");
        assert!(render_markdown(&report).starts_with("_No changes to describe._"));
    }

    #[test]
    fn test_output_to_terminal() {
        let report = sample_report(DescriptionSource::Fallback, "- Refactored code");
        // Should not panic
        output(&report, None).unwrap();
    }
}
