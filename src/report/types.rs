use crate::describe::{Description, DescriptionSource, DiffStats};

/// What a description is about.
#[derive(Debug, Clone)]
pub struct ReportHeader {
    /// `owner/repo`, or a label such as the patch file name for offline runs
    pub target: String,
    pub base: String,
    pub head: String,
}

/// A description ready to be shown or written out.
#[derive(Debug)]
pub struct Report {
    pub header: ReportHeader,
    pub stats: DiffStats,
    pub source: DescriptionSource,
    pub body: String,
}

impl Report {
    pub fn new(header: ReportHeader, description: Description) -> Self {
        Self {
            header,
            stats: description.stats,
            source: description.source,
            body: description.body,
        }
    }

    /// Whether the body came from the rule-based categorizer.
    pub fn is_rule_based(&self) -> bool {
        !matches!(self.source, DescriptionSource::Generated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_from_description() {
        let description = Description {
            body: "### 📚 Documentation\n- Updated documentation in `README.md`".to_string(),
            source: DescriptionSource::Fallback,
            stats: DiffStats {
                total_files: 1,
                total_additions: 3,
                total_deletions: 1,
                commits: 1,
            },
        };
        let header = ReportHeader {
            target: "org/repo".to_string(),
            base: "main".to_string(),
            head: "feature".to_string(),
        };
        let report = Report::new(header, description);
        assert!(report.is_rule_based());
        assert_eq!(report.stats.total_additions, 3);
    }
}
