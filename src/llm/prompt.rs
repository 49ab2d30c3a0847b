use crate::github::{CommitSummary, FileChange};

/// Patch text beyond this many characters is cut from the prompt.
const PATCH_PREVIEW_CHARS: usize = 1000;
const SHORT_SHA_LEN: usize = 7;

const OUTPUT_ONLY: &str = "IMPORTANT: Output ONLY the PR description. Do NOT include conversational phrases \
like \"Here's the categorization\", \"I've grouped\", or \"Based on the changes\".";

/// Shape of the description the model is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DescriptionFormat {
    Simple,
    Categorized,
    #[default]
    Detailed,
}

/// What the description is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DescriptionMode {
    /// File diffs
    #[default]
    Patch,
    /// Commit messages
    Commit,
    /// Rule-based categorizer, no model call
    Algo,
}

/// The data a prompt describes.
#[derive(Debug, Clone, Copy)]
pub enum PromptSource<'a> {
    Files(&'a [FileChange]),
    Commits(&'a [CommitSummary]),
}

impl PromptSource<'_> {
    fn data_type(&self) -> &'static str {
        match self {
            PromptSource::Files(_) => "file diffs of pull request",
            PromptSource::Commits(_) => "commit messages of pull request",
        }
    }

    fn render(&self) -> String {
        match self {
            PromptSource::Commits(commits) => commits
                .iter()
                .map(|c| format!("{} {}", short_sha(&c.sha), c.message))
                .collect::<Vec<_>>()
                .join("\n"),
            PromptSource::Files(files) => files
                .iter()
                .map(|f| {
                    let patch: String = f
                        .patch
                        .as_deref()
                        .unwrap_or("")
                        .chars()
                        .take(PATCH_PREVIEW_CHARS)
                        .collect();
                    format!(
                        "{}: {}\nChanges: +{} -{}\n{}",
                        f.status, f.path, f.additions, f.deletions, patch
                    )
                })
                .collect::<Vec<_>>()
                .join("\n---\n"),
        }
    }
}

/// Build the generation prompt for the given data and format.
pub fn build_prompt(source: PromptSource<'_>, format: DescriptionFormat) -> String {
    let data_type = source.data_type();
    let heading = data_type.to_uppercase();
    let body = source.render();

    match format {
        DescriptionFormat::Simple => format!(
            "You are analyzing {data_type}.

Your task: Create a concise summary focusing on WHAT changed from a user/feature perspective, not technical file details.

Guidelines:
- Focus on features, functionality, and business logic changes
- Avoid listing individual files unless critical
- Group related changes together
- Use clear, non-technical language where possible
- Keep it brief

{OUTPUT_ONLY}

{heading}:
{body}

Generate a simple bullet-point summary of the key changes."
        ),
        DescriptionFormat::Categorized => format!(
            "You are analyzing {data_type}.

Your task: Categorize changes by their PURPOSE and IMPACT, not by file types or names.

CRITICAL INSTRUCTIONS:
- Group related changes that work together to achieve a feature
- Describe changes in terms of user-facing impact or system behavior
- Describe code-level changes only when needed to understand the context
- Avoid simply listing file names - explain what those changes accomplish
- Only include categories that have meaningful changes

Categories to use (only include relevant ones):
🚀 **New Features** - New capabilities or functionality added
🛠 **Bug Fixes** - Issues resolved or corrections made
🔧 **Improvements** - Enhancements to existing features
♻️ **Refactoring** - Code restructuring without behavior changes
🎨 **UI/UX Changes** - Visual or user experience updates
📚 **Documentation** - README, comments, or docs updates
🧪 **Testing** - Test additions or modifications
⚙️ **Configuration** - Build, deployment, or config changes

{OUTPUT_ONLY}

{heading}:
{body}

Analyze these changes and create a categorized description."
        ),
        DescriptionFormat::Detailed => format!(
            "You are writing a comprehensive pull request description based on {data_type}.

Your task: Create a detailed PR description that thoroughly explains the changes.

Structure your response with:

## Summary
A clear overview (2-3 sentences) of what this PR accomplishes and the problem it solves.

## Changes Made
- Specific components, functions, or modules that were modified
- New APIs, endpoints, or interfaces introduced
- Data model updates
- Dependencies added or updated

## Technical Details
- Implementation approach and patterns used
- How different parts of the code interact
- Error handling and edge cases addressed

## Impact & Considerations
- Which parts of the codebase are affected
- Breaking changes and migration steps required
- Performance and security considerations
- Testing approach and coverage

Focus on the WHAT and WHY so another developer can follow the change without reading every line.

{OUTPUT_ONLY}

{heading}:
{body}

Generate a comprehensive PR description following the structure above."
        ),
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..SHORT_SHA_LEN).unwrap_or(sha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::FileStatus;

    #[test]
    fn test_file_prompt_lists_changes() {
        let mut file = FileChange::new("src/lib.rs", FileStatus::Modified, 4, 2);
        file.patch = Some("@@ -1 +1 @@\n-old\n+new".to_string());
        let files = vec![file, FileChange::new("README.md", FileStatus::Added, 10, 0)];

        let prompt = build_prompt(PromptSource::Files(&files), DescriptionFormat::Simple);
        assert!(prompt.contains("FILE DIFFS OF PULL REQUEST:"));
        assert!(prompt.contains("MODIFIED: src/lib.rs\nChanges: +4 -2\n@@ -1 +1 @@"));
        assert!(prompt.contains("\n---\nADDED: README.md"));
        assert!(prompt.contains("Output ONLY the PR description"));
    }

    #[test]
    fn test_patch_is_truncated() {
        let mut file = FileChange::new("big.rs", FileStatus::Modified, 5000, 0);
        file.patch = Some("x".repeat(5000));
        let prompt = build_prompt(PromptSource::Files(std::slice::from_ref(&file)), DescriptionFormat::Detailed);
        assert!(prompt.contains(&"x".repeat(PATCH_PREVIEW_CHARS)));
        assert!(!prompt.contains(&"x".repeat(PATCH_PREVIEW_CHARS + 1)));
    }

    #[test]
    fn test_commit_prompt_uses_short_sha_and_message() {
        let commits = vec![
            CommitSummary {
                sha: "3f2a1c0d9e8b7a6f".to_string(),
                message: "Add login form".to_string(),
            },
            CommitSummary {
                sha: "b1".to_string(),
                message: "Fix redirect".to_string(),
            },
        ];
        let prompt = build_prompt(PromptSource::Commits(&commits), DescriptionFormat::Categorized);
        assert!(prompt.contains("COMMIT MESSAGES OF PULL REQUEST:\n3f2a1c0 Add login form\nb1 Fix redirect"));
        assert!(prompt.contains("🧪 **Testing**"));
    }

    #[test]
    fn test_formats_differ() {
        let files: Vec<FileChange> = vec![];
        let simple = build_prompt(PromptSource::Files(&files), DescriptionFormat::Simple);
        let detailed = build_prompt(PromptSource::Files(&files), DescriptionFormat::Detailed);
        assert!(simple.contains("bullet-point summary"));
        assert!(detailed.contains("## Impact & Considerations"));
    }
}
