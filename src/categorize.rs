//! Rule-based PR description used when text generation is off or unavailable.
//!
//! Each changed file is placed in exactly one [`Category`] by the first rule
//! that matches, in this order:
//!
//! 1. Documentation: `.md`, `.txt`, `.rst`, or "readme" anywhere in the path
//! 2. Testing: `.test.`, `.spec.`, or a `test`/`tests`/`__tests__` directory
//! 3. Configuration: `.json`, `.yml`, `.yaml`, `.toml`, `.config.`, `package.json`
//! 4. Refactoring: the file was removed
//! 5. New Features: the file was added with more than 50 lines
//! 6. UI/UX Changes: style, markup, and component extensions
//! 7. Bug Fixes: "fix" anywhere in the path
//! 8. Improvements: more than twice as many additions as deletions
//! 9. Refactoring: everything else

use crate::github::{FileChange, FileStatus};

const DOC_EXTENSIONS: &[&str] = &[".md", ".txt", ".rst"];
const CONFIG_EXTENSIONS: &[&str] = &[".json", ".yml", ".yaml", ".toml"];
const UI_EXTENSIONS: &[&str] = &[".css", ".scss", ".sass", ".less", ".jsx", ".tsx", ".vue", ".svelte"];
const TEST_DIRS: &[&str] = &["test", "tests", "__tests__"];

/// Additions above which a newly added file counts as a feature.
const NEW_FEATURE_MIN_ADDITIONS: usize = 50;

/// Taxonomy buckets, declared in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    NewFeatures,
    BugFixes,
    Improvements,
    Refactoring,
    UiUx,
    Documentation,
    Testing,
    Configuration,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::NewFeatures,
        Category::BugFixes,
        Category::Improvements,
        Category::Refactoring,
        Category::UiUx,
        Category::Documentation,
        Category::Testing,
        Category::Configuration,
    ];

    pub fn heading(self) -> &'static str {
        match self {
            Category::NewFeatures => "🚀 New Features",
            Category::BugFixes => "🛠 Bug Fixes",
            Category::Improvements => "🔧 Improvements",
            Category::Refactoring => "♻️ Refactoring",
            Category::UiUx => "🎨 UI/UX Changes",
            Category::Documentation => "📚 Documentation",
            Category::Testing => "🧪 Testing",
            Category::Configuration => "⚙️ Configuration",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.heading())
    }
}

/// Pick the single bucket a file belongs to.
pub fn classify(change: &FileChange) -> Category {
    let lower = change.path.to_lowercase();

    if is_documentation(&lower) {
        Category::Documentation
    } else if is_test(&lower) {
        Category::Testing
    } else if is_configuration(&lower) {
        Category::Configuration
    } else if change.status == FileStatus::Removed {
        Category::Refactoring
    } else if change.status == FileStatus::Added && change.additions > NEW_FEATURE_MIN_ADDITIONS {
        Category::NewFeatures
    } else if UI_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        Category::UiUx
    } else if lower.contains("fix") {
        Category::BugFixes
    } else if change.additions > change.deletions.saturating_mul(2) {
        Category::Improvements
    } else {
        Category::Refactoring
    }
}

/// The line item a file contributes to its bucket.
fn line_item(change: &FileChange, category: Category) -> String {
    match category {
        Category::Documentation => format!("Updated documentation in `{}`", change.path),
        Category::Testing if change.status == FileStatus::Added => "Added tests".to_string(),
        Category::Testing => "Updated tests".to_string(),
        Category::Configuration => "Modified configuration".to_string(),
        Category::Refactoring if change.status == FileStatus::Removed => "Removed unused code".to_string(),
        Category::Refactoring => "Refactored code".to_string(),
        Category::NewFeatures => "Added new functionality".to_string(),
        Category::UiUx => "Updated user interface".to_string(),
        Category::BugFixes => "Fixed issues".to_string(),
        Category::Improvements => "Enhanced existing features".to_string(),
    }
}

/// Render a categorized markdown summary of the given changes.
///
/// Empty buckets are omitted and repeated items within a bucket collapse
/// into one. Output depends only on the input, never on the environment.
pub fn categorize(changes: &[FileChange]) -> String {
    let mut buckets: Vec<Vec<String>> = vec![Vec::new(); Category::ALL.len()];

    for change in changes {
        let category = classify(change);
        let item = line_item(change, category);
        let bucket = &mut buckets[category as usize];
        if !bucket.contains(&item) {
            bucket.push(item);
        }
    }

    Category::ALL
        .iter()
        .zip(&buckets)
        .filter(|(_, items)| !items.is_empty())
        .map(|(category, items)| {
            let lines: Vec<String> = items.iter().map(|item| format!("- {}", item)).collect();
            format!("### {}\n{}", category.heading(), lines.join("\n"))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_string()
}

fn is_documentation(lower: &str) -> bool {
    DOC_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) || lower.contains("readme")
}

fn is_test(lower: &str) -> bool {
    lower.contains(".test.")
        || lower.contains(".spec.")
        || lower
            .rsplit_once('/')
            .map(|(dirs, _)| dirs.split('/').any(|segment| TEST_DIRS.contains(&segment)))
            .unwrap_or(false)
}

fn is_configuration(lower: &str) -> bool {
    CONFIG_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        || lower.contains(".config.")
        || lower == "package.json"
        || lower.ends_with("/package.json")
}
