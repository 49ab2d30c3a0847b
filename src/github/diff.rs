use super::types::{FileChange, FileStatus};
use super::GitHubError;

/// Parse a unified diff (as produced by `git diff` or GitHub's diff media
/// type) into the same `FileChange` records a comparison returns.
///
/// Each file section starts with:
///   diff --git a/{path} b/{path}
///
/// New files have `--- /dev/null` (or `new file mode`), deleted files have
/// `+++ /dev/null` (or `deleted file mode`). Renames and copies are taken
/// from the extended `rename from` / `copy from` headers.
///
/// The hunk text, headers included, is kept as the file's patch. Each hunk
/// ends once its header's old and new line counts are used up, so trailers
/// such as the `-- ` signature of `git format-patch` are not counted.
pub fn parse_diff(raw_diff: &str) -> Result<Vec<FileChange>, GitHubError> {
    if raw_diff.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut current: Option<FileChange> = None;
    // Old and new lines still expected in the current hunk
    let mut remaining: Option<(usize, usize)> = None;

    for line in raw_diff.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            if let Some(file) = current.take() {
                files.push(file);
            }
            remaining = None;
            let mut parts = rest.split_whitespace();
            let a_path = parts
                .next()
                .ok_or_else(|| GitHubError::DiffParse("Missing a/ path in diff header".to_string()))?;
            let b_path = parts
                .next()
                .ok_or_else(|| GitHubError::DiffParse("Missing b/ path in diff header".to_string()))?;
            let path = b_path
                .strip_prefix("b/")
                .or_else(|| a_path.strip_prefix("a/"))
                .unwrap_or(b_path);
            current = Some(FileChange::new(path, FileStatus::Modified, 0, 0));
            continue;
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        if line.starts_with("@@") {
            remaining = Some(parse_hunk_header(line)?);
            push_patch_line(file, line);
            continue;
        }

        let Some((old_left, new_left)) = remaining.as_mut() else {
            if line.starts_with("new file mode") {
                file.status = FileStatus::Added;
            } else if line.starts_with("deleted file mode") {
                file.status = FileStatus::Removed;
            } else if line.starts_with("rename from ") {
                file.status = FileStatus::Renamed;
            } else if line.starts_with("copy from ") {
                file.status = FileStatus::Copied;
            } else if let Some(path) = line.strip_prefix("--- ") {
                if path.trim() == "/dev/null" {
                    file.status = FileStatus::Added;
                }
            } else if let Some(path) = line.strip_prefix("+++ ") {
                if path.trim() == "/dev/null" {
                    file.status = FileStatus::Removed;
                }
            }
            continue;
        };

        if *old_left == 0 && *new_left == 0 {
            continue;
        }
        match line.as_bytes().first() {
            Some(b'+') => {
                file.additions += 1;
                *new_left = new_left.saturating_sub(1);
            }
            Some(b'-') => {
                file.deletions += 1;
                *old_left = old_left.saturating_sub(1);
            }
            // Some tools strip the single space from blank context lines.
            Some(b' ') | None => {
                *old_left = old_left.saturating_sub(1);
                *new_left = new_left.saturating_sub(1);
            }
            Some(b'\\') => {}
            Some(_) => continue,
        }
        push_patch_line(file, line);
    }

    if let Some(file) = current.take() {
        files.push(file);
    }
    Ok(files)
}

fn push_patch_line(file: &mut FileChange, line: &str) {
    let patch = file.patch.get_or_insert_with(String::new);
    if !patch.is_empty() {
        patch.push('\n');
    }
    patch.push_str(line);
}

/// Old and new line counts from a `@@ -a,b +c,d @@` header.
fn parse_hunk_header(line: &str) -> Result<(usize, usize), GitHubError> {
    let header = line
        .trim()
        .strip_prefix("@@")
        .ok_or_else(|| GitHubError::DiffParse("Invalid hunk header".to_string()))?;
    // Trailing section heading after the closing @@ is optional.
    let header = match header.split_once("@@") {
        Some((ranges, _)) => ranges.trim(),
        None => header.trim(),
    };
    let mut parts = header.split_whitespace();
    let old_part = parts
        .next()
        .ok_or_else(|| GitHubError::DiffParse("Missing old range".to_string()))?;
    let new_part = parts
        .next()
        .ok_or_else(|| GitHubError::DiffParse("Missing new range".to_string()))?;

    let (_, old_count) = parse_range(old_part, '-')?;
    let (_, new_count) = parse_range(new_part, '+')?;

    Ok((old_count, new_count))
}

fn parse_range(part: &str, prefix: char) -> Result<(usize, usize), GitHubError> {
    let range = part
        .strip_prefix(prefix)
        .ok_or_else(|| GitHubError::DiffParse("Invalid range prefix".to_string()))?;
    let (start_str, count_str) = match range.split_once(',') {
        Some((start, count)) => (start, count),
        None => (range, "1"),
    };
    let start = start_str
        .parse::<usize>()
        .map_err(|_| GitHubError::DiffParse(format!("Invalid range start in {}", part)))?;
    let count = count_str
        .parse::<usize>()
        .map_err(|_| GitHubError::DiffParse(format!("Invalid range count in {}", part)))?;
    Ok((start, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_DIFF: &str = r#"diff --git a/src/main.rs b/src/main.rs
index abc1234..def5678 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,3 +1,4 @@ fn main
 fn main() {
-    println!("old");
+    println!("new");
+    // Added a comment
 }
"#;

    #[test]
    fn test_parse_single_file_diff() {
        let files = parse_diff(SAMPLE_DIFF).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "src/main.rs");
        assert_eq!(files[0].status, FileStatus::Modified);
        assert_eq!(files[0].additions, 2);
        assert_eq!(files[0].deletions, 1);
        let patch = files[0].patch.as_deref().unwrap();
        assert!(patch.starts_with("@@ -1,3 +1,4 @@"));
        assert!(patch.contains("+    println!(\"new\");"));
    }

    #[test]
    fn test_parse_new_file_diff() {
        let diff = r#"diff --git a/new_file.txt b/new_file.txt
new file mode 100644
index 0000000..e69de29
--- /dev/null
+++ b/new_file.txt
@@ -0,0 +1,2 @@
+hello
+world
"#;
        let files = parse_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].status, FileStatus::Added);
        assert_eq!(files[0].additions, 2);
    }

    #[test]
    fn test_parse_deleted_file_diff() {
        let diff = r#"diff --git a/old_file.txt b/old_file.txt
deleted file mode 100644
index e69de29..0000000
--- a/old_file.txt
+++ /dev/null
@@ -1,2 +0,0 @@
-hello
-world
"#;
        let files = parse_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].status, FileStatus::Removed);
        assert_eq!(files[0].deletions, 2);
    }

    #[test]
    fn test_parse_rename_without_hunks() {
        let diff = r#"diff --git a/src/old.rs b/src/new.rs
similarity index 100%
rename from src/old.rs
rename to src/new.rs
diff --git a/README.md b/README.md
--- a/README.md
+++ b/README.md
@@ -1 +1 @@
-# Old
+# New
"#;
        let files = parse_diff(diff).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "src/new.rs");
        assert_eq!(files[0].status, FileStatus::Renamed);
        assert!(files[0].patch.is_none());
        assert_eq!(files[1].additions, 1);
        assert_eq!(files[1].deletions, 1);
    }

    #[test]
    fn test_format_patch_signature_is_not_counted() {
        let diff = "diff --git a/src/lib.rs b/src/lib.rs\n\
                    --- a/src/lib.rs\n\
                    +++ b/src/lib.rs\n\
                    @@ -1 +1 @@\n\
                    -old\n\
                    +new\n\
                    -- \n\
                    2.43.0\n";
        let files = parse_diff(diff).unwrap();
        assert_eq!(files[0].additions, 1);
        assert_eq!(files[0].deletions, 1);
        assert_eq!(files[0].patch.as_deref(), Some("@@ -1 +1 @@\n-old\n+new"));
    }

    #[test]
    fn test_second_hunk_resumes_counting() {
        let diff = "diff --git a/a.txt b/a.txt\n\
                    --- a/a.txt\n\
                    +++ b/a.txt\n\
                    @@ -1,2 +1,2 @@\n\
                    \x20keep\n\
                    -one\n\
                    +uno\n\
                    @@ -10,1 +10,3 @@\n\
                    \x20tail\n\
                    +two\n\
                    +three\n";
        let files = parse_diff(diff).unwrap();
        assert_eq!(files[0].additions, 3);
        assert_eq!(files[0].deletions, 1);
    }

    #[test]
    fn test_parse_malformed_hunk_header() {
        let diff = "diff --git a/x b/x\n--- a/x\n+++ b/x\n@@ -a,1 +1 @@\n";
        assert!(matches!(parse_diff(diff), Err(GitHubError::DiffParse(_))));
    }

    #[test]
    fn test_parse_empty_diff() {
        let files = parse_diff("").unwrap();
        assert!(files.is_empty());
    }
}
