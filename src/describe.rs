use tracing::{debug, info, info_span, Instrument};

use crate::categorize::categorize;
use crate::github::Comparison;
use crate::llm::{
    build_prompt, generate_with_fallback, DescriptionFormat, DescriptionMode, GenerationOptions, PromptSource,
    TextGenerator,
};

/// Totals shown alongside a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffStats {
    pub total_files: usize,
    pub total_additions: usize,
    pub total_deletions: usize,
    pub commits: usize,
}

impl DiffStats {
    pub fn from_comparison(comparison: &Comparison) -> Self {
        Self {
            total_files: comparison.files.len(),
            total_additions: comparison.files.iter().map(|f| f.additions).sum(),
            total_deletions: comparison.files.iter().map(|f| f.deletions).sum(),
            commits: comparison.commits.len(),
        }
    }
}

/// Where a description's text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptionSource {
    Generated { model: String },
    /// Rule-based, by request or because no model is configured
    Algorithmic,
    /// Rule-based because every model failed
    Fallback,
}

impl std::fmt::Display for DescriptionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescriptionSource::Generated { model } => write!(f, "generated by {}", model),
            DescriptionSource::Algorithmic => write!(f, "rule-based"),
            DescriptionSource::Fallback => write!(f, "rule-based fallback (generation unavailable)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Description {
    pub body: String,
    pub source: DescriptionSource,
    pub stats: DiffStats,
}

#[derive(Debug, Clone)]
pub struct DescribeOptions {
    pub mode: DescriptionMode,
    pub format: DescriptionFormat,
    pub models: Vec<String>,
    pub generation: GenerationOptions,
}

/// Produce a PR description for a comparison.
///
/// With no generator, or in `Algo` mode, the categorizer writes the body.
/// Otherwise the models are tried in order and the categorizer only steps
/// in when all of them fail.
pub async fn describe(
    comparison: &Comparison,
    options: &DescribeOptions,
    generator: Option<&dyn TextGenerator>,
) -> Description {
    let stats = DiffStats::from_comparison(comparison);

    let generator = match (options.mode, generator) {
        (DescriptionMode::Algo, _) | (_, None) => {
            debug!(mode = ?options.mode, "using rule-based description");
            return Description {
                body: categorize(&comparison.files),
                source: DescriptionSource::Algorithmic,
                stats,
            };
        }
        (_, Some(generator)) => generator,
    };

    let source = match options.mode {
        DescriptionMode::Commit if !comparison.commits.is_empty() => PromptSource::Commits(&comparison.commits),
        DescriptionMode::Commit => {
            debug!("no commits in comparison, describing file diffs instead");
            PromptSource::Files(&comparison.files)
        }
        _ => PromptSource::Files(&comparison.files),
    };
    let prompt = build_prompt(source, options.format);

    let outcome = generate_with_fallback(generator, &options.models, &prompt, &options.generation)
        .instrument(info_span!("generate", format = ?options.format))
        .await;

    match (outcome.text, outcome.used_model) {
        (Some(text), Some(model)) if !text.trim().is_empty() => Description {
            body: text.trim().to_string(),
            source: DescriptionSource::Generated { model },
            stats,
        },
        _ => {
            info!("falling back to rule-based description");
            Description {
                body: categorize(&comparison.files),
                source: DescriptionSource::Fallback,
                stats,
            }
        }
    }
}
