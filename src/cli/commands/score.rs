//! cmap score - Score one responsibility against one competency

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{self, HumanLayout};
use crate::config::ScoringConfig;
use crate::core::{
    Category, Competency, Contribution, Importance, RelevanceScore, Responsibility, SourceTier,
    normalize, responsibility_id,
};
use crate::error::Result;
use crate::scoring::RelevanceScorer;
use crate::similarity::Similarity;

#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Responsibility statement
    pub responsibility: String,

    /// Competency definition
    pub definition: String,

    /// Competency name
    #[arg(long, default_value = "Competency")]
    pub name: String,

    /// Competency tags, comma separated
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Responsibility category (inferred from the text when omitted)
    #[arg(long)]
    pub category: Option<String>,

    /// Job family for the contextual signal
    #[arg(long, default_value = "")]
    pub family: String,
}

#[derive(Debug, Serialize)]
pub struct ScoreReport {
    pub category: Category,
    #[serde(flatten)]
    pub score: RelevanceScore,
    pub contribution: Contribution,
    pub min_relevance: f32,
}

pub fn run(ctx: &AppContext, args: &ScoreArgs) -> Result<()> {
    let similarity = ctx.similarity()?;
    let report = score_pair(&ctx.config.scoring, &similarity, args)?;

    if ctx.robot_mode {
        return output::emit_robot(&output::robot_ok(&report));
    }

    let mut layout = HumanLayout::new();
    layout
        .title(&format!("{:.3}", report.score.combined))
        .kv("semantic", &format!("{:.3}", report.score.semantic))
        .kv("lexical", &format!("{:.3}", report.score.lexical))
        .kv("contextual", &format!("{:.3}", report.score.contextual))
        .kv("category", report.category.as_str())
        .kv("contribution", &format!("{:?}", report.contribution).to_uppercase());
    output::emit_human(layout);
    Ok(())
}

fn score_pair(
    config: &ScoringConfig,
    similarity: &dyn Similarity,
    args: &ScoreArgs,
) -> Result<ScoreReport> {
    let category = match &args.category {
        Some(raw) => raw.parse()?,
        None => Category::infer(&args.responsibility),
    };
    let responsibility = Responsibility {
        id: responsibility_id(0),
        raw_text: args.responsibility.clone(),
        normalized_text: normalize(&args.responsibility),
        category,
        importance: Importance::Medium,
    };
    let tags = args
        .tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    let competency = Competency::new(
        "C-adhoc",
        args.name.trim(),
        args.definition.trim(),
        SourceTier::Generated,
    )
    .with_tags(tags);

    let scorer = RelevanceScorer::new(config, similarity).with_family(&args.family);
    let score = scorer.score(&responsibility, &competency);
    Ok(ScoreReport {
        category,
        score,
        contribution: scorer.contribution(score.combined),
        min_relevance: config.min_relevance,
    })
}
