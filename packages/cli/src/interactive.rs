//! Menu-driven mode, used when no subcommand is given.

use dialoguer::{Confirm, Input, Select};
use venue_map_cli_utils::{IndicatifProgress, MultiProgress};
use venue_map_places_models::study::StudyConfig;

use crate::paths::StudyPaths;
use crate::pipeline;

enum Action {
    Plan,
    Init,
    Fetch,
    Status,
    Analyze,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Plan,
        Self::Init,
        Self::Fetch,
        Self::Status,
        Self::Analyze,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Plan => "Plan the sampling grid",
            Self::Init => "Write the checkpoint",
            Self::Fetch => "Fetch places (resumes)",
            Self::Status => "Show progress",
            Self::Analyze => "Clean and aggregate",
        }
    }
}

/// Prompts for an action and runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the chosen action fails.
#[allow(clippy::future_not_send)]
pub async fn run(
    study: &StudyConfig,
    paths: &StudyPaths,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
    let idx = Select::new()
        .with_prompt(format!("{}: what would you like to do?", study.name))
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::Plan => crate::print_plan(study, &pipeline::plan(study)?),
        Action::Init => {
            let force = Confirm::new()
                .with_prompt("Overwrite an existing checkpoint even if it has progress?")
                .default(false)
                .interact()?;
            let store = pipeline::init(study, paths, force)?;
            println!("Wrote {}", store.path().display());
        }
        Action::Fetch => {
            let limit = Input::<String>::new()
                .with_prompt("Maximum points to process (blank for all)")
                .allow_empty(true)
                .interact_text()?;
            let limit = match limit.trim() {
                "" => None,
                text => Some(text.parse::<u64>()?),
            };
            let progress = IndicatifProgress::points_bar(multi, "Fetching");
            crate::run_fetch(study, paths, limit, &progress).await?;
        }
        Action::Status => crate::print_status(pipeline::status(paths)?.as_ref()),
        Action::Analyze => crate::run_analyze(study, paths)?,
    }

    Ok(())
}
