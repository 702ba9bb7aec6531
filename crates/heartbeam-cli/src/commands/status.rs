use clap::Subcommand;
use heartbeam_core::status::parse_civil_date;
use heartbeam_core::{BaselineMode, Config, StatusService, StudyDb};

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum StatusAction {
    /// Cognitive-task baseline status
    Baseline {
        participant: String,
        /// "pre" or "post"
        #[arg(long, default_value = "pre")]
        mode: String,
    },
    /// Stage 2 home-training status
    Stage2 {
        participant: String,
        /// Breathing-app id of the participant
        human_id: String,
    },
    /// Stage 3 home-training status
    Stage3 {
        participant: String,
        human_id: String,
        /// Day stage 2 was completed (YYYY-MM-DD)
        #[arg(long)]
        stage2_completed: String,
    },
    /// Lumosity engagement alone
    Lumosity {
        user: String,
        #[arg(long, allow_hyphen_values = true)]
        elapsed_days: i64,
    },
}

fn service<'a>(
    ctx: &Context,
    db: &'a StudyDb,
    config: &Config,
) -> Result<StatusService<'a, StudyDb>, Box<dyn std::error::Error>> {
    Ok(StatusService::new(db, config.calendar()?, config.rules()).as_of(ctx.now()))
}

pub fn run(ctx: &Context, action: StatusAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    match action {
        StatusAction::Baseline { participant, mode } => {
            let mode: BaselineMode = mode.parse()?;
            let db = ctx.open_db(&config)?;
            print_json(&service(ctx, &db, &config)?.baseline_status(&participant, mode)?)
        }
        StatusAction::Stage2 { participant, human_id } => {
            let db = ctx.open_db(&config)?;
            print_json(&service(ctx, &db, &config)?.stage2_status(&participant, &human_id)?)
        }
        StatusAction::Stage3 { participant, human_id, stage2_completed } => {
            let completed = parse_civil_date("stage2-completed", &stage2_completed)?;
            let db = ctx.open_db(&config)?;
            print_json(&service(ctx, &db, &config)?.stage3_status(&participant, &human_id, completed)?)
        }
        StatusAction::Lumosity { user, elapsed_days } => {
            let db = ctx.open_db(&config)?;
            let tier = service(ctx, &db, &config)?.lumosity_status(&user, elapsed_days)?;
            print_json(&serde_json::json!({ "lumosity": tier }))
        }
    }
}
