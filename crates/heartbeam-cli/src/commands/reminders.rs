use clap::Subcommand;
use heartbeam_core::{Channel, Config, ReminderKind, ReminderPlanner};

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum RemindersAction {
    /// Plan a reminder run and print it as JSON
    Plan {
        /// pre-baseline, post-baseline, home-training, start-tomorrow or
        /// no-multi-lumos
        kind: String,
        /// "email" or "sms"
        #[arg(long, default_value = "email")]
        channel: String,
        /// Persist baseline completions found during the run
        #[arg(long)]
        apply: bool,
    },
}

pub fn run(ctx: &Context, action: RemindersAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        RemindersAction::Plan { kind, channel, apply } => {
            let kind: ReminderKind = kind.parse()?;
            let channel: Channel = channel.parse()?;
            let config = Config::load()?;
            let db = ctx.open_db(&config)?;

            let plan = ReminderPlanner::new(&db, config.calendar()?, config.rules())
                .as_of(ctx.now())
                .plan(kind, channel)?;

            if apply {
                for completion in &plan.completed {
                    db.mark_baseline_complete(&completion.user_id, completion.mode)?;
                }
                tracing::info!(completed = plan.completed.len(), "completions applied");
            }
            print_json(&plan)
        }
    }
}
