//! Summary command - per-type totals and personal records.

use anyhow::{Result, bail};
use clap::Args;

use liftlog_store::WorkoutSummary;

use super::Context;

/// Arguments for the summary command.
#[derive(Args, Debug)]
pub struct SummaryArgs {
    /// User to summarize (defaults to the configured user)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Look back this many days
    #[arg(short, long, default_value_t = 30)]
    pub days: i64,
}

/// Run the summary command.
pub async fn run(args: SummaryArgs, ctx: &Context) -> Result<()> {
    if args.days < 0 {
        bail!("--days must not be negative");
    }
    let store = ctx.open_store()?;
    let user = ctx.user(args.user);
    let days = args.days;

    let summary = tokio::task::spawn_blocking(move || store.summarize(&user, days)).await??;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render(&summary));
    }
    Ok(())
}

fn render(summary: &WorkoutSummary) -> String {
    let mut out = format!("Last {} days\n", summary.period_days);
    if summary.summary_by_type.is_empty() {
        out.push_str("  No workouts recorded.\n");
        return out;
    }

    for row in &summary.summary_by_type {
        out.push_str(&format!(
            "  {:<9} {:>3} workouts on {:>3} days, {:>4} sets",
            row.exercise_type.as_str(),
            row.workout_count,
            row.days_worked_out,
            row.total_sets
        ));
        if let Some(reps) = row.total_reps {
            out.push_str(&format!(", {} reps", reps));
        }
        if let Some(distance) = row.total_distance {
            out.push_str(&format!(", {} distance", distance));
        }
        if let Some(duration) = row.total_duration {
            out.push_str(&format!(", {} duration", duration));
        }
        out.push('\n');
    }

    if !summary.personal_records.is_empty() {
        out.push_str("Personal records\n");
        for pr in &summary.personal_records {
            let unit = pr.weight_unit.as_ref().map(|u| u.as_str()).unwrap_or("");
            out.push_str(&format!("  {:<20} {} {}\n", pr.exercise_name, pr.max_weight, unit));
        }
    }
    out
}
