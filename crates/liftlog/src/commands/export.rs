//! Export command - writes a user's workouts to their export file.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::Context;

/// Arguments for the export command.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// User whose workouts to export (defaults to the configured user)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Directory to write into (overrides config)
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,
}

/// Run the export command.
pub async fn run(args: ExportArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let user = ctx.user(args.user);
    let dir = args.out_dir.unwrap_or_else(|| ctx.stats_dir());

    let report = tokio::task::spawn_blocking(move || store.export(&user, dir)).await??;

    if ctx.json_output {
        println!(
            "{}",
            serde_json::json!({
                "path": report.path,
                "user_id": report.document.user_id,
                "total_workouts": report.document.total_workouts,
            })
        );
    } else {
        println!(
            "Exported {} workouts for {} to {}",
            report.document.total_workouts,
            report.document.user_id,
            report.path.display()
        );
    }
    Ok(())
}
