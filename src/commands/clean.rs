//! Implementation of the `isotask clean` command.
//!
//! Removes run artifacts from a base directory:
//! - `work/` always (per-task scratch directories)
//! - with `--all`: `tasks/`, `results/`, `state.json` and `events.ndjson`
//!
//! `config.yaml` is never touched. Cleaning takes the run lock, so it fails
//! while a run is in progress. A `clean` event is appended afterwards.

use super::Globals;
use crate::cli::CleanArgs;
use crate::context::RunContext;
use crate::error::{Result, RunnerError};
use crate::events::{Event, EventAction, append_event};
use crate::fs::remove_tree;
use crate::locks::acquire_run_lock;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn cmd_clean(globals: &Globals, args: CleanArgs) -> Result<()> {
    let ctx = globals.context()?;
    if !ctx.base_dir.exists() {
        println!("Nothing to clean: '{}' does not exist.", ctx.base_dir.display());
        return Ok(());
    }

    let _lock = acquire_run_lock(&ctx, "clean")?;

    let plan = cleanup_plan(&ctx, args.all);
    if plan.is_empty() {
        println!("No cleanup candidates found.");
        return Ok(());
    }

    println!("Cleanup plan:");
    for path in &plan {
        println!("  - {}", make_relative(path, &ctx.base_dir));
    }

    if args.dry_run {
        println!();
        println!("Dry-run mode: no changes made.");
        return Ok(());
    }

    let removed = execute_cleanup(&plan)?;
    info!(removed, all = args.all, "cleaned base directory");

    append_event(
        &ctx,
        &Event::new(EventAction::Clean).with_details(json!({
            "removed_count": removed,
            "all": args.all,
        })),
    )?;

    println!();
    println!("Removed {} item(s).", removed);
    Ok(())
}

/// Existing paths to remove, in removal order.
fn cleanup_plan(ctx: &RunContext, all: bool) -> Vec<PathBuf> {
    let mut candidates = vec![ctx.work_dir.clone()];
    if all {
        candidates.extend([
            ctx.tasks_dir.clone(),
            ctx.results_dir.clone(),
            ctx.state_path(),
            ctx.events_file(),
        ]);
    }
    candidates.retain(|p| p.exists());
    candidates
}

fn execute_cleanup(plan: &[PathBuf]) -> Result<usize> {
    for path in plan {
        if path.is_dir() {
            remove_tree(path)?;
        } else {
            fs::remove_file(path).map_err(|e| {
                RunnerError::UserError(format!("failed to remove '{}': {}", path.display(), e))
            })?;
        }
    }
    Ok(plan.len())
}

/// Make a path relative to the base directory for display.
fn make_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_ctx;

    #[test]
    fn plan_without_all_only_touches_work() {
        let (_temp, ctx) = test_ctx();
        fs::write(ctx.state_path(), "{}").unwrap();

        assert_eq!(cleanup_plan(&ctx, false), [ctx.work_dir.clone()]);
    }

    #[test]
    fn plan_with_all_skips_missing_and_config() {
        let (_temp, ctx) = test_ctx();
        fs::write(ctx.state_path(), "{}").unwrap();
        fs::write(ctx.config_path(), "timeout_seconds: 5\n").unwrap();

        let plan = cleanup_plan(&ctx, true);

        assert!(plan.contains(&ctx.tasks_dir));
        assert!(plan.contains(&ctx.state_path()));
        assert!(!plan.contains(&ctx.events_file()));
        assert!(!plan.contains(&ctx.config_path()));
    }

    #[test]
    fn relative_paths_for_display() {
        let base = Path::new("/run/.isotask");
        assert_eq!(make_relative(&base.join("work"), base), "work");
        assert_eq!(make_relative(Path::new("/elsewhere"), base), "/elsewhere");
    }
}
