//! Implementation of the `isotask split` command.

use super::Globals;
use crate::cli::SplitArgs;
use crate::error::Result;
use crate::locks::acquire_run_lock;
use crate::parser::parse_task_list;
use crate::report::print_json;

/// Parse a task list and write its artifacts without running anything.
///
/// Takes the run lock because materializing replaces `tasks/`.
pub fn cmd_split(globals: &Globals, args: SplitArgs) -> Result<()> {
    let ctx = globals.context()?;
    ctx.ensure_layout()?;
    let _lock = acquire_run_lock(&ctx, "split")?;

    let units = parse_task_list(&args.task_list, &ctx)?;

    if args.json {
        return print_json(&units);
    }

    for unit in &units {
        println!("{}  {}", unit.id, unit.source_path.display());
    }
    println!();
    println!("{} tasks written to {}", units.len(), ctx.tasks_dir.display());
    Ok(())
}
