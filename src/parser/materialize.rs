//! Writing one isolated artifact per task section.

use super::TaskSection;
use crate::context::RunContext;
use crate::error::Result;
use crate::fs::{atomic_write_file, mark_read_only, reset_dir};
use crate::task::TaskUnit;
use tracing::debug;

/// Materialize parsed sections as read-only artifacts and build task units.
///
/// The `tasks/` directory is emptied first so no artifact from an earlier
/// parse can be mistaken for part of this run. Each artifact holds exactly
/// one section: its title as a level-1 heading followed by its body.
pub fn materialize(sections: &[TaskSection], ctx: &RunContext) -> Result<Vec<TaskUnit>> {
    ctx.ensure_layout()?;
    reset_dir(&ctx.tasks_dir)?;

    let mut units = Vec::with_capacity(sections.len());
    for section in sections {
        let id = section.id();
        let path = ctx.task_file(&id);

        atomic_write_file(&path, &artifact_content(section))?;
        mark_read_only(&path)?;
        debug!(task = %id, path = %path.display(), "materialized task artifact");

        units.push(TaskUnit::new(
            id,
            section.ordinal,
            section.title.clone(),
            section.body.clone(),
            path,
        ));
    }

    Ok(units)
}

fn artifact_content(section: &TaskSection) -> String {
    if section.body.is_empty() {
        format!("# {}\n", section.title)
    } else {
        format!("# {}\n\n{}\n", section.title, section.body)
    }
}
