//! Building the agent command line for one task.

use crate::config::AgentConfig;
use crate::task::TaskUnit;
use crate::template::{self, TemplateError, Vars};
use std::path::Path;

/// Environment variable carrying the task id.
pub const ENV_TASK_ID: &str = "ISOTASK_TASK_ID";
/// Environment variable carrying the attempt number.
pub const ENV_ATTEMPT: &str = "ISOTASK_ATTEMPT";

/// Fully resolved agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Rendered command line, for logs.
    pub rendered: String,
}

/// Split `agent.command` into words, then render each word for `task`.
///
/// Splitting follows POSIX shell quoting rules but no shell runs: pipes,
/// redirects and globs are passed to the agent literally. Splitting happens
/// before substitution, so a substituted value always stays inside the word
/// it appears in, whatever spaces or quotes it contains.
pub(super) fn build_invocation(
    agent: &AgentConfig,
    task: &TaskUnit,
    work_dir: &Path,
) -> Result<Invocation, String> {
    let words = shell_words::split(&agent.command).map_err(|e| {
        format!(
            "failed to parse agent command '{}': {}\n\
             Fix: check for unmatched quotes or invalid escape sequences.",
            agent.command, e
        )
    })?;

    if words.is_empty() {
        return Err(format!("agent command is empty after parsing: '{}'", agent.command));
    }

    let vars = template_vars(task, work_dir);
    let mut words = words
        .iter()
        .map(|word| template::render(word, &vars))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| match e {
            TemplateError::UndefinedVariable { .. } => format!(
                "agent command template error: {}\nCommand: {}",
                e, agent.command
            ),
            _ => format!("agent command template error: {}", e),
        })?;

    let rendered = shell_words::join(&words);
    let program = words.remove(0);
    Ok(Invocation {
        program,
        args: words,
        rendered,
    })
}

fn template_vars(task: &TaskUnit, work_dir: &Path) -> Vars {
    let mut vars = Vars::new();
    vars.insert("task_id", task.id.clone());
    vars.insert("task_file", task.source_path.display().to_string());
    vars.insert("title", task.title.clone());
    vars.insert("work_dir", work_dir.display().to_string());
    vars.insert("attempt", task.attempt.to_string());
    vars
}
