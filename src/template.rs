//! `{variable}` substitution for agent command templates.
//!
//! `{name}` is replaced by the value of `name`; `{{` and `}}` render literal
//! braces. Referencing a variable that was not provided is an error, so a
//! typo in `agent.command` fails the task instead of silently passing an
//! empty argument to the agent.

use std::collections::BTreeMap;
use thiserror::Error;

/// Variables available to a command template.
pub type Vars = BTreeMap<&'static str, String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("undefined variable '{name}' at position {position} (available: {available})")]
    UndefinedVariable {
        name: String,
        position: usize,
        available: String,
    },

    #[error("unmatched '{{' at position {position}")]
    UnmatchedBrace { position: usize },

    #[error("empty variable name '{{}}' at position {position}")]
    EmptyVariableName { position: usize },
}

/// Substitute every `{name}` in `template` with its value from `vars`.
pub fn render(template: &str, vars: &Vars) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(idx) = rest.find(['{', '}']) {
        out.push_str(&rest[..idx]);
        let position = offset + idx;
        let tail = &rest[idx..];

        let consumed = if tail.starts_with("{{") {
            out.push('{');
            2
        } else if tail.starts_with("}}") {
            out.push('}');
            2
        } else if tail.starts_with('}') {
            out.push('}');
            1
        } else {
            let close = tail
                .find('}')
                .ok_or(TemplateError::UnmatchedBrace { position })?;
            let name = tail[1..close].trim();
            if name.is_empty() {
                return Err(TemplateError::EmptyVariableName { position });
            }
            let value = vars
                .get(name)
                .ok_or_else(|| TemplateError::UndefinedVariable {
                    name: name.to_string(),
                    position,
                    available: vars.keys().copied().collect::<Vec<_>>().join(", "),
                })?;
            out.push_str(value);
            close + 1
        };

        rest = &tail[consumed..];
        offset = position + consumed;
    }

    out.push_str(rest);
    Ok(out)
}
