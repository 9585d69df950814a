//! Confirmation gate: a pure plan view plus the operator yes/no surface.

use std::io::{self, BufRead, Write};

use owo_colors::OwoColorize;

use crate::TeardownError;
use uproot_core::ManagedResource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Delete,
    Keep,
}

/// One rendered line of the plan table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRow {
    pub action: Action,
    pub namespace: String,
    pub name: String,
    pub kind: String,
    pub api_version: String,
}

fn row(resource: &ManagedResource, action: Action) -> PlanRow {
    PlanRow {
        action,
        namespace: resource.namespace.clone().unwrap_or_default(),
        name: resource.name.clone(),
        kind: resource.kind().to_string(),
        api_version: resource.gvk.api_version(),
    }
}

/// Pure view of the plan: deletions first, then survivors, one row each.
pub fn plan_rows(to_delete: &[ManagedResource], to_keep: &[ManagedResource]) -> Vec<PlanRow> {
    let mut rows = Vec::with_capacity(to_delete.len() + to_keep.len());
    rows.extend(to_delete.iter().map(|r| row(r, Action::Delete)));
    rows.extend(to_keep.iter().map(|r| row(r, Action::Keep)));
    rows
}

/// The question mentions the `--all` escape hatch only when something is
/// being kept back.
pub fn question(to_keep: &[ManagedResource]) -> &'static str {
    if to_keep.is_empty() {
        "Do you want to delete the above resources?"
    } else {
        "Do you want to delete/keep the above resources? To delete all resources run \"uprootctl uninstall --all\""
    }
}

/// Operator yes/no surface. The terminal implementation reads stdin; tests
/// script their own answer.
pub trait Prompt {
    fn confirm(&self, question: &str) -> Result<bool, TeardownError>;
}

/// Reads the answer from the controlling terminal; anything but y/yes is no.
pub struct TermPrompt;

impl Prompt for TermPrompt {
    fn confirm(&self, question: &str) -> Result<bool, TeardownError> {
        let mut out = io::stdout();
        write!(out, "{} [y/N]: ", question).map_err(|e| TeardownError::Prompt(e.to_string()))?;
        out.flush().map_err(|e| TeardownError::Prompt(e.to_string()))?;
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| TeardownError::Prompt(e.to_string()))?;
        let answer = line.trim().to_ascii_lowercase();
        Ok(answer == "y" || answer == "yes")
    }
}

/// Render the plan table and put the question to the operator.
pub fn confirm(
    to_delete: &[ManagedResource],
    to_keep: &[ManagedResource],
    prompt: &dyn Prompt,
) -> Result<bool, TeardownError> {
    render(&plan_rows(to_delete, to_keep));
    prompt.confirm(question(to_keep))
}

fn render(rows: &[PlanRow]) {
    let headers = ["ACTION", "NAMESPACE", "NAME", "KIND"];
    let mut widths = [headers[0].len(), headers[1].len(), headers[2].len(), headers[3].len()];
    for r in rows {
        let action = match r.action {
            Action::Delete => "delete",
            Action::Keep => "keep",
        };
        widths[0] = widths[0].max(action.len());
        widths[1] = widths[1].max(r.namespace.len());
        widths[2] = widths[2].max(r.name.len());
        widths[3] = widths[3].max(r.kind.len());
    }

    println!(
        "{:<w0$} {:<w1$} {:<w2$} {:<w3$} API VERSION",
        headers[0],
        headers[1],
        headers[2],
        headers[3],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
        w3 = widths[3],
    );
    for r in rows {
        // Pad before coloring: ANSI escapes would otherwise count into the
        // column width.
        let namespace = format!("{:<w$}", r.namespace, w = widths[1]);
        let name = format!("{:<w$}", r.name, w = widths[2]);
        let kind = format!("{:<w$}", r.kind, w = widths[3]);
        match r.action {
            Action::Delete => {
                let action = format!("{:<w$}", "delete", w = widths[0]);
                if r.kind == "Namespace" {
                    println!(
                        "{} {} {} {} {}",
                        action.red(),
                        namespace,
                        name.red(),
                        kind.red().bold(),
                        r.api_version
                    );
                } else {
                    println!(
                        "{} {} {} {} {}",
                        action.red(),
                        namespace,
                        name.red(),
                        kind,
                        r.api_version
                    );
                }
            }
            Action::Keep => {
                let action = format!("{:<w$}", "keep", w = widths[0]);
                println!(
                    "{} {} {} {} {}",
                    action.green(),
                    namespace.dimmed(),
                    name.dimmed(),
                    kind.dimmed(),
                    r.api_version.dimmed()
                );
            }
        }
    }
}
