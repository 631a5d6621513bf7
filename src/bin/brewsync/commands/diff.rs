//! `brewsync diff` command

use std::fmt::Write;
use std::sync::Arc;

use anyhow::Result;

use crate::cli::DiffArgs;
use crate::commands::{context, system_managers, Project};
use brewsync::core::Category;
use brewsync::ops::{plan, ConvergencePlan};
use brewsync::util::shell::Shell;

pub fn execute(args: DiffArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = context()?;
    let project = Project::load(&ctx, args.file.as_deref())?;
    let managers = system_managers(&project.config);

    let plan = plan(&managers, &project.desired)?;

    if shell.is_json() {
        shell.json_event(&serde_json::json!({
            "reason": "diff",
            "file": project.path,
            "extra": plan.extra,
        }));
    } else {
        shell.print(format_plan(&plan));
    }
    Ok(())
}

/// Extra packages grouped by category, one name per line.
pub fn format_plan(plan: &ConvergencePlan) -> String {
    let mut output = String::new();

    if plan.is_empty() {
        let _ = writeln!(output, "Nothing to remove; installed packages match Brewsync.toml.");
        return output;
    }

    let _ = writeln!(output, "{} installed package(s) not in Brewsync.toml:", plan.len());
    for category in Category::INSTALL_ORDER {
        let names = plan.extra.get(category);
        if names.is_empty() {
            continue;
        }
        let _ = writeln!(output, "\n{}:", category.plural());
        for name in names {
            let _ = writeln!(output, "  {}", name);
        }
    }
    output
}
