//! `brewsync outdated` command

use std::fmt::Write;
use std::sync::Arc;

use anyhow::Result;

use crate::commands::{ambient_config, context, system_managers};
use brewsync::core::OutdatedPackage;
use brewsync::ops::outdated;
use brewsync::util::shell::Shell;

pub fn execute(shell: &Arc<Shell>) -> Result<()> {
    let ctx = context()?;
    let managers = system_managers(&ambient_config(&ctx));

    let packages = outdated(&managers)?;

    if shell.is_json() {
        shell.json_event(&serde_json::json!({
            "reason": "outdated",
            "packages": packages,
        }));
    } else {
        shell.print(format_outdated(&packages));
    }
    Ok(())
}

fn format_outdated(packages: &[OutdatedPackage]) -> String {
    let mut output = String::new();
    if packages.is_empty() {
        let _ = writeln!(output, "Everything is up to date.");
        return output;
    }

    let width = packages.iter().map(|p| p.name.len()).max().unwrap_or(0);
    for package in packages {
        let installed = if package.installed_versions.is_empty() {
            "?".to_string()
        } else {
            package.installed_versions.join(", ")
        };
        let _ = writeln!(
            output,
            "{:<width$}  {} -> {}  ({})",
            package.name,
            installed,
            package.current_version,
            package.category,
            width = width
        );
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewsync::core::Category;

    #[test]
    fn test_format_outdated() {
        let packages = vec![
            OutdatedPackage {
                name: "git".to_string(),
                installed_versions: vec!["2.43.0".to_string()],
                current_version: "2.44.0".to_string(),
                category: Category::Formula,
            },
            OutdatedPackage {
                name: "firefox".to_string(),
                installed_versions: vec![],
                current_version: "125.0".to_string(),
                category: Category::Cask,
            },
        ];

        let text = format_outdated(&packages);
        assert!(text.contains("git      2.43.0 -> 2.44.0  (formula)"));
        assert!(text.contains("firefox  ? -> 125.0  (cask)"));
        assert_eq!(format_outdated(&[]), "Everything is up to date.\n");
    }
}
