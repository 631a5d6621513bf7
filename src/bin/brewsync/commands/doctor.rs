//! `brewsync doctor` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::DoctorArgs;
use crate::commands::{ambient_config, context, ItemsFailed};
use brewsync::ops::{doctor, format_report, DoctorOptions};
use brewsync::util::process::SystemRunner;
use brewsync::util::shell::Shell;

pub fn execute(args: DoctorArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = context()?;
    let options = DoctorOptions {
        offline: args.offline,
        preflight: ambient_config(&ctx).preflight_options(),
    };

    let report = doctor(&SystemRunner, &options);

    if shell.is_json() {
        shell.json_event(&serde_json::json!({
            "reason": "doctor",
            "report": report,
        }));
    } else {
        shell.print(format_report(&report, shell.is_verbose()));
    }

    // Exit with error code if required checks failed
    if !report.all_required_passed() {
        return Err(ItemsFailed {
            failed: report.required_failed_count(),
        }
        .into());
    }
    Ok(())
}
