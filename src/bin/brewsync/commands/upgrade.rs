//! `brewsync upgrade` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::UpgradeArgs;
use crate::commands::{ambient_config, context, maintain::report, system_managers};
use brewsync::ops::upgrade;
use brewsync::util::shell::{Shell, Status};
use brewsync::util::CancelToken;

pub fn execute(args: UpgradeArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = context()?;
    let managers = system_managers(&ambient_config(&ctx));

    let span = shell.span(Status::Updating, "Homebrew");
    let result = upgrade(&managers, args.dry_run, &CancelToken::new())?;
    drop(span);

    report(&result, shell)
}
