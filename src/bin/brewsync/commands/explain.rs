//! `brewsync explain` command
//!
//! Runs the failure classifier on pasted output, e.g.
//! `brew install foo 2>&1 | brewsync explain`.

use std::fmt::Write as _;
use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::ExplainArgs;
use brewsync::core::{classify, ErrorKind};
use brewsync::util::diagnostic::suggestion_for;
use brewsync::util::shell::Shell;

pub fn execute(args: ExplainArgs, shell: &Arc<Shell>) -> Result<()> {
    let text = if args.output.is_empty() {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read error output from stdin")?;
        buf
    } else {
        args.output.join(" ")
    };

    let kind = classify(&text);

    if shell.is_json() {
        shell.json_event(&serde_json::json!({
            "reason": "explain",
            "error": kind,
            "retryable": kind.is_retryable(),
        }));
    } else {
        shell.print(format_explanation(&kind));
    }
    Ok(())
}

/// Wire name of the kind, e.g. `not-found`.
fn kind_name(kind: &ErrorKind) -> String {
    serde_json::to_value(kind)
        .ok()
        .and_then(|v| v.get("kind").and_then(|k| k.as_str()).map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

fn format_explanation(kind: &ErrorKind) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "kind:      {}", kind_name(kind));
    let _ = writeln!(output, "reason:    {}", kind.reason());
    let _ = writeln!(
        output,
        "retryable: {}",
        if kind.is_retryable() { "yes" } else { "no" }
    );
    if let Some(suggestion) = suggestion_for(kind) {
        let _ = writeln!(output, "help:      {}", suggestion);
    }
    output
}
