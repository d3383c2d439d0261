use std::{fmt::Write as _, path::PathBuf};

use clap::Parser;
use ntfy_client::{CommandLine, ConfigError, DispatchRules};

#[derive(Debug, Parser)]
pub struct Args {
    /// Rules file (TOML).
    #[arg(long)]
    pub rules: PathBuf,
}

pub fn run(args: Args) -> Result<(), ConfigError> {
    let rules = DispatchRules::from_path(&args.rules)?;
    print!("{}", describe(&rules));
    Ok(())
}

/// Human-readable listing of what `rules` registers.
pub(crate) fn describe(rules: &DispatchRules) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "failure policy: {:?}", rules.failure_policy);
    let _ = writeln!(out, "log notifications: {}", rules.log_notifications);
    for trigger in &rules.shell_commands {
        let _ = writeln!(out, "shell command: {trigger}");
    }
    for (alias, command_line) in &rules.aliases {
        let target = match command_line {
            CommandLine::Line(line) => line.clone(),
            CommandLine::Argv(argv) => format!("{argv:?}"),
        };
        let _ = writeln!(out, "alias: {alias} -> {target}");
    }
    let limits = rules.shell.pool_limits();
    let _ = writeln!(
        out,
        "shell pool: max_concurrent={} max_pending={} timeout={:?}",
        limits.max_concurrent, limits.max_pending, limits.timeout
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_lists_triggers_and_aliases() {
        let rules = DispatchRules::from_toml_str(
            r#"
shell_commands = ["ping"]

[aliases]
deploy = ["ssh", "host", "run-deploy"]
status = "systemctl status nginx"
"#,
        )
        .unwrap();

        let text = describe(&rules);
        assert!(text.contains("failure policy: AbortOnFirst"));
        assert!(text.contains("shell command: ping"));
        assert!(text.contains(r#"alias: deploy -> ["ssh", "host", "run-deploy"]"#));
        assert!(text.contains("alias: status -> systemctl status nginx"));
        assert!(text.contains("timeout=Some(60s)"));
    }
}
