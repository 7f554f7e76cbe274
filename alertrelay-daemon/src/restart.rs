//! Self re-exec for restart-on-change.
//!
//! The replacement process gets the original arguments plus
//! [`RESTARTED_FLAG`](crate::cli::RESTARTED_FLAG) so it can announce a
//! restart instead of a cold start.

use std::ffi::OsString;

use crate::cli::RESTARTED_FLAG;

/// Arguments for the replacement process (program name excluded).
pub fn restart_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().skip(1).collect();
    if !args.iter().any(|arg| arg == RESTARTED_FLAG) {
        args.push(OsString::from(RESTARTED_FLAG));
    }
    args
}

/// Replace the current process with a fresh copy of itself.
///
/// Only returns when the exec fails.
#[cfg(unix)]
pub fn reexec() -> anyhow::Error {
    use std::os::unix::process::CommandExt;

    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => return anyhow::anyhow!("failed to resolve current executable: {}", e),
    };
    let args = restart_args(std::env::args_os());

    tracing::info!(exe = %exe.display(), ?args, "re-executing");
    let err = std::process::Command::new(&exe).args(&args).exec();
    anyhow::anyhow!("failed to re-exec {}: {}", exe.display(), err)
}

#[cfg(not(unix))]
pub fn reexec() -> anyhow::Error {
    anyhow::anyhow!("self re-exec is only supported on unix; restart the daemon externally")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn appends_marker_and_drops_program_name() {
        let args = restart_args(os(&["alertrelay", "--config", "a.toml"]));
        assert_eq!(args, os(&["--config", "a.toml", "--restarted"]));
    }

    #[test]
    fn marker_is_not_duplicated() {
        let args = restart_args(os(&["alertrelay", "--restarted", "--log-level", "debug"]));
        assert_eq!(args, os(&["--restarted", "--log-level", "debug"]));
    }

    #[test]
    fn bare_invocation() {
        assert_eq!(restart_args(os(&["alertrelay"])), os(&["--restarted"]));
    }
}
