//! External process seam.
//!
//! Wallpaper strategies and display probes never spawn processes directly;
//! they go through a [`CommandRunner`] so tests can record the calls instead.

use std::io::ErrorKind;
use std::process::Command;

use tracing::{debug, warn};

use crate::error::{Result, WallError};

/// What came back from one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// Human-readable exit status, e.g. `exit status: 1`.
    pub status: String,
    pub stdout: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            status: "exit status: 0".into(),
            stdout: stdout.into(),
        }
    }
}

/// Runs external programs on behalf of the core.
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and wait for it.
    ///
    /// A program that cannot be found must surface as
    /// [`WallError::UnsupportedPlatform`]; a non-zero exit is *not* an error
    /// at this level (see [`run_checked`]).
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// The real thing: `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        debug!(program, ?args, "running external command");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => {
                    WallError::UnsupportedPlatform(format!("`{program}` is not installed"))
                }
                _ => WallError::Io(err),
            })?;

        if !output.stderr.is_empty() {
            debug!(program, stderr = %String::from_utf8_lossy(&output.stderr).trim_end());
        }

        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

/// Run a command whose failure fails the apply step.
pub fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
) -> Result<CommandOutput> {
    let output = runner.run(program, args)?;
    if !output.success {
        return Err(WallError::CommandFailed {
            program: program.to_string(),
            status: output.status,
        });
    }
    Ok(output)
}

/// Run a non-critical command (style writes and the like); failures are logged only.
pub fn run_best_effort(runner: &dyn CommandRunner, program: &str, args: &[&str]) {
    match runner.run(program, args) {
        Ok(output) if output.success => {}
        Ok(output) => warn!(program, ?args, status = %output.status, "non-critical command failed"),
        Err(err) => warn!(program, ?args, "non-critical command could not run: {err}"),
    }
}

/// Open URLs or files with the desktop's default handler, best effort.
pub fn open_targets(runner: &dyn CommandRunner, targets: &[String]) {
    open_targets_on(runner, std::env::consts::OS, targets);
}

fn open_targets_on(runner: &dyn CommandRunner, os: &str, targets: &[String]) {
    // `cmd /C start` re-parses its arguments and splits URLs at `&`.
    let (program, leading): (&str, &[&str]) = match os {
        "windows" => ("rundll32", &["url.dll,FileProtocolHandler"]),
        "macos" => ("open", &[]),
        _ => ("xdg-open", &[]),
    };
    for target in targets {
        let mut args = leading.to_vec();
        args.push(target.as_str());
        run_best_effort(runner, program, &args);
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingRunner;
    use super::*;

    #[test]
    fn run_checked_turns_exit_status_into_error() {
        let runner = RecordingRunner::new().failing("feh");
        let err = run_checked(&runner, "feh", &["--bg-fill"]).unwrap_err();
        assert!(matches!(err, WallError::CommandFailed { ref program, .. } if program == "feh"));
    }

    #[test]
    fn run_best_effort_swallows_failures() {
        let runner = RecordingRunner::new().failing("gsettings").missing("reg");
        run_best_effort(&runner, "gsettings", &["set"]);
        run_best_effort(&runner, "reg", &["add"]);
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn targets_open_with_the_platform_handler() {
        let url = "https://konachan.com/post?tags=a&page=2".to_string();
        for (os, expected) in [
            ("linux", vec!["xdg-open", url.as_str()]),
            ("macos", vec!["open", url.as_str()]),
            ("windows", vec!["rundll32", "url.dll,FileProtocolHandler", url.as_str()]),
        ] {
            let runner = RecordingRunner::new();
            open_targets_on(&runner, os, &[url.clone()]);
            assert_eq!(runner.calls(), vec![expected], "{os}");
        }
    }

    #[test]
    fn every_target_is_opened() {
        let runner = RecordingRunner::new();
        open_targets_on(&runner, "linux", &["a".into(), "b".into()]);
        assert_eq!(runner.calls_to("xdg-open").len(), 2);
    }

    #[test]
    fn missing_program_is_unsupported_platform() {
        let err = SystemRunner
            .run("konawall-definitely-not-a-real-binary", &[])
            .unwrap_err();
        assert!(matches!(err, WallError::UnsupportedPlatform(_)));
    }
}
