//! macOS: AppleScript through `osascript`, one desktop at a time.
//!
//! System Events numbers desktops from 1 in its own order, which need not
//! match the display probe's order.

use std::path::PathBuf;
use std::sync::Arc;

use super::{
    nothing_to_apply, path_str, Addressing, EnvironmentRegistry, EnvironmentStrategy, Toolbox,
};
use crate::command::{run_checked, CommandRunner};
use crate::error::Result;
use crate::monitor::Monitor;

pub struct MacOs {
    runner: Arc<dyn CommandRunner>,
}

fn set_picture_script(desktop: usize, file: &str) -> String {
    let quoted = file.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        "tell application \"System Events\" to set picture of desktop {desktop} \
         to POSIX file \"{quoted}\""
    )
}

impl EnvironmentStrategy for MacOs {
    fn apply(&self, files: &[PathBuf], _displays: &[Monitor]) -> Result<()> {
        if files.is_empty() {
            return Err(nothing_to_apply());
        }
        for (i, file) in files.iter().enumerate() {
            let script = set_picture_script(i + 1, path_str(file)?);
            run_checked(self.runner.as_ref(), "osascript", &["-e", script.as_str()])?;
        }
        Ok(())
    }

    fn addressing(&self) -> Addressing {
        Addressing::ByIndex
    }
}

pub fn register(registry: &mut EnvironmentRegistry, tools: &Toolbox) {
    registry.register(
        "macos",
        Box::new(MacOs {
            runner: Arc::clone(&tools.runner),
        }),
    );
}
