//! Sway: `swaymsg output <name> bg <file> fill`, one call per output.

use std::path::PathBuf;
use std::sync::Arc;

use super::{
    nothing_to_apply, path_str, Addressing, EnvironmentRegistry, EnvironmentStrategy, Toolbox,
};
use crate::command::{run_checked, CommandRunner};
use crate::error::Result;
use crate::monitor::Monitor;

pub struct Sway {
    runner: Arc<dyn CommandRunner>,
}

impl EnvironmentStrategy for Sway {
    fn apply(&self, files: &[PathBuf], displays: &[Monitor]) -> Result<()> {
        if files.is_empty() {
            return Err(nothing_to_apply());
        }
        for (display, file) in displays.iter().zip(files) {
            run_checked(
                self.runner.as_ref(),
                "swaymsg",
                &["output", display.name.as_str(), "bg", path_str(file)?, "fill"],
            )?;
        }
        Ok(())
    }

    fn addressing(&self) -> Addressing {
        Addressing::ByName
    }
}

pub fn register(registry: &mut EnvironmentRegistry, tools: &Toolbox) {
    registry.register(
        "sway",
        Box::new(Sway {
            runner: Arc::clone(&tools.runner),
        }),
    );
}
