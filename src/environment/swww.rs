//! Hyprland and niri: the `swww` daemon, addressed by output name.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use super::{
    nothing_to_apply, path_str, Addressing, EnvironmentRegistry, EnvironmentStrategy, Toolbox,
};
use crate::command::{run_best_effort, run_checked, CommandRunner};
use crate::error::Result;
use crate::monitor::Monitor;

pub struct Swww {
    runner: Arc<dyn CommandRunner>,
    /// A running swaybg paints over swww on Hyprland.
    stop_swaybg: bool,
}

impl EnvironmentStrategy for Swww {
    fn init(&self) -> Result<()> {
        if self.stop_swaybg {
            debug!("stopping swaybg");
            run_best_effort(self.runner.as_ref(), "killall", &["swaybg"]);
        }
        Ok(())
    }

    fn apply(&self, files: &[PathBuf], displays: &[Monitor]) -> Result<()> {
        if files.is_empty() {
            return Err(nothing_to_apply());
        }
        for (display, file) in displays.iter().zip(files) {
            run_checked(
                self.runner.as_ref(),
                "swww",
                &["img", "-o", display.name.as_str(), path_str(file)?],
            )?;
        }
        Ok(())
    }

    fn addressing(&self) -> Addressing {
        Addressing::ByName
    }
}

pub fn register(registry: &mut EnvironmentRegistry, tools: &Toolbox) {
    for (key, stop_swaybg) in [("hyprland", true), ("niri", false)] {
        registry.register(
            key,
            Box::new(Swww {
                runner: Arc::clone(&tools.runner),
                stop_swaybg,
            }),
        );
    }
}
