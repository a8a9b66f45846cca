//! LXDE: PCManFM draws the desktop and takes one image for the whole screen.

use std::path::PathBuf;
use std::sync::Arc;

use super::{
    path_str, spanning_image, Addressing, EnvironmentRegistry, EnvironmentStrategy, Toolbox,
};
use crate::command::{run_checked, CommandRunner};
use crate::error::Result;
use crate::monitor::Monitor;

pub struct Pcmanfm {
    runner: Arc<dyn CommandRunner>,
    canvas_dir: PathBuf,
}

impl EnvironmentStrategy for Pcmanfm {
    fn apply(&self, files: &[PathBuf], displays: &[Monitor]) -> Result<()> {
        let image = spanning_image(files, displays, &self.canvas_dir)?;
        // `screen` stretches over the whole virtual screen, which is what a
        // composite needs; `crop` fills a single monitor.
        let mode = if displays.len() > 1 {
            "--wallpaper-mode=screen"
        } else {
            "--wallpaper-mode=crop"
        };
        run_checked(
            self.runner.as_ref(),
            "pcmanfm",
            &["--set-wallpaper", path_str(&image)?, mode],
        )?;
        Ok(())
    }

    fn addressing(&self) -> Addressing {
        Addressing::Canvas
    }
}

pub fn register(registry: &mut EnvironmentRegistry, tools: &Toolbox) {
    registry.register(
        "lxde",
        Box::new(Pcmanfm {
            runner: Arc::clone(&tools.runner),
            canvas_dir: tools.canvas_dir.clone(),
        }),
    );
}
