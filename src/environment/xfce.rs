//! Xfce: one `last-image` property per monitor and workspace in the
//! `xfce4-desktop` channel.
//!
//! The property names depend on the machine, so they are listed first and
//! the files are handed out in listing order.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{
    nothing_to_apply, path_str, Addressing, EnvironmentRegistry, EnvironmentStrategy, Toolbox,
};
use crate::command::{run_best_effort, run_checked, CommandRunner};
use crate::error::{Result, WallError};
use crate::monitor::Monitor;

const CHANNEL: &str = "xfce4-desktop";
const IMAGE_PROPERTY: &str = "last-image";
/// `image-style` 5 is "zoomed".
const ZOOMED: &str = "5";

pub struct Xfce {
    runner: Arc<dyn CommandRunner>,
}

impl Xfce {
    fn image_properties(&self) -> Result<Vec<String>> {
        let output = run_checked(self.runner.as_ref(), "xfconf-query", &["-c", CHANNEL, "--list"])?;
        Ok(image_properties(&output.stdout))
    }
}

/// Property paths containing `last-image`, in listing order.
fn image_properties(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| line.contains(IMAGE_PROPERTY))
        .map(String::from)
        .collect()
}

impl EnvironmentStrategy for Xfce {
    fn apply(&self, files: &[PathBuf], _displays: &[Monitor]) -> Result<()> {
        if files.is_empty() {
            return Err(nothing_to_apply());
        }
        let properties = self.image_properties()?;
        if properties.is_empty() {
            return Err(WallError::UnsupportedPlatform(format!(
                "xfconf channel `{CHANNEL}` has no {IMAGE_PROPERTY} properties"
            )));
        }
        if properties.len() < files.len() {
            warn!(
                properties = properties.len(),
                files = files.len(),
                "fewer xfce backdrops than images, extra images are unused"
            );
        }

        for (property, file) in properties.iter().zip(files) {
            let style = property.replace(IMAGE_PROPERTY, "image-style");
            run_best_effort(
                self.runner.as_ref(),
                "xfconf-query",
                &["-c", CHANNEL, "-p", style.as_str(), "-s", ZOOMED],
            );
            debug!(%property, file = %file.display(), "setting backdrop");
            run_checked(
                self.runner.as_ref(),
                "xfconf-query",
                &["-c", CHANNEL, "-p", property.as_str(), "-s", path_str(file)?],
            )?;
        }
        Ok(())
    }

    fn addressing(&self) -> Addressing {
        Addressing::ByIndex
    }
}

pub fn register(registry: &mut EnvironmentRegistry, tools: &Toolbox) {
    registry.register(
        "xfce4",
        Box::new(Xfce {
            runner: Arc::clone(&tools.runner),
        }),
    );
}
