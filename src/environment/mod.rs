//! Desktop wallpaper strategies.
//!
//! An [`EnvironmentStrategy`] turns downloaded files plus the current monitor
//! layout into an OS-level wallpaper change. Every strategy shells out
//! through the [`CommandRunner`] seam, except the Windows one which calls
//! the Win32 API directly.
//!
//! ## For contributors: adding a new desktop
//!
//! 1. Create a module in this directory implementing [`EnvironmentStrategy`].
//! 2. Declare its [`Addressing`]. Desktops that can only show one image
//!    across all monitors are `Canvas` strategies and call
//!    [`spanning_image`] first.
//! 3. Give the module a `register` function, call it from [`register_all`],
//!    and teach [`detect`] which session names map onto the new key.

pub mod detect;
mod feh;
mod gsettings;
mod kde;
mod macos;
mod pcmanfm;
mod sway;
mod swww;
mod win32;
mod xfce;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::command::CommandRunner;
use crate::compositor;
use crate::error::{Result, WallError};
use crate::monitor::Monitor;
use crate::registry::Registry;

/// How a strategy maps files onto monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// `files[i]` goes to the output called `displays[i].name`.
    ByName,
    /// `files[i]` goes to whatever the desktop itself numbers as `i`. Breaks
    /// silently if the desktop orders monitors differently from the probe.
    ByIndex,
    /// All files are composed into one spanning image first.
    Canvas,
}

impl Addressing {
    pub fn label(self) -> &'static str {
        match self {
            Self::ByName => "by name",
            Self::ByIndex => "by index",
            Self::Canvas => "spanning canvas",
        }
    }
}

pub trait EnvironmentStrategy: Send + Sync {
    /// One-time setup, run before the first `apply` of the process.
    /// Must tolerate being called again.
    fn init(&self) -> Result<()> {
        Ok(())
    }

    fn apply(&self, files: &[PathBuf], displays: &[Monitor]) -> Result<()>;

    fn addressing(&self) -> Addressing;
}

pub type EnvironmentRegistry = Registry<dyn EnvironmentStrategy>;

/// What strategies are built with.
#[derive(Clone)]
pub struct Toolbox {
    pub runner: Arc<dyn CommandRunner>,
    /// Where spanning images are written.
    pub canvas_dir: PathBuf,
}

/// Register every built-in desktop, in a fixed order.
pub fn register_all(registry: &mut EnvironmentRegistry, tools: &Toolbox) {
    gsettings::register(registry, tools);
    pcmanfm::register(registry, tools);
    xfce::register(registry, tools);
    kde::register(registry, tools);
    feh::register(registry, tools);
    sway::register(registry, tools);
    swww::register(registry, tools);
    macos::register(registry, tools);
    win32::register(registry, tools);
}

/// The single image a `Canvas` strategy should set.
///
/// With at most one monitor the first file is used as is. A short fetch
/// repeats its images across the remaining monitors; surplus images are
/// left out.
pub fn spanning_image(files: &[PathBuf], displays: &[Monitor], dir: &Path) -> Result<PathBuf> {
    let Some(first) = files.first() else {
        return Err(nothing_to_apply());
    };
    if displays.len() <= 1 {
        return Ok(first.clone());
    }
    let assigned: Vec<PathBuf> = files.iter().cycle().take(displays.len()).cloned().collect();
    compositor::combine_into(displays, &assigned, dir)
}

pub(crate) fn nothing_to_apply() -> WallError {
    WallError::InvalidArgument("no images to apply".into())
}

/// External tools take paths as plain strings.
pub(crate) fn path_str(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        WallError::InvalidArgument(format!("path is not valid UTF-8: {}", path.display()))
    })
}

pub(crate) fn file_uri(path: &Path) -> Result<String> {
    Ok(format!("file://{}", path_str(path)?))
}
