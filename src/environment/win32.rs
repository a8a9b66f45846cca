//! Windows: one wallpaper for the whole virtual screen.
//!
//! Several monitors get a composite with `WallpaperStyle` 22 (span); a single
//! monitor gets its image with style 10 (fill). The style lives in the
//! registry and is written with `reg add`; the wallpaper itself is set with
//! `SystemParametersInfoW`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::{spanning_image, Addressing, EnvironmentRegistry, EnvironmentStrategy, Toolbox};
use crate::command::{run_best_effort, CommandRunner};
use crate::error::{Result, WallError};
use crate::monitor::Monitor;

const DESKTOP_KEY: &str = r"HKCU\Control Panel\Desktop";
const STYLE_SPAN: &str = "22";
const STYLE_FILL: &str = "10";

type SetWallpaper = Box<dyn Fn(&Path) -> Result<()> + Send + Sync>;

pub struct Win32 {
    runner: Arc<dyn CommandRunner>,
    canvas_dir: PathBuf,
    set_wallpaper: SetWallpaper,
}

impl Win32 {
    fn write_desktop_value(&self, name: &str, value: &str) {
        run_best_effort(
            self.runner.as_ref(),
            "reg",
            &["add", DESKTOP_KEY, "/v", name, "/t", "REG_SZ", "/d", value, "/f"],
        );
    }
}

impl EnvironmentStrategy for Win32 {
    fn init(&self) -> Result<()> {
        enable_ansi();
        Ok(())
    }

    fn apply(&self, files: &[PathBuf], displays: &[Monitor]) -> Result<()> {
        let image = spanning_image(files, displays, &self.canvas_dir)?;
        let style = if displays.len() > 1 {
            STYLE_SPAN
        } else {
            STYLE_FILL
        };
        debug!(style, image = %image.display(), "setting windows wallpaper");

        self.write_desktop_value("WallpaperStyle", style);
        self.write_desktop_value("TileWallpaper", "0");
        (self.set_wallpaper)(&image)
    }

    fn addressing(&self) -> Addressing {
        Addressing::Canvas
    }
}

#[cfg(windows)]
fn system_set_wallpaper(path: &Path) -> Result<()> {
    use std::os::windows::ffi::OsStrExt;

    use ::windows::Win32::UI::WindowsAndMessaging::{
        SystemParametersInfoW, SPIF_SENDCHANGE, SPIF_UPDATEINIFILE, SPI_SETDESKWALLPAPER,
    };

    let mut wide: Vec<u16> = path.as_os_str().encode_wide().chain(std::iter::once(0)).collect();
    unsafe {
        SystemParametersInfoW(
            SPI_SETDESKWALLPAPER,
            0,
            Some(wide.as_mut_ptr().cast()),
            SPIF_UPDATEINIFILE | SPIF_SENDCHANGE,
        )
    }
    .map_err(|err| WallError::CommandFailed {
        program: "SystemParametersInfoW".into(),
        status: err.to_string(),
    })
}

#[cfg(not(windows))]
fn system_set_wallpaper(_path: &Path) -> Result<()> {
    Err(WallError::UnsupportedPlatform("SystemParametersInfoW needs Windows".into()))
}

/// Turn on VT processing so coloured log output renders in `cmd.exe`.
#[cfg(windows)]
fn enable_ansi() {
    use ::windows::Win32::System::Console::{
        GetConsoleMode, GetStdHandle, SetConsoleMode, CONSOLE_MODE,
        ENABLE_VIRTUAL_TERMINAL_PROCESSING, STD_OUTPUT_HANDLE,
    };

    unsafe {
        let Ok(handle) = GetStdHandle(STD_OUTPUT_HANDLE) else {
            return;
        };
        let mut mode = CONSOLE_MODE::default();
        if GetConsoleMode(handle, &mut mode).is_err() {
            debug!("stdout is not a console, leaving ANSI alone");
            return;
        }
        if let Err(err) = SetConsoleMode(handle, mode | ENABLE_VIRTUAL_TERMINAL_PROCESSING) {
            tracing::warn!("could not enable ANSI escapes: {err}");
        }
    }
}

#[cfg(not(windows))]
fn enable_ansi() {}

pub fn register(registry: &mut EnvironmentRegistry, tools: &Toolbox) {
    registry.register(
        "windows",
        Box::new(Win32 {
            runner: Arc::clone(&tools.runner),
            canvas_dir: tools.canvas_dir.clone(),
            set_wallpaper: Box::new(system_set_wallpaper),
        }),
    );
}
