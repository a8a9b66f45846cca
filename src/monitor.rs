//! Monitor geometry and the probes that enumerate it.
//!
//! A [`Monitor`] list is a snapshot: the dispatcher asks its [`DisplayProbe`]
//! again at the start of every rotation cycle, since monitors come and go.
//! Order is whatever the probe reports; nothing here sorts.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::command::{run_checked, CommandRunner};
use crate::error::{Result, WallError};

/// One connected display, in virtual-desktop coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Monitor {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub name: String,
    pub is_primary: bool,
}

impl Monitor {
    pub fn new(name: impl Into<String>, x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            name: name.into(),
            is_primary: false,
        }
    }

    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    /// Parse `NAME:WIDTHxHEIGHT+X+Y`; the name part is optional.
    pub fn parse_spec(spec: &str, fallback_name: &str) -> Result<Self> {
        let bad = || {
            WallError::InvalidArgument(format!(
                "display `{spec}` is not NAME:WIDTHxHEIGHT+X+Y"
            ))
        };
        let (name, geometry) = match spec.rsplit_once(':') {
            Some((name, geometry)) if !name.is_empty() => (name, geometry),
            Some((_, geometry)) => (fallback_name, geometry),
            None => (fallback_name, spec),
        };
        let (size, offset) = geometry.split_once(['+', '-']).ok_or_else(bad)?;
        let (width, height) = size.split_once('x').ok_or_else(bad)?;
        // Keep the sign of the first offset: it was consumed by split_once.
        let sign = &geometry[size.len()..=size.len()];
        let (x, y) = split_offsets(&format!("{sign}{offset}")).ok_or_else(bad)?;

        Ok(Self::new(
            name,
            x,
            y,
            width.parse().map_err(|_| bad())?,
            height.parse().map_err(|_| bad())?,
        ))
    }
}

/// Split `+X+Y` / `-X+Y` / `+X-Y` into two signed integers.
fn split_offsets(text: &str) -> Option<(i32, i32)> {
    let second = text[1..].find(['+', '-'])? + 1;
    let x = text[..second].trim_start_matches('+').parse().ok()?;
    let y = text[second..].trim_start_matches('+').parse().ok()?;
    Some((x, y))
}

/// Display-enumeration collaborator.
pub trait DisplayProbe: Send + Sync {
    fn monitors(&self) -> Result<Vec<Monitor>>;
}

/// Monitors declared up front (command line), returned unchanged every cycle.
#[derive(Debug, Clone)]
pub struct FixedProbe(pub Vec<Monitor>);

impl FixedProbe {
    /// Build from `--display` arguments; the first one is the primary.
    pub fn from_specs<S: AsRef<str>>(specs: &[S]) -> Result<Self> {
        let mut monitors = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| Monitor::parse_spec(spec.as_ref(), &format!("DISPLAY-{i}")))
            .collect::<Result<Vec<_>>>()?;
        if let Some(first) = monitors.first_mut() {
            first.is_primary = true;
        }
        Ok(Self(monitors))
    }
}

impl DisplayProbe for FixedProbe {
    fn monitors(&self) -> Result<Vec<Monitor>> {
        Ok(self.0.clone())
    }
}

/// Runs one command and parses its stdout into monitors.
struct CommandProbe {
    runner: Arc<dyn CommandRunner>,
    program: &'static str,
    args: &'static [&'static str],
    parse: fn(&str) -> Result<Vec<Monitor>>,
}

impl DisplayProbe for CommandProbe {
    fn monitors(&self) -> Result<Vec<Monitor>> {
        let output = run_checked(self.runner.as_ref(), self.program, self.args)?;
        let monitors = (self.parse)(&output.stdout)?;
        if monitors.is_empty() {
            return Err(WallError::UnsupportedPlatform(format!(
                "`{}` reported no active monitors",
                self.program
            )));
        }
        Ok(monitors)
    }
}

/// Pick the probe matching an environment key.
///
/// Declared monitors always win. Name-addressed compositors get their own
/// probe so output names match what their wallpaper tool expects.
pub fn probe_for(
    environment: &str,
    declared: Vec<Monitor>,
    runner: Arc<dyn CommandRunner>,
) -> Box<dyn DisplayProbe> {
    if !declared.is_empty() {
        return Box::new(FixedProbe(declared));
    }
    match environment {
        "hyprland" => command_probe(runner, "hyprctl", &["monitors", "-j"], parse_hyprctl),
        "sway" => command_probe(runner, "swaymsg", &["-t", "get_outputs", "-r"], parse_swaymsg),
        "niri" => command_probe(runner, "niri", &["msg", "--json", "outputs"], parse_niri),
        "macos" => command_probe(
            runner,
            "system_profiler",
            &["SPDisplaysDataType", "-json"],
            parse_system_profiler,
        ),
        #[cfg(windows)]
        "windows" => Box::new(windows_probe::WindowsProbe),
        _ => command_probe(runner, "xrandr", &["--listmonitors"], parse_xrandr),
    }
}

fn command_probe(
    runner: Arc<dyn CommandRunner>,
    program: &'static str,
    args: &'static [&'static str],
    parse: fn(&str) -> Result<Vec<Monitor>>,
) -> Box<dyn DisplayProbe> {
    Box::new(CommandProbe {
        runner,
        program,
        args,
        parse,
    })
}

fn malformed(tool: &str, detail: impl std::fmt::Display) -> WallError {
    WallError::UnsupportedPlatform(format!("cannot read `{tool}` output: {detail}"))
}

/// ` 0: +*eDP-1 1920/344x1080/193+0+0  eDP-1`
pub fn parse_xrandr(stdout: &str) -> Result<Vec<Monitor>> {
    stdout
        .lines()
        .skip_while(|line| line.starts_with("Monitors:"))
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [_, flags, geometry, name, ..] = fields[..] else {
                return Err(malformed("xrandr", line));
            };
            let (size, offsets) = geometry
                .split_once(['+', '-'])
                .ok_or_else(|| malformed("xrandr", geometry))?;
            let sign = &geometry[size.len()..=size.len()];
            let (x, y) = split_offsets(&format!("{sign}{offsets}"))
                .ok_or_else(|| malformed("xrandr", geometry))?;
            let (width, height) = size.split_once('x').ok_or_else(|| malformed("xrandr", size))?;
            let physical = |dim: &str| -> Result<u32> {
                dim.split('/')
                    .next()
                    .and_then(|px| px.parse().ok())
                    .ok_or_else(|| malformed("xrandr", dim))
            };
            Ok(Monitor {
                x,
                y,
                width: physical(width)?,
                height: physical(height)?,
                name: name.to_string(),
                is_primary: flags.contains('*'),
            })
        })
        .collect()
}

pub fn parse_hyprctl(stdout: &str) -> Result<Vec<Monitor>> {
    #[derive(Deserialize)]
    struct HyprMonitor {
        name: String,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    }

    let raw: Vec<HyprMonitor> = serde_json::from_str(stdout).map_err(|e| malformed("hyprctl", e))?;
    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(i, m)| Monitor {
            is_primary: i == 0,
            ..Monitor::new(m.name, m.x, m.y, m.width, m.height)
        })
        .collect())
}

pub fn parse_swaymsg(stdout: &str) -> Result<Vec<Monitor>> {
    #[derive(Deserialize)]
    struct Rect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    }
    #[derive(Deserialize)]
    struct Output {
        name: String,
        #[serde(default)]
        active: bool,
        #[serde(default)]
        primary: bool,
        rect: Rect,
    }

    let raw: Vec<Output> = serde_json::from_str(stdout).map_err(|e| malformed("swaymsg", e))?;
    Ok(raw
        .into_iter()
        .filter(|o| o.active)
        .map(|o| Monitor {
            is_primary: o.primary,
            ..Monitor::new(o.name, o.rect.x, o.rect.y, o.rect.width, o.rect.height)
        })
        .collect())
}

/// `niri msg --json outputs` is an object keyed by connector name.
pub fn parse_niri(stdout: &str) -> Result<Vec<Monitor>> {
    let root: Value = serde_json::from_str(stdout).map_err(|e| malformed("niri", e))?;
    let outputs = root.as_object().ok_or_else(|| malformed("niri", "expected an object"))?;

    let mut monitors = Vec::new();
    for (name, output) in outputs {
        // Disabled outputs have `"logical": null`.
        let Some(logical) = output.get("logical").filter(|l| !l.is_null()) else {
            continue;
        };
        let int = |key: &str| logical.get(key).and_then(Value::as_i64);
        let (Some(x), Some(y), Some(width), Some(height)) =
            (int("x"), int("y"), int("width"), int("height"))
        else {
            return Err(malformed("niri", format!("incomplete geometry for {name}")));
        };
        monitors.push(Monitor::new(
            name.clone(),
            i32::try_from(x).map_err(|e| malformed("niri", e))?,
            i32::try_from(y).map_err(|e| malformed("niri", e))?,
            u32::try_from(width).map_err(|e| malformed("niri", e))?,
            u32::try_from(height).map_err(|e| malformed("niri", e))?,
        ));
    }
    if let Some(first) = monitors.first_mut() {
        first.is_primary = true;
    }
    Ok(monitors)
}

/// macOS reports sizes but not offsets; displays are laid out left to right.
pub fn parse_system_profiler(stdout: &str) -> Result<Vec<Monitor>> {
    let root: Value = serde_json::from_str(stdout).map_err(|e| malformed("system_profiler", e))?;
    let gpus = root
        .get("SPDisplaysDataType")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("system_profiler", "missing SPDisplaysDataType"))?;

    let mut monitors = Vec::new();
    let mut next_x = 0i32;
    for display in gpus
        .iter()
        .filter_map(|gpu| gpu.get("spdisplays_ndrvs").and_then(Value::as_array))
        .flatten()
    {
        let Some(pixels) = display
            .get("_spdisplays_pixels")
            .or_else(|| display.get("_spdisplays_resolution"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        let mut dims = pixels.split(" x ");
        let width: u32 = dims
            .next()
            .and_then(|w| w.trim().parse().ok())
            .ok_or_else(|| malformed("system_profiler", pixels))?;
        let height: u32 = dims
            .next()
            .and_then(|h| h.split_whitespace().next())
            .and_then(|h| h.parse().ok())
            .ok_or_else(|| malformed("system_profiler", pixels))?;
        let name = display
            .get("_name")
            .and_then(Value::as_str)
            .unwrap_or("Display")
            .to_string();
        let is_primary =
            display.get("spdisplays_main").and_then(Value::as_str) == Some("spdisplays_yes");

        monitors.push(Monitor {
            is_primary,
            ..Monitor::new(name, next_x, 0, width, height)
        });
        next_x = next_x.saturating_add(i32::try_from(width).unwrap_or(i32::MAX));
    }
    Ok(monitors)
}

#[cfg(windows)]
mod windows_probe {
    use std::mem;

    use windows::core::BOOL;
    use windows::Win32::Foundation::{LPARAM, RECT};
    use windows::Win32::Graphics::Gdi::{
        EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFOEXW,
    };

    use super::{DisplayProbe, Monitor};
    use crate::error::{Result, WallError};

    pub struct WindowsProbe;

    impl DisplayProbe for WindowsProbe {
        fn monitors(&self) -> Result<Vec<Monitor>> {
            unsafe extern "system" fn enum_monitor_proc(
                monitor: HMONITOR,
                _hdc: HDC,
                _rect: *mut RECT,
                lparam: LPARAM,
            ) -> BOOL {
                let monitors = &mut *(lparam.0 as *mut Vec<Monitor>);

                let mut info: MONITORINFOEXW = mem::zeroed();
                info.monitorInfo.cbSize = mem::size_of::<MONITORINFOEXW>() as u32;

                if GetMonitorInfoW(monitor, &mut info as *mut MONITORINFOEXW as *mut _).as_bool() {
                    let rect = info.monitorInfo.rcMonitor;
                    let device = String::from_utf16_lossy(&info.szDevice);
                    monitors.push(Monitor {
                        x: rect.left,
                        y: rect.top,
                        width: (rect.right - rect.left).unsigned_abs(),
                        height: (rect.bottom - rect.top).unsigned_abs(),
                        name: device.trim_end_matches('\0').to_string(),
                        is_primary: info.monitorInfo.dwFlags & 1 != 0,
                    });
                }

                BOOL(1)
            }

            let mut monitors = Vec::<Monitor>::new();
            unsafe {
                let _ = EnumDisplayMonitors(
                    None,
                    None,
                    Some(enum_monitor_proc),
                    LPARAM((&mut monitors as *mut Vec<Monitor>) as isize),
                );
            }
            if monitors.is_empty() {
                return Err(WallError::UnsupportedPlatform("no monitors enumerated".into()));
            }
            Ok(monitors)
        }
    }
}
