//! Which desktop are we running under?
//!
//! Linux has no single answer, so the environment is read in priority order:
//! compositor sockets, then `DESKTOP_SESSION`, then `XDG_CURRENT_DESKTOP`.
//! Every other OS is identified by `std::env::consts::OS` alone.

use tracing::debug;

use crate::error::{Result, WallError};

/// Compositors that export a socket variable while they run.
const COMPOSITOR_SOCKETS: [(&str, &str); 3] = [
    ("SWAYSOCK", "sway"),
    ("HYPRLAND_INSTANCE_SIGNATURE", "hyprland"),
    ("NIRI_SOCKET", "niri"),
];

/// Session names that already are environment keys.
const UNCHANGED: [&str; 7] = ["gnome", "cinnamon", "mate", "deepin", "xfce4", "lxde", "kde"];

/// Distribution and window-manager sessions that share another key.
const REMAPPED: [(&str, &str); 12] = [
    ("plasma", "kde"),
    ("ubuntustudio", "kde"),
    ("kubuntu", "kde"),
    ("ubuntu", "gnome"),
    ("ubuntugnome", "gnome"),
    ("lubuntu", "lxde"),
    ("xubuntu", "xfce4"),
    ("xfce", "xfce4"),
    ("fluxbox", "feh"),
    ("blackbox", "feh"),
    ("openbox", "feh"),
    ("i3", "feh"),
];

/// Detect from the real process environment.
pub fn detect() -> Result<String> {
    detect_from(std::env::consts::OS, |name| std::env::var(name).ok())
}

/// Pure detection over an OS name and a variable lookup.
pub fn detect_from(os: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    if os != "linux" {
        debug!(os, "environment is the platform itself");
        return Ok(os.to_string());
    }
    let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    if let Some((name, key)) = COMPOSITOR_SOCKETS.iter().find(|(name, _)| var(*name).is_some()) {
        debug!(variable = name, key, "compositor socket found");
        return Ok((*key).to_string());
    }

    if let Some(session) = var("DESKTOP_SESSION") {
        if let Some(key) = session_key(&session.to_lowercase()) {
            debug!(%session, key, "matched DESKTOP_SESSION");
            return Ok(key.to_string());
        }
    }

    let Some(current) = var("XDG_CURRENT_DESKTOP") else {
        return Err(WallError::UnsupportedPlatform(
            "cannot tell the desktop: none of SWAYSOCK, HYPRLAND_INSTANCE_SIGNATURE, NIRI_SOCKET, \
             DESKTOP_SESSION or XDG_CURRENT_DESKTOP is set"
                .into(),
        ));
    };
    let current = current.to_lowercase();
    let entries: Vec<&str> = current.split(':').map(str::trim).filter(|e| !e.is_empty()).collect();
    let key = entries
        .iter()
        .find_map(|entry| session_key(entry))
        .map(str::to_string)
        .or_else(|| entries.first().map(|e| (*e).to_string()))
        .ok_or_else(|| {
            WallError::UnsupportedPlatform(format!("unusable XDG_CURRENT_DESKTOP `{current}`"))
        })?;
    debug!(%current, %key, "fell back to XDG_CURRENT_DESKTOP");
    Ok(key)
}

fn session_key(session: &str) -> Option<&'static str> {
    UNCHANGED
        .iter()
        .find(|key| **key == session)
        .copied()
        .or_else(|| REMAPPED.iter().find(|(from, _)| *from == session).map(|(_, to)| *to))
}

/// Every key the Linux tables can produce.
pub fn known_keys() -> impl Iterator<Item = &'static str> {
    COMPOSITOR_SOCKETS
        .iter()
        .map(|(_, key)| *key)
        .chain(UNCHANGED)
        .chain(REMAPPED.iter().map(|(_, key)| *key))
}
