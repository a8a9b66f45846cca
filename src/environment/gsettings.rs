//! dconf-backed desktops: GNOME, Cinnamon, MATE and Deepin.
//!
//! None of them can set a different image per monitor, so they all get one
//! spanning image plus `picture-options spanned`.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use super::{
    file_uri, path_str, spanning_image, Addressing, EnvironmentRegistry, EnvironmentStrategy,
    Toolbox,
};
use crate::command::{run_best_effort, run_checked, CommandRunner};
use crate::error::Result;
use crate::monitor::Monitor;

#[derive(Debug, Clone, Copy)]
enum Value {
    /// `file:///path`
    Uri,
    /// `/path`
    Path,
}

struct Desktop {
    key: &'static str,
    schema: &'static str,
    picture_key: &'static str,
    value: Value,
    /// GNOME 42+ keeps a separate image for the dark style.
    dark_key: Option<&'static str>,
}

static DESKTOPS: [Desktop; 4] = [
    Desktop {
        key: "gnome",
        schema: "org.gnome.desktop.background",
        picture_key: "picture-uri",
        value: Value::Uri,
        dark_key: Some("picture-uri-dark"),
    },
    Desktop {
        key: "cinnamon",
        schema: "org.cinnamon.desktop.background",
        picture_key: "picture-uri",
        value: Value::Uri,
        dark_key: None,
    },
    Desktop {
        key: "mate",
        schema: "org.mate.background",
        picture_key: "picture-filename",
        value: Value::Path,
        dark_key: None,
    },
    Desktop {
        key: "deepin",
        schema: "com.deepin.wrap.gnome.desktop.background",
        picture_key: "picture-uri",
        value: Value::Uri,
        dark_key: None,
    },
];

pub struct Gsettings {
    desktop: &'static Desktop,
    runner: Arc<dyn CommandRunner>,
    canvas_dir: PathBuf,
}

impl Gsettings {
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let args = ["set", self.desktop.schema, key, value];
        run_checked(self.runner.as_ref(), "gsettings", &args).map(drop)
    }

    fn set_best_effort(&self, key: &str, value: &str) {
        let args = ["set", self.desktop.schema, key, value];
        run_best_effort(self.runner.as_ref(), "gsettings", &args);
    }
}

impl EnvironmentStrategy for Gsettings {
    fn apply(&self, files: &[PathBuf], displays: &[Monitor]) -> Result<()> {
        let image = spanning_image(files, displays, &self.canvas_dir)?;
        let value = match self.desktop.value {
            Value::Uri => file_uri(&image)?,
            Value::Path => path_str(&image)?.to_string(),
        };
        debug!(desktop = self.desktop.key, %value, "setting wallpaper");

        self.set(self.desktop.picture_key, &value)?;
        if let Some(dark) = self.desktop.dark_key {
            self.set_best_effort(dark, &value);
        }
        self.set_best_effort("picture-options", picture_options(displays));
        Ok(())
    }

    fn addressing(&self) -> Addressing {
        Addressing::Canvas
    }
}

/// A composite must be spanned across monitors; a lone image is zoomed.
fn picture_options(displays: &[Monitor]) -> &'static str {
    if displays.len() > 1 {
        "spanned"
    } else {
        "zoom"
    }
}

pub fn register(registry: &mut EnvironmentRegistry, tools: &Toolbox) {
    for desktop in &DESKTOPS {
        registry.register(
            desktop.key,
            Box::new(Gsettings {
                desktop,
                runner: Arc::clone(&tools.runner),
                canvas_dir: tools.canvas_dir.clone(),
            }),
        );
    }
}
