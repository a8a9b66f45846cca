//! KDE Plasma: one PlasmaShell script assigns `files[i]` to `desktops()[i]`.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use super::{
    file_uri, nothing_to_apply, Addressing, EnvironmentRegistry, EnvironmentStrategy, Toolbox,
};
use crate::command::{run_checked, CommandRunner};
use crate::error::{Result, WallError};
use crate::monitor::Monitor;

/// Plasma 6 ships `qdbus6`, Plasma 5 `qdbus`.
const QDBUS: [&str; 2] = ["qdbus6", "qdbus"];

pub struct Kde {
    runner: Arc<dyn CommandRunner>,
}

impl Kde {
    fn find_qdbus(&self) -> Result<&'static str> {
        for exe in QDBUS {
            match self.runner.run(exe, &["--version"]) {
                Ok(_) => return Ok(exe),
                Err(WallError::UnsupportedPlatform(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(WallError::UnsupportedPlatform("qdbus not found (qdbus6/qdbus)".into()))
    }
}

/// Desktops beyond the number of files cycle through the files again.
fn plasma_script(uris: &[String]) -> Result<String> {
    let list = serde_json::to_string(uris).map_err(|e| WallError::InvalidArgument(e.to_string()))?;
    Ok(format!(
        "var files = {list};\n\
         var all = desktops();\n\
         for (var i = 0; i < all.length; i++) {{\n\
           var d = all[i];\n\
           d.wallpaperPlugin = 'org.kde.image';\n\
           d.currentConfigGroup = ['Wallpaper', 'org.kde.image', 'General'];\n\
           d.writeConfig('Image', files[i % files.length]);\n\
         }}\n"
    ))
}

impl EnvironmentStrategy for Kde {
    fn apply(&self, files: &[PathBuf], _displays: &[Monitor]) -> Result<()> {
        if files.is_empty() {
            return Err(nothing_to_apply());
        }
        let uris = files.iter().map(|f| file_uri(f)).collect::<Result<Vec<_>>>()?;
        let script = plasma_script(&uris)?;
        let qdbus = self.find_qdbus()?;
        debug!(qdbus, desktops = uris.len(), "evaluating plasma script");
        run_checked(
            self.runner.as_ref(),
            qdbus,
            &[
                "org.kde.plasmashell",
                "/PlasmaShell",
                "org.kde.PlasmaShell.evaluateScript",
                script.as_str(),
            ],
        )?;
        Ok(())
    }

    fn addressing(&self) -> Addressing {
        Addressing::ByIndex
    }
}

pub fn register(registry: &mut EnvironmentRegistry, tools: &Toolbox) {
    registry.register(
        "kde",
        Box::new(Kde {
            runner: Arc::clone(&tools.runner),
        }),
    );
}
