//! Bare window managers (i3, Openbox, Fluxbox, …): `feh --bg-fill`.
//!
//! feh hands the images to X screens in the order given.

use std::path::PathBuf;
use std::sync::Arc;

use super::{
    nothing_to_apply, path_str, Addressing, EnvironmentRegistry, EnvironmentStrategy, Toolbox,
};
use crate::command::{run_checked, CommandRunner};
use crate::error::Result;
use crate::monitor::Monitor;

pub struct Feh {
    runner: Arc<dyn CommandRunner>,
}

impl EnvironmentStrategy for Feh {
    fn apply(&self, files: &[PathBuf], _displays: &[Monitor]) -> Result<()> {
        if files.is_empty() {
            return Err(nothing_to_apply());
        }
        let mut args = vec!["--bg-fill"];
        for file in files {
            args.push(path_str(file)?);
        }
        run_checked(self.runner.as_ref(), "feh", &args)?;
        Ok(())
    }

    fn addressing(&self) -> Addressing {
        Addressing::ByIndex
    }
}

pub fn register(registry: &mut EnvironmentRegistry, tools: &Toolbox) {
    registry.register(
        "feh",
        Box::new(Feh {
            runner: Arc::clone(&tools.runner),
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::RecordingRunner;

    #[test]
    fn one_call_with_every_file() {
        let runner = Arc::new(RecordingRunner::new());
        let feh = Feh {
            runner: Arc::clone(&runner) as Arc<dyn CommandRunner>,
        };
        feh.apply(&[PathBuf::from("/a.png"), PathBuf::from("/b.png")], &[]).unwrap();
        assert_eq!(runner.calls(), vec![vec!["feh", "--bg-fill", "/a.png", "/b.png"]]);
    }
}
