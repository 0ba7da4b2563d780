//! `update` subcommand.

use super::RunContext;
use crate::core::UpdateError;
use crate::orchestrator::{ProcessLauncher, UpdateOrchestrator, UpdateState};
use anyhow::Result;
use clap::Args;
use tracing::error;

/// Replace the installation with the staged update and relaunch it.
///
/// Must run from the working copy (`<product>-temp`); the host application
/// starts it there and exits immediately afterwards.
#[derive(Debug, Args)]
pub struct UpdateCommand {
    /// File name of the application's executable in the installed directory.
    #[arg(value_name = "MAIN_EXE")]
    main_exe: String,
}

impl UpdateCommand {
    /// Executable that is disabled and relaunched.
    pub fn main_exe(&self) -> &str {
        &self.main_exe
    }

    pub(super) fn execute(self, ctx: &RunContext) -> Result<()> {
        let mut orchestrator =
            UpdateOrchestrator::new(&ctx.layout, ProcessLauncher, ctx.config.disable_timeout())
                .with_handle_release_delay(ctx.config.handle_release_delay());

        orchestrator.run(&self.main_exe).map(|_| ()).inspect_err(|e| {
            error!("{}", failure_summary(orchestrator.state(), e));
        })
    }
}

fn failure_summary(state: UpdateState, error: &anyhow::Error) -> String {
    let untouched = error
        .chain()
        .find_map(|e| e.downcast_ref::<UpdateError>())
        .is_some_and(UpdateError::installation_untouched);
    let installation = if untouched {
        "installation untouched"
    } else {
        "installation may be partially updated"
    };
    format!("Update failed in state {state} ({installation}): {error:#}")
}
