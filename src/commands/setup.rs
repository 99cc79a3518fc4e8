use crate::commands::Out;
use crate::export::{APPS_SCRIPT, SETUP_STEPS};
use serde::Serialize;

/// The receiver script and how to deploy it.
#[derive(Debug, Clone, Serialize)]
pub struct Setup {
    steps: &'static str,
    script: &'static str,
}

/// Prints the Apps Script receiver and the deployment steps.
pub fn setup() -> Out<Setup> {
    Out::new(
        format!("{SETUP_STEPS}\n\n{APPS_SCRIPT}"),
        Setup {
            steps: SETUP_STEPS,
            script: APPS_SCRIPT,
        },
    )
}
