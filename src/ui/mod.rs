//! Terminal front ends: the live log viewer and the create wizard.
pub mod viewer;
pub mod wizard;

pub use viewer::LogViewer;
pub use wizard::{WizardOutcome, WizardPrompt};
