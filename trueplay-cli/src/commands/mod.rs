//! CLI command implementations.

pub mod init;
pub mod run;
pub mod templates;

pub use init::init_project;
pub use run::{run_script, ScriptSource};
pub use templates::{list_templates, show_template};
