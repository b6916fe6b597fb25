//! Command implementations for the CLI.

mod config;
mod experience;
mod settings;
mod spot;
mod user;

pub use config::cmd_config;
pub use experience::cmd_experience;
pub use settings::cmd_settings;
pub use spot::cmd_spot;
pub use user::cmd_user;

/// Print rendered output, adding a trailing newline when missing.
pub(crate) fn print_output(output: &str) {
    if output.ends_with('\n') {
        print!("{output}");
    } else {
        println!("{output}");
    }
}
