pub mod cli;
pub mod commands;
pub mod error;
pub mod state;

pub use cli::{Cli, Commands};
pub use state::AppState;

/// Log filter used when `RUST_LOG` is unset
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "tripmate=debug,tripmate_cli=debug,tripmate_chat=debug,tripmate_itinerary=debug,tripmate_store=debug"
    } else {
        "tripmate=info,tripmate_cli=info,tripmate_chat=info,tripmate_itinerary=warn,tripmate_store=warn"
    }
}
