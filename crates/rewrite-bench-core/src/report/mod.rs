pub mod console;

pub use console::{print_query, print_run_summary, render_stats_json, render_stats_text};
