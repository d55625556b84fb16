//! UI utilities for the client.

use std::io::Write;

/// Redisplay the prompt after printing asynchronous output
pub fn redisplay_prompt(user_id: &str) {
    print!("{}> ", user_id);
    std::io::stdout().flush().ok();
}

/// Overwrite the current terminal line with a progress bar.
pub fn print_progress(label: &str, percent: u8) {
    print!("\r{}", crate::formatter::MessageFormatter::format_progress(label, percent));
    if percent >= crate::progress::PROGRESS_DONE {
        println!();
    }
    std::io::stdout().flush().ok();
}
