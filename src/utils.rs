//! Colored message prefixes for CLI diagnostics on stderr.

use owo_colors::OwoColorize;

fn use_colors() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

fn prefix(text: &str, paint: impl Fn(&str) -> String) -> String {
    if use_colors() {
        paint(text)
    } else {
        text.to_string()
    }
}

pub fn error_prefix() -> String {
    prefix("error:", |s| s.red().bold().to_string())
}

pub fn note_prefix() -> String {
    prefix("note:", |s| s.bright_black().to_string())
}
