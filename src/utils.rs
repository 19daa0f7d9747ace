//! Console helpers shared by the binary and the printers.

use owo_colors::OwoColorize;

/// Whether stderr/stdout decoration is allowed.
pub fn colors_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

fn prefix(label: &str, paint: fn(&str) -> String) -> String {
    if colors_enabled() {
        paint(label)
    } else {
        label.to_string()
    }
}

pub fn error_prefix() -> String {
    prefix("error:", |s| s.red().bold().to_string())
}

pub fn note_prefix() -> String {
    prefix("note:", |s| s.cyan().bold().to_string())
}

pub fn success_prefix() -> String {
    prefix("ok:", |s| s.green().bold().to_string())
}
