//! Terminal UI utilities for status lines and formatted output.
//!
//! # Examples
//!
//! ```no_run
//! use respawn_cli::ui;
//!
//! ui::init_colors(false);
//! ui::info("Starting generation 1a2b3c4d");
//! ui::error("Generation 1a2b3c4d failed");
//! ```

mod format;
mod messages;

pub use format::{format_duration, print_route_table, short_name};
pub use messages::{error, info, success, warning};

/// Check if color output should be enabled.
///
/// Respects NO_COLOR and FORCE_COLOR environment variables, falls back to
/// terminal capability detection.
pub fn should_use_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    console::user_attended_stderr()
}

/// Initialize color support based on environment.
///
/// Sets `console`'s global color switches for stdout and stderr.
pub fn init_colors(no_color: bool) {
    let enabled = !no_color && should_use_color();
    console::set_colors_enabled(enabled);
    console::set_colors_enabled_stderr(enabled);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_no_color_disables_color() {
        unsafe {
            std::env::set_var("NO_COLOR", "1");
        }
        assert!(!should_use_color());
        unsafe {
            std::env::remove_var("NO_COLOR");
        }
    }

    #[test]
    #[serial]
    fn test_force_color_enables_color() {
        unsafe {
            std::env::remove_var("NO_COLOR");
            std::env::set_var("FORCE_COLOR", "1");
        }
        assert!(should_use_color());
        unsafe {
            std::env::remove_var("FORCE_COLOR");
        }
    }
}
