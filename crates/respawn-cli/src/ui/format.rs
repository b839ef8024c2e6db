//! Formatting utilities for durations, generation names and route tables.

use console::Term;
use owo_colors::OwoColorize;
use respawn::proxy::ProxyRoute;
use std::time::Duration;

/// Length of the generation name prefix shown to users.
const SHORT_NAME_LEN: usize = 8;

/// Format duration in human-readable format.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use respawn_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Abbreviate a generation name for status lines.
pub fn short_name(name: &str) -> &str {
    name.get(..SHORT_NAME_LEN).unwrap_or(name)
}

/// Print a discovered route table to stdout.
pub fn print_route_table(routes: &[ProxyRoute]) {
    let width = (Term::stdout().size().1 as usize).min(80);
    let method_width = routes.iter().map(|r| r.method.len()).max().unwrap_or(0);

    println!("{}", "Routes".bold().underline());
    println!("{}", "─".repeat(width));
    for route in routes {
        println!(
            "  {} {:<method_width$} {}",
            "▸".blue(),
            route.method.bright_white().bold(),
            route.path
        );
    }
    println!("{}", "─".repeat(width));
    println!("  {} {}", "Total:".bold(), routes.len().green());
}
