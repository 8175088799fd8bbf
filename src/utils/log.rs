// src/utils/log.rs

//! Formatting helpers for operator-facing log output.
//!
//! Everything goes through the `log` facade; the binary decides where it
//! ends up.

const RULE_WIDTH: usize = 60;

/// Log a separator line
pub fn separator() {
    log::info!("{}", "─".repeat(RULE_WIDTH));
}

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(RULE_WIDTH);
    log::info!("{}", border);
    log::info!("  {}", title);
    log::info!("{}", border);
}

/// Log a step in a process
pub fn step(step_num: usize, total: usize, message: &str) {
    log::info!("[STEP {}/{}] {}", step_num, total, message);
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("[SUMMARY] {}", title);
    for (key, value) in items {
        log::info!("    {}: {}", key, value);
    }
}

/// Log a block of captured text under a titled rule.
pub fn block(title: &str, body: &str, empty_note: &str) {
    log::info!("--- {} ---", title);
    if body.trim().is_empty() {
        log::info!("{}", empty_note);
    } else {
        for line in body.lines() {
            log::info!("{}", line);
        }
    }
}

/// Format a duration in seconds with two decimals.
pub fn seconds(duration: std::time::Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}
