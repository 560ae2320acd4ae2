// src/utils/log.rs

//! Run-level log formatting on top of the `log` facade.
//!
//! Modules that import this as `log` call these helpers; everything else uses
//! the facade macros directly. Level filtering and output targets are set up by
//! the binary's logger.

/// Log a debug message
pub fn debug(message: &str) {
    ::log::debug!("{message}");
}

/// Log an info message
pub fn info(message: &str) {
    ::log::info!("{message}");
}

/// Log a warning message
pub fn warn(message: &str) {
    ::log::warn!("{message}");
}

/// Log an error message
pub fn error(message: &str) {
    ::log::error!("{message}");
}

/// Log a success message (always shown as INFO)
pub fn success(message: &str) {
    ::log::info!("{message}");
}

/// Log a step in a process
pub fn step(step_num: usize, total: usize, message: &str) {
    ::log::info!("[STEP {step_num}/{total}] {message}");
}

/// Log a separator line
pub fn separator() {
    ::log::info!("{}", "─".repeat(60));
}

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    ::log::info!("{border}");
    ::log::info!("  {title}");
    ::log::info!("{border}");
}

/// Log a sub-item (indented)
pub fn sub_item(message: &str) {
    ::log::info!("    {message}");
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    ::log::info!("[SUMMARY] {title}");
    for (key, value) in items {
        ::log::info!("    {key}: {value}");
    }
}
