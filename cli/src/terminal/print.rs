use std::fmt::Display;

use colored::*;
use tracing::info;

use crate::terminal::logging::PRINT_TARGET;

pub const TOTAL_WIDTH: usize = 64;
const KEY_WIDTH: usize = 10;

pub fn print(msg: &str) {
    info!(target: PRINT_TARGET, raw_msg = msg);
}

pub fn banner() {
    let text = format!("⟦ SLEEP-PROXY v{} ⟧", env!("CARGO_PKG_VERSION"));
    let sep = "═"
        .repeat(TOTAL_WIDTH.saturating_sub(text.chars().count()) / 2)
        .bright_black();
    print(&format!("{}{}{}", sep, text.bright_green().bold(), sep));
}

pub fn header(msg: &str) {
    let formatted = format!("⟦ {} ⟧", msg);
    let dash_count = TOTAL_WIDTH.saturating_sub(formatted.chars().count());
    let left = dash_count / 2;
    let right = dash_count - left;

    let line = format!(
        "{}{}{}",
        "─".repeat(left).bright_black(),
        formatted.to_uppercase().bright_green(),
        "─".repeat(right).bright_black()
    );
    print(&line);
}

/// `key.....: value`
pub fn aligned_line<V: Display>(key: &str, value: V) {
    let dots = ".".repeat((KEY_WIDTH + 1).saturating_sub(key.len()));
    print(&format!(
        "{} {}{}{} {}",
        ">".bright_black(),
        key.bright_blue(),
        dots.bright_black(),
        ":".bright_black(),
        value
    ));
}

pub fn end_of_program() {
    print(&"═".repeat(TOTAL_WIDTH).bright_black().to_string());
}
