use console::{StyledObject, style};

use crate::types::Severity;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    pub fn field(&self, label: &str, value: &str) {
        println!("  {:<12} {}", style(label).dim(), value);
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-width colored severity tag
pub fn severity_label(severity: Severity) -> StyledObject<String> {
    let text = format!("{:<8}", severity.as_str());
    match severity {
        Severity::Critical => style(text).red().bold(),
        Severity::High => style(text).red(),
        Severity::Medium => style(text).yellow(),
        Severity::Low => style(text).dim(),
    }
}
