//! Output styles using owo-colors stylesheet pattern

use owo_colors::Style;

/// Stylesheet for CLI output colors. Plain until [`Styles::colorize`].
#[derive(Default, Clone)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    /// In-progress steps.
    pub step: Style,
    /// System names in summaries.
    pub system: Style,
}

impl Styles {
    pub fn colorize(&mut self) {
        self.success = Style::new().green();
        self.warning = Style::new().yellow();
        self.error = Style::new().red();
        self.step = Style::new().cyan();
        self.system = Style::new().bold();
    }
}
