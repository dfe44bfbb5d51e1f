//! Stylesheet for progress lines.

use owo_colors::Style;

/// One style per kind of line. `Default` leaves everything uncolored.
#[derive(Default, Clone)]
pub struct Styles {
    pub ok: Style,
    pub warn: Style,
    pub step: Style,
    /// Elapsed-time prefix.
    pub clock: Style,
    pub title: Style,
}

impl Styles {
    #[must_use]
    pub fn colored() -> Self {
        Self {
            ok: Style::new().green(),
            warn: Style::new().yellow(),
            step: Style::new().cyan(),
            clock: Style::new().dimmed(),
            title: Style::new().bold().underline(),
        }
    }
}
