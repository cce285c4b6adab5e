/// Width of the bar used by the CLI.
pub const DEFAULT_BAR_WIDTH: usize = 50;

/// Fixed-width text bar: `[====      ] 40.0% (4/10)`.
#[derive(Debug, Clone)]
pub struct ProgressBar {
    width: usize,
    begin: char,
    end: char,
    fill: char,
    empty: char,
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self::new(DEFAULT_BAR_WIDTH)
    }
}

impl ProgressBar {
    #[must_use]
    pub const fn new(width: usize) -> Self {
        Self {
            width,
            begin: '[',
            end: ']',
            fill: '=',
            empty: ' ',
        }
    }

    /// Renders the whole line as plain text.
    #[must_use]
    pub fn render(&self, completed: u64, total: u64) -> String {
        let (bar, stats) = self.render_parts(completed, total);
        format!("{}{}", bar, stats)
    }

    /// Splits the line into the bar itself and the ` 40.0% (4/10)` tail so the
    /// relay can color them separately.
    #[must_use]
    pub fn render_parts(&self, completed: u64, total: u64) -> (String, String) {
        let total = total.max(1);
        let shown = completed.min(total);

        let width_u128 = u128::from(u64::try_from(self.width).unwrap_or(u64::MAX));
        let filled = u128::from(shown)
            .saturating_mul(width_u128)
            .checked_div(u128::from(total))
            .unwrap_or(0);
        let filled = usize::try_from(filled).unwrap_or(self.width).min(self.width);

        let mut bar = String::with_capacity(self.width.saturating_add(2));
        bar.push(self.begin);
        bar.extend(std::iter::repeat_n(self.fill, filled));
        bar.extend(std::iter::repeat_n(
            self.empty,
            self.width.saturating_sub(filled),
        ));
        bar.push(self.end);

        // Tenths of a percent, rounded half up.
        let total_x2 = u128::from(total).saturating_mul(2);
        let percent_x10 = u128::from(shown)
            .saturating_mul(2000)
            .saturating_add(u128::from(total))
            .checked_div(total_x2)
            .unwrap_or(0);
        let whole = percent_x10.checked_div(10).unwrap_or(0);
        let tenths = percent_x10.checked_rem(10).unwrap_or(0);

        (
            bar,
            format!(" {}.{}% ({}/{})", whole, tenths, completed, total),
        )
    }
}
