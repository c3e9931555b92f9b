//! Fixed format FLUKA input cards

// internal modules
use crate::utils::*;

// external crates
use itertools::Itertools;

/// Number of WHAT fields on a card
const N_WHATS: usize = 6;

/// A single fixed format input card
///
/// Every field is [FIELD_WIDTH] characters: the keyword, six WHATs, and the
/// SDUM. Keywords and SDUM are left aligned, WHATs are right aligned. Blank
/// WHATs are left empty for FLUKA to use its defaults.
///
/// WHATs are normally numbers, but name-based input also allows material,
/// region, and transform names in place of indices.
///
/// ```rust
/// # use flubl::fluka::Card;
/// let card = Card::new("START").what(1, 10.0);
/// assert_eq!(card.to_string(), "START           10.0");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    keyword: String,
    whats: [Option<String>; N_WHATS],
    sdum: Option<String>,
}

impl Card {
    pub fn new(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            whats: Default::default(),
            sdum: None,
        }
    }

    /// Set WHAT(`index`) to a number, indexed from 1 as in the manual
    pub fn what(self, index: usize, value: f64) -> Self {
        self.field(index, fluka_number(value))
    }

    /// Set WHAT(`index`) to a name
    pub fn what_name(self, index: usize, name: &str) -> Self {
        self.field(index, name.to_string())
    }

    /// Set consecutive WHATs from WHAT(1)
    pub fn whats(mut self, values: &[f64]) -> Self {
        for (i, value) in values.iter().enumerate().take(N_WHATS) {
            self = self.what(i + 1, *value);
        }
        self
    }

    pub fn sdum(mut self, sdum: &str) -> Self {
        self.sdum = Some(sdum.to_string());
        self
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    fn field(mut self, index: usize, value: String) -> Self {
        match index {
            1..=N_WHATS => self.whats[index - 1] = Some(value),
            _ => log::warn!("Ignored WHAT({index}) on {} card", self.keyword),
        }
        self
    }
}

impl std::fmt::Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let whats = self
            .whats
            .iter()
            .map(|w| f!("{:>1$}", w.as_deref().unwrap_or(""), FIELD_WIDTH))
            .join("");

        let line = f!(
            "{:<w$}{}{:<w$}",
            self.keyword,
            whats,
            self.sdum.as_deref().unwrap_or(""),
            w = FIELD_WIDTH
        );
        write!(f, "{}", line.trim_end())
    }
}

/// A comment line, starting with `*`
pub fn comment(text: &str) -> String {
    f!("* {text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns() {
        let card = Card::new("BEAM")
            .what(1, -1.0)
            .what(2, 0.01)
            .sdum("ELECTRON");
        let line = card.to_string();

        assert_eq!(line.len(), 7 * FIELD_WIDTH + "ELECTRON".len());
        assert_eq!(&line[0..10], "BEAM      ");
        assert_eq!(&line[10..20], "      -1.0");
        assert_eq!(&line[20..30], "      0.01");
        assert_eq!(&line[30..70], " ".repeat(40));
        assert_eq!(&line[70..], "ELECTRON");
    }

    #[test]
    fn test_names_and_blanks() {
        let card = Card::new("ASSIGNMA")
            .what_name(1, "IRON")
            .what_name(2, "R0000001");
        assert_eq!(card.to_string(), "ASSIGNMA        IRON  R0000001");
    }

    #[test]
    fn test_whats_stops_at_six() {
        let card = Card::new("X").whats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(card.to_string().len(), 7 * FIELD_WIDTH);
        assert!(card.to_string().ends_with("6.0"));
    }

    #[test]
    fn test_comment() {
        assert_eq!(comment("bodies"), "* bodies");
    }
}
