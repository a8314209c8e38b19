//! Physical media format derived from an item title

use std::fmt;

/// Media format of a catalog item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    UhdBluray,
    Bluray,
    Dvd,
}

impl FormatTag {
    /// Classifies a title
    ///
    /// 4K mentions win over plain Blu-ray; anything unrecognised is a DVD.
    pub fn from_title(title: &str) -> Self {
        let lower = title.to_lowercase();

        if lower.contains("4k") || lower.contains("uhd") || lower.contains("ultra hd") {
            return Self::UhdBluray;
        }

        let bd_word = lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word == "bd");

        if lower.contains("blu-ray") || lower.contains("bluray") || bd_word {
            Self::Bluray
        } else {
            Self::Dvd
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UhdBluray => "4K Blu-ray",
            Self::Bluray => "Blu-ray",
            Self::Dvd => "DVD",
        }
    }

    /// Parses the stored label, also accepting short CLI spellings
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "4k blu-ray" | "4k" | "uhd" => Some(Self::UhdBluray),
            "blu-ray" | "bluray" | "bd" => Some(Self::Bluray),
            "dvd" => Some(Self::Dvd),
            _ => None,
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
