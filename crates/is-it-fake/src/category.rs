use core::fmt;
use std::str::FromStr;

/// The two possible outcomes for a review.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub enum Category {
    /// Written by a person ("OR" in the source datasets).
    Authentic,
    /// Machine or fraudulently generated ("CG" in the source datasets).
    Generated,
}

/// Every raw label spelling seen across dataset versions, lowercase.
///
/// Training decodes dataset labels through this table and serving decodes
/// classifier output through [`Category::from_index`]; nothing else compares
/// label strings.
const LABEL_TABLE: &[(&str, Category)] = &[
    ("or", Category::Authentic),
    ("0", Category::Authentic),
    ("0.0", Category::Authentic),
    ("original", Category::Authentic),
    ("original review", Category::Authentic),
    ("authentic", Category::Authentic),
    ("genuine", Category::Authentic),
    ("genuine review", Category::Authentic),
    ("real", Category::Authentic),
    ("human", Category::Authentic),
    ("cg", Category::Generated),
    ("1", Category::Generated),
    ("1.0", Category::Generated),
    ("generated", Category::Generated),
    ("computer generated", Category::Generated),
    ("computer generated (fake) review", Category::Generated),
    ("fake", Category::Generated),
    ("fake review", Category::Generated),
    ("ai", Category::Generated),
    ("machine", Category::Generated),
];

impl Category {
    /// Class order used by the classifier: index 0 is authentic, 1 generated.
    pub const ALL: [Self; 2] = [Self::Authentic, Self::Generated];

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Authentic => 0,
            Self::Generated => 1,
        }
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Decodes a raw dataset label (`"OR"`, `"CG"`, `0`, `1`, `"fake"`, ...).
    #[must_use]
    pub fn decode(raw: &str) -> Option<Self> {
        let needle = raw.trim().to_ascii_lowercase();
        LABEL_TABLE
            .iter()
            .find(|(spelling, _)| *spelling == needle)
            .map(|&(_, category)| category)
    }

    /// Presentation label handed to the web layer.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Authentic => "Original Review",
            Self::Generated => "Computer Generated (Fake) Review",
        }
    }

    #[must_use]
    pub fn is_authentic(&self) -> bool {
        matches!(self, Self::Authentic)
    }

    #[must_use]
    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Generated)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentic => write!(f, "Authentic"),
            Self::Generated => write!(f, "Generated"),
        }
    }
}

impl From<Category> for i64 {
    fn from(category: Category) -> Self {
        category.index() as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised review label {0:?}")]
pub struct UnknownLabel(pub String);

impl FromStr for Category {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s).ok_or_else(|| UnknownLabel(s.to_owned()))
    }
}
