use serde::{Deserialize, Serialize};

/// The closed set of expense categories the model is asked to choose from.
///
/// A `ReceiptRecord` keeps the category exactly as the model (or the user) wrote it. Any label that
/// is not one of these names is shown, and exported, as `Other`.
#[derive(
    Default, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub enum Category {
    Dining,
    Groceries,
    Travel,
    Shopping,
    Utilities,
    Health,
    Entertainment,
    Services,
    #[default]
    Other,
}

serde_plain::derive_display_from_serialize!(Category);
serde_plain::derive_fromstr_from_deserialize!(Category);

impl Category {
    /// Every category, in the order they are offered to the model and the user.
    pub const ALL: [Category; 9] = [
        Category::Dining,
        Category::Groceries,
        Category::Travel,
        Category::Shopping,
        Category::Utilities,
        Category::Health,
        Category::Entertainment,
        Category::Services,
        Category::Other,
    ];

    /// Maps a free-form label onto the enumeration. The match is exact (the names are what the
    /// model is instructed to return); anything else becomes `Other`.
    pub fn from_label(label: impl AsRef<str>) -> Category {
        label.as_ref().trim().parse().unwrap_or_default()
    }

    /// Returns true when `label` names one of the categories exactly.
    pub fn is_known(label: impl AsRef<str>) -> bool {
        label.as_ref().trim().parse::<Category>().is_ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Dining => "Dining",
            Category::Groceries => "Groceries",
            Category::Travel => "Travel",
            Category::Shopping => "Shopping",
            Category::Utilities => "Utilities",
            Category::Health => "Health",
            Category::Entertainment => "Entertainment",
            Category::Services => "Services",
            Category::Other => "Other",
        }
    }

    /// The category names joined for use in prompts, e.g. `Dining, Groceries, ... or Other`.
    pub fn prompt_list() -> String {
        let names: Vec<&str> = Category::ALL[..Category::ALL.len() - 1]
            .iter()
            .map(|c| c.as_str())
            .collect();
        format!("{}, or {}", names.join(", "), Category::Other.as_str())
    }
}
