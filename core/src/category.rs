//! Keyword-driven grocery category classifier.
//!
//! Rules are evaluated in the order of [`CATEGORY_RULES`] and the first match
//! wins, so a line that mentions both a meat keyword and a spice keyword is
//! filed under whichever category is listed first.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::{Result, bail};
use regex::Regex;
use serde::Serialize;

/// Variants are declared in rule order, so `Ord` sorts a list the way the
/// classifier checks it, with `Other` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Category {
    Produce,
    #[serde(rename = "Meat & Seafood")]
    MeatAndSeafood,
    #[serde(rename = "Dairy & Eggs")]
    DairyAndEggs,
    Bakery,
    Pantry,
    Frozen,
    Spices,
    Condiments,
    Beverages,
    Other,
}

impl Category {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Produce => "Produce",
            Category::MeatAndSeafood => "Meat & Seafood",
            Category::DairyAndEggs => "Dairy & Eggs",
            Category::Bakery => "Bakery",
            Category::Pantry => "Pantry",
            Category::Frozen => "Frozen",
            Category::Spices => "Spices",
            Category::Condiments => "Condiments",
            Category::Beverages => "Beverages",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    /// Parses the display label stored on shopping-list rows.
    fn from_str(s: &str) -> Result<Self> {
        let label = s.trim();
        match label.to_lowercase().as_str() {
            "produce" => Ok(Category::Produce),
            "meat & seafood" => Ok(Category::MeatAndSeafood),
            "dairy & eggs" => Ok(Category::DairyAndEggs),
            "bakery" => Ok(Category::Bakery),
            "pantry" => Ok(Category::Pantry),
            "frozen" => Ok(Category::Frozen),
            "spices" => Ok(Category::Spices),
            "condiments" => Ok(Category::Condiments),
            "beverages" => Ok(Category::Beverages),
            "other" => Ok(Category::Other),
            _ => bail!("Unknown category '{label}'"),
        }
    }
}

/// How a rule's keywords are matched against the lowercased text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordMatch {
    /// Keyword may appear anywhere, including inside a longer word.
    Substring,
    /// Keyword must be a whole word ("tea" does not match "teaspoon").
    WholeWord,
}

/// One `(predicate, category)` pair of the ordered rule list.
pub struct CategoryRule {
    pub category: Category,
    pub keywords: &'static [&'static str],
    pub matching: KeywordMatch,
    pattern: Regex,
}

impl CategoryRule {
    fn new(category: Category, keywords: &'static [&'static str], matching: KeywordMatch) -> Self {
        let alternation = keywords
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let source = match matching {
            KeywordMatch::Substring => format!("(?:{alternation})"),
            KeywordMatch::WholeWord => format!(r"\b(?:{alternation})\b"),
        };
        let pattern = Regex::new(&source).expect("category keyword pattern should be valid");
        Self {
            category,
            keywords,
            matching,
            pattern,
        }
    }

    /// `text` must already be lowercased.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

const PRODUCE: &[&str] = &[
    "lettuce", "tomato", "onion", "garlic", "pepper", "carrot", "celery", "potato", "spinach",
    "kale", "broccoli", "cauliflower", "cucumber", "zucchini", "squash", "mushroom", "apple",
    "banana", "orange", "lemon", "lime", "berry", "fruit", "vegetable", "herb", "basil",
    "cilantro", "parsley", "mint", "avocado",
];

const MEAT_AND_SEAFOOD: &[&str] = &[
    "chicken", "beef", "pork", "lamb", "turkey", "fish", "salmon", "shrimp", "bacon", "sausage",
    "steak", "ground", "meat", "seafood", "tuna", "cod", "tilapia",
];

const DAIRY_AND_EGGS: &[&str] = &[
    "milk",
    "cheese",
    "butter",
    "cream",
    "yogurt",
    "egg",
    "sour cream",
    "cottage",
    "ricotta",
    "mozzarella",
    "cheddar",
    "parmesan",
];

const BAKERY: &[&str] = &[
    "bread",
    "roll",
    "bun",
    "bagel",
    "tortilla",
    "pita",
    "croissant",
    "muffin",
    "baguette",
];

const PANTRY: &[&str] = &[
    "flour", "sugar", "rice", "pasta", "noodle", "oil", "vinegar", "sauce", "broth", "stock",
    "can", "bean", "lentil", "chickpea", "oat", "cereal", "honey", "maple", "soy sauce",
    "sriracha",
];

const FROZEN: &[&str] = &["frozen", "ice cream"];

const SPICES: &[&str] = &[
    "salt",
    "pepper",
    "cumin",
    "paprika",
    "oregano",
    "thyme",
    "rosemary",
    "cinnamon",
    "nutmeg",
    "ginger",
    "turmeric",
    "chili",
    "cayenne",
    "spice",
    "seasoning",
    "fennel",
    "cardamom",
    "coriander",
    "clove",
    "allspice",
    "anise",
    "caraway",
    "dill",
    "mustard seed",
];

const CONDIMENTS: &[&str] = &[
    "ketchup",
    "mustard",
    "mayo",
    "mayonnaise",
    "relish",
    "hot sauce",
    "bbq",
    "dressing",
    "salsa",
];

const BEVERAGES: &[&str] = &["juice", "soda", "water", "coffee", "tea", "wine", "beer"];

/// Ordered rule list. Evaluation order is significant.
pub static CATEGORY_RULES: LazyLock<Vec<CategoryRule>> = LazyLock::new(|| {
    vec![
        CategoryRule::new(Category::Produce, PRODUCE, KeywordMatch::Substring),
        CategoryRule::new(
            Category::MeatAndSeafood,
            MEAT_AND_SEAFOOD,
            KeywordMatch::Substring,
        ),
        CategoryRule::new(Category::DairyAndEggs, DAIRY_AND_EGGS, KeywordMatch::Substring),
        CategoryRule::new(Category::Bakery, BAKERY, KeywordMatch::Substring),
        CategoryRule::new(Category::Pantry, PANTRY, KeywordMatch::Substring),
        CategoryRule::new(Category::Frozen, FROZEN, KeywordMatch::Substring),
        CategoryRule::new(Category::Spices, SPICES, KeywordMatch::Substring),
        CategoryRule::new(Category::Condiments, CONDIMENTS, KeywordMatch::Substring),
        CategoryRule::new(Category::Beverages, BEVERAGES, KeywordMatch::WholeWord),
    ]
});

/// Classify free text into a grocery category. Case-insensitive; falls back
/// to [`Category::Other`].
#[must_use]
pub fn classify(text: &str) -> Category {
    let lower = text.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|rule| rule.matches(&lower))
        .map_or(Category::Other, |rule| rule.category)
}
