use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Diet and allergen tags carried by an ingredient record. A tag marks the
/// presence of something a constraint may exclude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DietTag {
    Dairy,
    Gluten,
    Nuts,
    Meat,
    Fish,
    Egg,
    Honey,
}

pub type TagSet = BTreeSet<DietTag>;

impl DietTag {
    pub const ALL: [DietTag; 7] = [
        DietTag::Dairy,
        DietTag::Gluten,
        DietTag::Nuts,
        DietTag::Meat,
        DietTag::Fish,
        DietTag::Egg,
        DietTag::Honey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DietTag::Dairy => "dairy",
            DietTag::Gluten => "gluten",
            DietTag::Nuts => "nuts",
            DietTag::Meat => "meat",
            DietTag::Fish => "fish",
            DietTag::Egg => "egg",
            DietTag::Honey => "honey",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            DietTag::Dairy => &["milk", "buttermilk", "cheese", "butter", "cream", "yogurt", "yoghurt", "whey", "ghee", "parmesan", "mozzarella"],
            DietTag::Gluten => &["wheat", "bread", "breadcrumb", "flour", "pasta", "cereal", "barley", "rye", "semolina", "couscous", "noodle"],
            DietTag::Nuts => &["nut", "almond", "peanut", "walnut", "pecan", "cashew", "pistachio", "hazelnut"],
            DietTag::Meat => &["beef", "pork", "chicken", "meat", "meatball", "turkey", "lamb", "bacon", "ham", "sausage", "veal", "duck"],
            DietTag::Fish => &["fish", "salmon", "tuna", "cod", "shrimp", "anchovy", "sardine", "crab", "prawn", "shellfish"],
            DietTag::Egg => &["egg"],
            DietTag::Honey => &["honey"],
        }
    }
}

impl fmt::Display for DietTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DietTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        DietTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == key)
            .ok_or_else(|| format!("unknown diet tag '{}'", s.trim()))
    }
}

// Plant-based products whose names contain an animal keyword.
const PLANT_BASED_MARKERS: &[&str] = &[
    "coconut milk",
    "almond milk",
    "soy milk",
    "oat milk",
    "rice milk",
    "coconut cream",
    "coconut yogurt",
    "oat cream",
    "soy cream",
    "soy yogurt",
    "coconut",
    "peanut butter",
    "cocoa butter",
    "cream of tartar",
    "nutmeg",
    "butternut",
    "eggplant",
    "veggie",
];

/// Whole-word keyword match, allowing a plural `s`/`es` suffix.
fn mentions(words: &[&str], keyword: &str) -> bool {
    words.iter().any(|word| {
        word.strip_prefix(keyword)
            .is_some_and(|rest| matches!(rest, "" | "s" | "es"))
    })
}

/// Derives tags from an ingredient name with keyword heuristics, for tables
/// that were built without explicit tags.
pub fn derive_tags(name: &str) -> TagSet {
    let mut masked = name.to_lowercase();
    for marker in PLANT_BASED_MARKERS {
        if masked.contains(marker) {
            // Keep the plant half of the marker visible to the other tags.
            let keep: String = match *marker {
                "almond milk" => "almond".into(),
                "peanut butter" => "peanut".into(),
                _ => String::new(),
            };
            masked = masked.replace(marker, &keep);
        }
    }

    let words = super::words(&masked);
    DietTag::ALL
        .iter()
        .copied()
        .filter(|tag| tag.keywords().iter().any(|kw| mentions(&words, kw)))
        .collect()
}

/// Parses a `|`- or `;`-separated tag cell. Unknown tag names are returned
/// separately so the loader can report them.
pub fn parse_tag_cell(cell: &str) -> (TagSet, Vec<String>) {
    let mut tags = TagSet::new();
    let mut unknown = Vec::new();
    for part in cell.split(['|', ';']).map(str::trim).filter(|p| !p.is_empty()) {
        match part.parse::<DietTag>() {
            Ok(tag) => {
                tags.insert(tag);
            }
            Err(_) => unknown.push(part.to_string()),
        }
    }
    (tags, unknown)
}
