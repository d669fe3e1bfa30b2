//! Product catalog used for one-time event enrichment.
//!
//! Maps a free-form product name to a category, emoji, and display color.
//! Matching is substring-based and case-insensitive, with the longest
//! (most specific) catalog key winning; names that match nothing fall back
//! to the default entry.
//!
//! The table is intentionally static: enrichment must be reproducible for
//! the lifetime of the stored event log, so entries are only ever added,
//! never changed.

/// Category, emoji, and display color attached to an event at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Product category slug (e.g. `"beverages"`).
    pub category: &'static str,
    /// Emoji shown in the feed and charts.
    pub emoji: &'static str,
    /// Hex display color for chart slices.
    pub color: &'static str,
}

/// Fallback entry for products that match no catalog key.
pub const DEFAULT_ENTRY: CatalogEntry = CatalogEntry {
    category: "other",
    emoji: "🛒",
    color: "#95a5a6",
};

/// Catalog keys are lowercase; lookup lowercases the product name before
/// substring matching. Order is irrelevant: the longest matching key wins.
const CATALOG: &[(&str, CatalogEntry)] = &[
    // Beverages
    ("sparkling water", CatalogEntry { category: "beverages", emoji: "🫧", color: "#5dade2" }),
    ("diet cola", CatalogEntry { category: "beverages", emoji: "🥤", color: "#c0392b" }),
    ("cola", CatalogEntry { category: "beverages", emoji: "🥤", color: "#e74c3c" }),
    ("water", CatalogEntry { category: "beverages", emoji: "💧", color: "#3498db" }),
    ("juice", CatalogEntry { category: "beverages", emoji: "🧃", color: "#e67e22" }),
    ("lemonade", CatalogEntry { category: "beverages", emoji: "🍋", color: "#f4d03f" }),
    ("coffee", CatalogEntry { category: "beverages", emoji: "☕", color: "#6f4e37" }),
    ("tea", CatalogEntry { category: "beverages", emoji: "🍵", color: "#27ae60" }),
    ("energy drink", CatalogEntry { category: "beverages", emoji: "⚡", color: "#f1c40f" }),
    ("soda", CatalogEntry { category: "beverages", emoji: "🥤", color: "#9b59b6" }),
    // Snacks
    ("chips", CatalogEntry { category: "snacks", emoji: "🍟", color: "#f39c12" }),
    ("crisps", CatalogEntry { category: "snacks", emoji: "🍟", color: "#f39c12" }),
    ("pretzel", CatalogEntry { category: "snacks", emoji: "🥨", color: "#d35400" }),
    ("popcorn", CatalogEntry { category: "snacks", emoji: "🍿", color: "#f5b041" }),
    ("nuts", CatalogEntry { category: "snacks", emoji: "🥜", color: "#a04000" }),
    ("trail mix", CatalogEntry { category: "snacks", emoji: "🥜", color: "#af601a" }),
    ("cracker", CatalogEntry { category: "snacks", emoji: "🍘", color: "#d68910" }),
    ("cookie", CatalogEntry { category: "snacks", emoji: "🍪", color: "#935116" }),
    ("granola", CatalogEntry { category: "snacks", emoji: "🌾", color: "#7d6608" }),
    // Candy
    ("chocolate", CatalogEntry { category: "candy", emoji: "🍫", color: "#7b3f00" }),
    ("candy", CatalogEntry { category: "candy", emoji: "🍬", color: "#ff6b81" }),
    ("gummy", CatalogEntry { category: "candy", emoji: "🍬", color: "#fd79a8" }),
    ("gum", CatalogEntry { category: "candy", emoji: "🍬", color: "#e84393" }),
    ("mint", CatalogEntry { category: "candy", emoji: "🌿", color: "#55efc4" }),
    // Food
    ("sandwich", CatalogEntry { category: "food", emoji: "🥪", color: "#16a085" }),
    ("wrap", CatalogEntry { category: "food", emoji: "🌯", color: "#1abc9c" }),
    ("noodle", CatalogEntry { category: "food", emoji: "🍜", color: "#e59866" }),
    ("soup", CatalogEntry { category: "food", emoji: "🥣", color: "#ca6f1e" }),
    ("pastry", CatalogEntry { category: "food", emoji: "🥐", color: "#f8c471" }),
    ("muffin", CatalogEntry { category: "food", emoji: "🧁", color: "#dc7633" }),
];

/// Look up the catalog entry for a product name.
///
/// The name is lowercased and every catalog key tested for containment;
/// among the keys that match, the longest wins. Returns [`DEFAULT_ENTRY`]
/// when nothing matches.
///
/// # Examples
///
/// ```
/// use vendwatch_core::catalog::lookup;
///
/// assert_eq!(lookup("Cola Classic").category, "beverages");
/// assert_eq!(lookup("Diet Cola").emoji, "🥤");
/// assert_eq!(lookup("Mystery Box").category, "other");
/// ```
#[must_use]
pub fn lookup(product_name: &str) -> CatalogEntry {
    let lowered = product_name.to_lowercase();
    CATALOG
        .iter()
        .filter(|(key, _)| lowered.contains(key))
        .max_by_key(|(key, _)| key.len())
        .map_or(DEFAULT_ENTRY, |(_, entry)| *entry)
}
