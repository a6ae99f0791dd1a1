//! Keyword-based bin icon resolution for advice blocks.

use crate::model::BinIcon;

/// Keywords that select an icon when found in a block.
#[derive(Debug, Clone, Copy)]
pub struct IconRule {
    /// Lowercase substrings, any of which triggers the rule.
    pub keywords: &'static [&'static str],
    /// Icon chosen when the rule matches.
    pub icon: BinIcon,
}

/// Priority-ordered rules; the first match wins.
pub const ICON_RULES: [IconRule; 8] = [
    IconRule {
        keywords: &["unsorted waste", "grey"],
        icon: BinIcon::GreyBin,
    },
    IconRule {
        keywords: &["organic", "food waste", "brown"],
        icon: BinIcon::BrownBin,
    },
    IconRule {
        keywords: &["plastic", "metal", "yellow"],
        icon: BinIcon::YellowBin,
    },
    IconRule {
        keywords: &["paper", "blue"],
        icon: BinIcon::BlueBin,
    },
    IconRule {
        keywords: &["collection centers", "electronic", "red"],
        icon: BinIcon::RedBin,
    },
    IconRule {
        keywords: &["oil"],
        icon: BinIcon::OilSymbol,
    },
    IconRule {
        keywords: &["battery"],
        icon: BinIcon::BatterySymbol,
    },
    IconRule {
        keywords: &["farmacy"],
        icon: BinIcon::Pharmacy,
    },
];

/// Pick the icon for a block of advice text.
///
/// Matching is a case-insensitive substring search, so "red" also hits words such as
/// "shredded". Returns `None` when no keyword occurs.
#[must_use]
pub fn resolve(text: &str) -> Option<BinIcon> {
    let lowered = text.to_lowercase();
    ICON_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|keyword| lowered.contains(keyword)))
        .map(|rule| rule.icon)
}
