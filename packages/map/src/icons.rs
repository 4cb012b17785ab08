//! Category to icon lookup.

use crate::IconSpec;

/// Icon for alpine huts.
pub const HIKING_ICON: &str = "assets/icon/hiking.svg";
/// Icon for wells.
pub const WATER_ICON: &str = "assets/icon/water.svg";
/// Icon for peaks.
pub const PEAK_ICON: &str = "assets/icon/peak.svg";
/// Fallback icon.
pub const DEFAULT_ICON: &str = "assets/icon/tree.svg";

const CATEGORY_ICONS: &[(&str, &str)] = &[
    ("alpine_hut", HIKING_ICON),
    ("well", WATER_ICON),
    ("peak", PEAK_ICON),
];

/// Returns the icon URL for `category`, falling back to [`DEFAULT_ICON`].
#[must_use]
pub fn icon_url(category: &str) -> &'static str {
    CATEGORY_ICONS
        .iter()
        .find(|(key, _)| *key == category)
        .map_or(DEFAULT_ICON, |(_, url)| *url)
}

/// Returns the full icon spec for `category`.
#[must_use]
pub fn icon_for_category(category: &str) -> IconSpec {
    IconSpec {
        url: icon_url(category).to_string(),
        size: [50, 50],
        anchor: [25, 50],
        popup_anchor: [0, -30],
        class_name: "leaflet-icon-shadow".to_string(),
    }
}
