use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The currently-valid sets the validator checks plan content against
/// (spec §4.8). The theme-generator and gumdrop skill files that would
/// normally produce these sets are out of scope (spec §1); this struct is
/// the narrow contract surface the validator needs from them, loadable
/// from `.ralph/registries.json` or filled with the crate's bundled
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRegistries {
    pub moods: BTreeSet<String>,
    pub presets: BTreeSet<String>,
    pub patterns: BTreeSet<String>,
    pub fonts: BTreeSet<String>,
    pub shadows: BTreeSet<String>,
    pub radii: BTreeSet<String>,
    pub gumdrops: BTreeSet<String>,
}

/// Grid-heavy gumdrops for the `adjacent-grids` warning (spec §4.8).
pub const GRID_HEAVY_GUMDROPS: &[&str] = &[
    "blog-grid",
    "gallery",
    "grid-list",
    "pricing",
    "features",
    "team",
    "testimonials",
    "portfolio",
    "stats-dashboard",
];

/// Stateful gumdrops for the `no-data-for-stateful` warning (spec §4.8).
pub const STATEFUL_GUMDROPS: &[&str] = &[
    "data-table",
    "kanban-board",
    "calendar-view",
    "chat-messaging",
    "activity-feed",
    "file-browser",
];

impl Default for PlanRegistries {
    fn default() -> Self {
        Self {
            moods: strs(&["midnight", "dawn", "noon", "dusk", "neon", "paper"]),
            presets: strs(&["editorial", "brutalist", "glass", "pastel"]),
            patterns: strs(&["dots", "grid", "waves", "none"]),
            fonts: strs(&["inter", "source-sans", "jetbrains-mono", "playfair"]),
            shadows: strs(&["flat", "soft", "hard", "layered"]),
            radii: strs(&["none", "sm", "md", "lg", "full"]),
            gumdrops: strs(&[
                "hero",
                "features",
                "pricing",
                "team",
                "testimonials",
                "blog-grid",
                "gallery",
                "grid-list",
                "portfolio",
                "stats-dashboard",
                "data-table",
                "kanban-board",
                "calendar-view",
                "chat-messaging",
                "activity-feed",
                "file-browser",
                "footer",
                "nav-bar",
            ]),
        }
    }
}

fn strs(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}
