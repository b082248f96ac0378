//! C8 — Plan validator (spec §4.8).
//!
//! Structured as an ordered list of pure check functions over the parsed
//! tree, the same shape as the teacher's `HardChecklist`/`CheckDefinition`
//! pattern (`src/config/checklist.rs`): each check is independently
//! testable and the runner just folds over the list.

use super::ast::PlanNode;
use super::registries::{PlanRegistries, GRID_HEAVY_GUMDROPS, STATEFUL_GUMDROPS};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub id: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub failures: Vec<Finding>,
    pub warnings: Vec<Finding>,
}

impl ValidationReport {
    pub fn passes(&self) -> bool {
        self.failures.is_empty()
    }
}

pub fn validate_plan(root: Option<&PlanNode>, registries: &PlanRegistries) -> ValidationReport {
    let mut report = ValidationReport::default();

    let Some(root) = root else {
        report.failures.push(Finding {
            id: "parseable",
            message: "plan.tsx could not be parsed".into(),
        });
        return report;
    };

    if root.component != "App" {
        report.failures.push(Finding {
            id: "has-app-root",
            message: format!("root component is `{}`, expected `App`", root.component),
        });
        // Every other check assumes an App root; still attempt the
        // remainder against whatever tree we have, since a malformed
        // root doesn't make the rest of the tree meaningless.
    }

    let theme = root.children_named("Theme").next();
    match theme {
        None => report.failures.push(Finding {
            id: "has-theme",
            message: "App has no Theme child".into(),
        }),
        Some(theme) => {
            check_valid_mood(theme, registries, &mut report);
            check_valid_font(theme, registries, &mut report);
        }
    }

    if root.children_named("Screen").next().is_none() {
        report.failures.push(Finding {
            id: "has-screens",
            message: "App has no Screen children".into(),
        });
    }

    check_valid_gumdrops(root, registries, &mut report);
    check_sections_have_gumdrops(root, &mut report);
    check_no_empty_screens(root, &mut report);
    check_schema_endpoint_match(root, &mut report);

    check_adjacent_grids(root, &mut report);
    check_low_diversity(root, &mut report);
    check_missing_nav(root, &mut report);
    check_no_data_for_stateful(root, &mut report);

    report
}

fn check_valid_mood(theme: &PlanNode, registries: &PlanRegistries, report: &mut ValidationReport) {
    let Some(mood) = theme.prop_str("mood") else {
        return;
    };
    if registries.moods.contains(mood) || registries.presets.contains(mood) {
        return;
    }
    let valid: Vec<&str> = registries
        .moods
        .iter()
        .chain(registries.presets.iter())
        .map(|s| s.as_str())
        .collect();
    let suggestion = nearest(mood, &valid);
    report.failures.push(Finding {
        id: "valid-mood",
        message: format!(
            "Theme.mood `{mood}` is not a known mood or preset. Valid options: {}.{}",
            valid.join(", "),
            suggestion
                .map(|s| format!(" Did you mean `{s}`?"))
                .unwrap_or_default()
        ),
    });
}

fn check_valid_font(theme: &PlanNode, registries: &PlanRegistries, report: &mut ValidationReport) {
    for key in ["font", "monoFont"] {
        let Some(value) = theme.prop_str(key) else {
            continue;
        };
        if !registries.fonts.contains(value) {
            let valid: Vec<&str> = registries.fonts.iter().map(|s| s.as_str()).collect();
            let suggestion = nearest(value, &valid);
            report.failures.push(Finding {
                id: "valid-font",
                message: format!(
                    "Theme.{key} `{value}` is not a known font.{}",
                    suggestion
                        .map(|s| format!(" Did you mean `{s}`?"))
                        .unwrap_or_default()
                ),
            });
        }
    }
}

fn check_valid_gumdrops(root: &PlanNode, registries: &PlanRegistries, report: &mut ValidationReport) {
    let valid: Vec<&str> = registries.gumdrops.iter().map(|s| s.as_str()).collect();
    for node in root.walk() {
        for key in ["gumdrop", "use"] {
            let Some(value) = node.prop_str(key) else {
                continue;
            };
            if !registries.gumdrops.contains(value) {
                let suggestion = nearest(value, &valid);
                report.failures.push(Finding {
                    id: "valid-gumdrops",
                    message: format!(
                        "{}.{key} `{value}` is not a known gumdrop (line {}).{}",
                        node.component,
                        node.line,
                        suggestion
                            .map(|s| format!(" Did you mean `{s}`?"))
                            .unwrap_or_default()
                    ),
                });
            }
        }
    }
}

fn check_sections_have_gumdrops(root: &PlanNode, report: &mut ValidationReport) {
    for section in root.walk().filter(|n| n.component == "Section") {
        if section.prop_str("gumdrop").is_none() {
            report.failures.push(Finding {
                id: "sections-have-gumdrops",
                message: format!("Section at line {} has no gumdrop prop", section.line),
            });
        }
    }
}

fn check_no_empty_screens(root: &PlanNode, report: &mut ValidationReport) {
    for screen in root.children_named("Screen") {
        let has_section = screen.walk().any(|n| n.component == "Section");
        if !has_section {
            report.failures.push(Finding {
                id: "no-empty-screens",
                message: format!(
                    "Screen `{}` (line {}) has no Section descendant",
                    screen.prop_str("name").unwrap_or("?"),
                    screen.line
                ),
            });
        }
    }
}

fn check_schema_endpoint_match(root: &PlanNode, report: &mut ValidationReport) {
    let schema_names: BTreeSet<String> = root
        .walk()
        .filter(|n| n.component == "Schema")
        .filter_map(|n| n.prop_str("name"))
        .map(|s| normalize_noun(s))
        .collect();

    for endpoint in root.walk().filter(|n| n.component == "Endpoint") {
        let Some(resource) = endpoint.prop_str("resource") else {
            continue;
        };
        if !schema_names.contains(&normalize_noun(resource)) {
            report.failures.push(Finding {
                id: "schema-endpoint-match",
                message: format!(
                    "Endpoint.resource `{resource}` (line {}) has no matching Schema.name",
                    endpoint.line
                ),
            });
        }
    }
}

fn normalize_noun(s: &str) -> String {
    let lower = s.to_lowercase();
    lower.strip_suffix('s').unwrap_or(&lower).to_string()
}

fn check_adjacent_grids(root: &PlanNode, report: &mut ValidationReport) {
    for screen in root.children_named("Screen") {
        let sections: Vec<&PlanNode> = screen.walk().filter(|n| n.component == "Section").collect();
        for pair in sections.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let both_grid_heavy = [a, b].iter().all(|s| {
                s.prop_str("gumdrop")
                    .map(|g| GRID_HEAVY_GUMDROPS.contains(&g))
                    .unwrap_or(false)
            });
            if both_grid_heavy {
                report.warnings.push(Finding {
                    id: "adjacent-grids",
                    message: format!(
                        "Screen `{}` has two consecutive grid-heavy sections (lines {} and {})",
                        screen.prop_str("name").unwrap_or("?"),
                        a.line,
                        b.line
                    ),
                });
            }
        }
    }
}

fn check_low_diversity(root: &PlanNode, report: &mut ValidationReport) {
    let gumdrops: BTreeSet<&str> = root
        .walk()
        .filter(|n| n.component == "Section")
        .filter_map(|n| n.prop_str("gumdrop"))
        .collect();
    if !gumdrops.is_empty() && gumdrops.len() < 3 {
        report.warnings.push(Finding {
            id: "low-diversity",
            message: format!(
                "Only {} distinct gumdrop(s) used across the plan; consider more variety",
                gumdrops.len()
            ),
        });
    }
}

fn check_missing_nav(root: &PlanNode, report: &mut ValidationReport) {
    let screen_count = root.children_named("Screen").count();
    let has_nav = root.walk().any(|n| n.component == "Nav");
    if screen_count > 1 && !has_nav {
        report.warnings.push(Finding {
            id: "missing-nav",
            message: format!("{screen_count} screens but no Nav element anywhere in the plan"),
        });
    }
}

fn check_no_data_for_stateful(root: &PlanNode, report: &mut ValidationReport) {
    let has_stateful = root.walk().any(|n| {
        n.prop_str("gumdrop")
            .map(|g| STATEFUL_GUMDROPS.contains(&g))
            .unwrap_or(false)
    });
    let has_data = root.walk().any(|n| n.component == "Data");
    if has_stateful && !has_data {
        report.warnings.push(Finding {
            id: "no-data-for-stateful",
            message: "a stateful gumdrop is used but the plan has no Data element".into(),
        });
    }
}

/// Nearest-neighbour suggestion via Levenshtein distance (spec §4.8's
/// `valid-gumdrops` nearest-neighbour suggestions).
fn nearest<'a>(needle: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .min_by_key(|c| levenshtein(needle, c))
        .filter(|c| levenshtein(needle, c) <= (needle.len().max(3) / 2 + 1))
        .copied()
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::parser::parse_plan;

    fn registries() -> PlanRegistries {
        PlanRegistries::default()
    }

    #[test]
    fn typo_mood_fails_with_suggestion() {
        let plan = parse_plan(
            r#"<App name="x"><Theme mood="midnite" seed="1" pattern="dots"/><Screen name="dashboard"><Content><Section gumdrop="hero"/></Content></Screen></App>"#,
        )
        .unwrap();
        let report = validate_plan(Some(&plan), &registries());
        assert!(!report.passes());
        let failure = report.failures.iter().find(|f| f.id == "valid-mood").unwrap();
        assert!(failure.message.contains("midnight"));
    }

    #[test]
    fn well_formed_plan_passes() {
        let plan = parse_plan(
            r#"<App name="x"><Theme mood="midnight" seed="1" pattern="dots"/><Screen name="dashboard"><Nav/><Content><Section gumdrop="hero"/><Section gumdrop="footer"/></Content></Screen></App>"#,
        )
        .unwrap();
        let report = validate_plan(Some(&plan), &registries());
        assert!(report.passes(), "unexpected failures: {:?}", report.failures);
    }

    #[test]
    fn null_root_fails_parseable_only() {
        let report = validate_plan(None, &registries());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, "parseable");
    }

    #[test]
    fn non_app_root_fails_has_app_root() {
        let plan = parse_plan(r#"<Screen name="x"/>"#).unwrap();
        let report = validate_plan(Some(&plan), &registries());
        assert!(report.failures.iter().any(|f| f.id == "has-app-root"));
    }

    #[test]
    fn empty_screen_fails() {
        let plan = parse_plan(
            r#"<App name="x"><Theme mood="midnight" seed="1" pattern="dots"/><Screen name="blank"/></App>"#,
        )
        .unwrap();
        let report = validate_plan(Some(&plan), &registries());
        assert!(report.failures.iter().any(|f| f.id == "no-empty-screens"));
    }

    #[test]
    fn schema_endpoint_mismatch_is_plural_tolerant() {
        let plan = parse_plan(
            r#"<App name="x"><Theme mood="midnight" seed="1" pattern="dots"/><Screen name="dashboard"><Content><Section gumdrop="hero"/></Content></Screen><Data><Schema name="user" fields={{}}/><Endpoint resource="users" pattern="crud"/></Data></App>"#,
        )
        .unwrap();
        let report = validate_plan(Some(&plan), &registries());
        assert!(!report.failures.iter().any(|f| f.id == "schema-endpoint-match"));
    }

    #[test]
    fn adjacent_grid_heavy_sections_warn() {
        let plan = parse_plan(
            r#"<App name="x"><Theme mood="midnight" seed="1" pattern="dots"/><Screen name="home"><Content><Section gumdrop="features"/><Section gumdrop="pricing"/></Content></Screen></App>"#,
        )
        .unwrap();
        let report = validate_plan(Some(&plan), &registries());
        assert!(report.warnings.iter().any(|f| f.id == "adjacent-grids"));
    }

    #[test]
    fn repeated_validation_is_deterministic() {
        let plan = parse_plan(
            r#"<App name="x"><Theme mood="midnite" seed="1" pattern="dots"/><Screen name="home"><Content><Section gumdrop="hero"/></Content></Screen></App>"#,
        )
        .unwrap();
        let r1 = validate_plan(Some(&plan), &registries());
        let r2 = validate_plan(Some(&plan), &registries());
        assert_eq!(r1, r2);
    }
}
