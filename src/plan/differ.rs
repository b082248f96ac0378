//! C9 (part 1) — Plan differ (spec §4.9).
//!
//! Compares the parsed plan against the `src/` source tree and produces a
//! `plan-diff.md` report. This gate is soft: it always returns a report,
//! never a hard failure.

use super::ast::PlanNode;
use std::collections::BTreeMap;

pub const THEME_VARS: &[&str] = &[
    "--primary",
    "--background",
    "--foreground",
    "--secondary",
    "--muted",
    "--accent",
    "--border",
    "--ring",
];

const FIELD_COMPONENTS: &[&str] = &[
    "Input", "Label", "Select", "Textarea", "Checkbox", "Radio", "Switch", "Slider", "Field",
    "FormField",
];

const COLUMN_COMPONENTS: &[&str] = &["TableHeader", "TableHead", "th", "Column", "DataColumn"];

const FIELD_RELATED_PROPS: &[&str] = &[
    "name",
    "field",
    "label",
    "id",
    "htmlFor",
    "placeholder",
    "header",
    "accessor",
];

const UTILITY_FILES: &[&str] = &["main.tsx", "main.ts", "index.css", "vite-env.d.ts"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    pub implemented: Vec<String>,
    pub deviations: Vec<String>,
    pub missing: Vec<String>,
    pub extra: Vec<String>,
}

impl DiffReport {
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Plan vs. Source Diff\n\n");
        for (title, items) in [
            ("Implemented", &self.implemented),
            ("Deviations", &self.deviations),
            ("Missing", &self.missing),
            ("Extra (unplanned)", &self.extra),
        ] {
            out.push_str(&format!("## {title}\n"));
            if items.is_empty() {
                out.push_str("- (none)\n");
            } else {
                for item in items {
                    out.push_str(&format!("- {item}\n"));
                }
            }
            out.push('\n');
        }
        out
    }
}

/// `source_files`: relative path (under `src/`) → content, for every file
/// in the tree. Building this once and sharing it with the scope gate
/// avoids a duplicate FS scan (spec §4.9).
pub fn diff_plan(root: &PlanNode, source_files: &BTreeMap<String, String>) -> DiffReport {
    let mut report = DiffReport::default();
    let mut matched_files: std::collections::BTreeSet<&str> = std::collections::BTreeSet::new();

    for screen in root.children_named("Screen") {
        let Some(name) = screen.prop_str("name") else {
            continue;
        };
        match find_screen_file(name, source_files) {
            Some(path) => {
                matched_files.insert(path);
                report.implemented.push(format!("Screen `{name}` → `{path}`"));
                diff_sections_and_fields(screen, source_files, &mut matched_files, &mut report);
            }
            None => report.missing.push(format!("Screen `{name}` has no matching source file")),
        }
    }

    diff_theme(root, source_files, &mut report);
    diff_schemas(root, source_files, &mut matched_files, &mut report);

    for path in source_files.keys() {
        let basename = basename(path);
        if matched_files.contains(path.as_str()) || UTILITY_FILES.contains(&basename) {
            continue;
        }
        report.extra.push(path.clone());
    }

    report
}

fn diff_sections_and_fields(
    screen: &PlanNode,
    source_files: &BTreeMap<String, String>,
    matched_files: &mut std::collections::BTreeSet<&str>,
    report: &mut DiffReport,
) {
    for section in screen.walk().filter(|n| n.component == "Section") {
        let Some(gumdrop) = section.prop_str("gumdrop") else {
            continue;
        };
        let matches: Vec<&str> = source_files
            .iter()
            .filter(|(_, content)| content.to_lowercase().contains(&gumdrop.to_lowercase()))
            .map(|(p, _)| p.as_str())
            .collect();
        if matches.is_empty() {
            report
                .missing
                .push(format!("Section `{gumdrop}` (line {}) has no matching source", section.line));
            continue;
        }
        for m in &matches {
            matched_files.insert(m);
        }

        let mut missing_fields = Vec::new();
        for field in section.walk().filter(|n| n.component == "Field" || n.component == "Column") {
            let identifier = field
                .prop_str("name")
                .or_else(|| field.prop_str("field"))
                .unwrap_or("?");
            let found = matches.iter().any(|path| {
                let content = &source_files[*path];
                field_identifier_present(content, identifier)
            });
            if !found {
                missing_fields.push(identifier.to_string());
            }
        }
        if missing_fields.is_empty() {
            report.implemented.push(format!("Section `{gumdrop}` → {}", matches.join(", ")));
        } else {
            report.deviations.push(format!(
                "Section `{gumdrop}` is missing field(s): {}",
                missing_fields.join(", ")
            ));
        }
    }
}

fn field_identifier_present(content: &str, identifier: &str) -> bool {
    let component_tag_carries_it = FIELD_COMPONENTS
        .iter()
        .chain(COLUMN_COMPONENTS.iter())
        .any(|component| content.contains(&format!("<{component}")) && content.contains(identifier));
    if component_tag_carries_it {
        return true;
    }
    FIELD_RELATED_PROPS.iter().any(|prop| {
        content.contains(&format!("{prop}=\"{identifier}\""))
            || content.contains(&format!("{prop}='{identifier}'"))
    })
}

fn diff_theme(root: &PlanNode, source_files: &BTreeMap<String, String>, report: &mut DiffReport) {
    if root.children_named("Theme").next().is_none() {
        return;
    }
    let Some(css) = source_files.get("src/index.css") else {
        report.missing.push("Theme: src/index.css not found".to_string());
        return;
    };
    let present = THEME_VARS.iter().filter(|v| css.contains(*v)).count();
    if present == THEME_VARS.len() {
        report.implemented.push("Theme variables fully present in src/index.css".to_string());
    } else if present > 0 {
        report.deviations.push(format!(
            "Theme: {present}/{} CSS variables present in src/index.css",
            THEME_VARS.len()
        ));
    } else {
        report.missing.push("Theme: no theme CSS variables found in src/index.css".to_string());
    }
}

fn diff_schemas(
    root: &PlanNode,
    source_files: &BTreeMap<String, String>,
    matched_files: &mut std::collections::BTreeSet<&str>,
    report: &mut DiffReport,
) {
    let shared_files: Vec<&str> = source_files
        .keys()
        .filter(|p| p.starts_with("src/shared/"))
        .map(|s| s.as_str())
        .collect();
    if shared_files.is_empty() {
        return; // silent per spec §4.9
    }
    for schema in root.walk().filter(|n| n.component == "Schema") {
        let Some(name) = schema.prop_str("name") else {
            continue;
        };
        let found = shared_files
            .iter()
            .find(|p| source_files[**p].contains(name));
        match found {
            Some(path) => {
                matched_files.insert(path);
                report.implemented.push(format!("Schema `{name}` → `{path}`"));
            }
            None => report.missing.push(format!("Schema `{name}` has no match under src/shared/")),
        }
    }
}

fn find_screen_file<'a>(name: &str, source_files: &'a BTreeMap<String, String>) -> Option<&'a str> {
    let variants = casing_variants(name);
    source_files
        .keys()
        .find(|path| {
            let base = basename_no_ext(path);
            variants.iter().any(|v| v.eq_ignore_ascii_case(base))
        })
        .or_else(|| {
            source_files
                .iter()
                .find(|(_, content)| variants.iter().any(|v| content.contains(v.as_str())))
                .map(|(p, _)| p)
        })
        .map(|s| s.as_str())
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn basename_no_ext(path: &str) -> &str {
    let b = basename(path);
    b.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(b)
}

pub(crate) fn words_of(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in name.chars() {
        if c == '-' || c == '_' || c == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(c.to_ascii_lowercase());
        prev_lower = c.is_lowercase();
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

pub(crate) fn casing_variants(name: &str) -> Vec<String> {
    let words = words_of(name);
    let pascal: String = words.iter().map(|w| capitalize(w)).collect();
    let camel: String = words
        .iter()
        .enumerate()
        .map(|(i, w)| if i == 0 { w.clone() } else { capitalize(w) })
        .collect();
    let kebab = words.join("-");
    let snake = words.join("_");
    let mut variants = vec![name.to_string(), pascal, camel, kebab, snake];
    variants.sort();
    variants.dedup();
    variants
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::parser::parse_plan;

    fn files(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn matches_screen_by_pascal_case_basename() {
        let plan = parse_plan(
            r#"<App name="x"><Theme mood="midnight" seed="1" pattern="dots"/><Screen name="dashboard"><Content><Section gumdrop="hero"/></Content></Screen></App>"#,
        )
        .unwrap();
        let files = files(&[("src/Dashboard.tsx", "export function Dashboard() { return <div>hero</div> }")]);
        let report = diff_plan(&plan, &files);
        assert!(report.implemented.iter().any(|s| s.contains("dashboard")));
    }

    #[test]
    fn missing_screen_is_reported() {
        let plan = parse_plan(
            r#"<App name="x"><Theme mood="midnight" seed="1" pattern="dots"/><Screen name="settings"><Content><Section gumdrop="hero"/></Content></Screen></App>"#,
        )
        .unwrap();
        let report = diff_plan(&plan, &BTreeMap::new());
        assert!(report.missing.iter().any(|s| s.contains("settings")));
    }

    #[test]
    fn utility_files_never_counted_as_extra() {
        let plan = parse_plan(r#"<App name="x"><Theme mood="midnight" seed="1" pattern="dots"/></App>"#).unwrap();
        let files = files(&[("main.tsx", ""), ("index.css", ""), ("vite-env.d.ts", "")]);
        let report = diff_plan(&plan, &files);
        assert!(report.extra.is_empty());
    }

    #[test]
    fn unplanned_file_is_extra() {
        let plan = parse_plan(r#"<App name="x"><Theme mood="midnight" seed="1" pattern="dots"/></App>"#).unwrap();
        let files = files(&[("src/Orphan.tsx", "export {}")]);
        let report = diff_plan(&plan, &files);
        assert_eq!(report.extra, vec!["src/Orphan.tsx".to_string()]);
    }

    #[test]
    fn theme_fully_present_is_implemented() {
        let plan = parse_plan(r#"<App name="x"><Theme mood="midnight" seed="1" pattern="dots"/></App>"#).unwrap();
        let css = THEME_VARS
            .iter()
            .map(|v| format!("{v}: #000;"))
            .collect::<Vec<_>>()
            .join("\n");
        let files = files(&[("src/index.css", &css)]);
        let report = diff_plan(&plan, &files);
        assert!(report.implemented.iter().any(|s| s.starts_with("Theme")));
    }

    #[test]
    fn casing_variants_cover_common_forms() {
        let variants = casing_variants("user profile");
        assert!(variants.contains(&"UserProfile".to_string()));
        assert!(variants.contains(&"userProfile".to_string()));
        assert!(variants.contains(&"user-profile".to_string()));
        assert!(variants.contains(&"user_profile".to_string()));
    }
}
