//! C9 (part 2) — Scope gate (spec §4.9).
//!
//! Markers live as JSX comments inside `plan.tsx` itself, e.g.
//! `<Section gumdrop="features"> {/* TASK-3 [ADD]: 2 */} </Section>`. The
//! plan parser (§4.7) discards comments when it builds the `PlanNode` tree,
//! so this gate works over the raw `plan.tsx` text instead: it finds each
//! marker, resolves its enclosing `Section`'s `gumdrop` by scanning
//! backwards for the nearest `gumdrop="..."` attribute, and uses that to
//! locate the matching source file the same way the plan differ does
//! (substring match of the gumdrop name). If no enclosing gumdrop or no
//! matching file is found, the marker degrades to a warning rather than a
//! failure (spec §4.9); same if there's no `task-N-pre` baseline to
//! compare against.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static RE_ADD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)TASK-(\d+)\s*\[ADD\]\s*:\s*(\d+)").unwrap());
static RE_EXISTING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)EXISTING\s+(\d+)\s+PRESERVED").unwrap());
static RE_PRESERVED_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bPRESERVED\b").unwrap());
static RE_NO_CHANGES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)NO\s+CHANGES\s+for\s+task-(\d+)").unwrap());
static RE_GUMDROP: Lazy<Regex> = Lazy::new(|| Regex::new(r#"gumdrop\s*=\s*"([^"]+)""#).unwrap());

#[derive(Debug, Clone, PartialEq)]
pub enum ScopeExpectation {
    Add(usize),
    ExistingPreserved(Option<usize>),
    NoChanges,
}

struct RawMarker {
    expectation: ScopeExpectation,
    gumdrop: Option<String>,
}

fn gumdrop_before(text: &str, pos: usize) -> Option<String> {
    RE_GUMDROP
        .captures_iter(&text[..pos])
        .last()
        .map(|c| c[1].to_string())
}

fn find_raw_markers(plan_text: &str, task_n: u32) -> Vec<RawMarker> {
    let mut markers = Vec::new();
    for m in RE_ADD.find_iter(plan_text) {
        let caps = RE_ADD.captures(m.as_str()).unwrap();
        if caps[1].parse::<u32>() == Ok(task_n) {
            if let Ok(k) = caps[2].parse::<usize>() {
                markers.push(RawMarker {
                    expectation: ScopeExpectation::Add(k),
                    gumdrop: gumdrop_before(plan_text, m.start()),
                });
            }
        }
    }
    for m in RE_EXISTING.find_iter(plan_text) {
        let caps = RE_EXISTING.captures(m.as_str()).unwrap();
        if let Ok(k) = caps[1].parse::<usize>() {
            markers.push(RawMarker {
                expectation: ScopeExpectation::ExistingPreserved(Some(k)),
                gumdrop: gumdrop_before(plan_text, m.start()),
            });
        }
    }
    if !RE_EXISTING.is_match(plan_text) {
        for m in RE_PRESERVED_BARE.find_iter(plan_text) {
            markers.push(RawMarker {
                expectation: ScopeExpectation::ExistingPreserved(None),
                gumdrop: gumdrop_before(plan_text, m.start()),
            });
        }
    }
    for m in RE_NO_CHANGES.find_iter(plan_text) {
        let caps = RE_NO_CHANGES.captures(m.as_str()).unwrap();
        if caps[1].parse::<u32>() == Ok(task_n) {
            markers.push(RawMarker {
                expectation: ScopeExpectation::NoChanges,
                gumdrop: gumdrop_before(plan_text, m.start()),
            });
        }
    }
    markers
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeStatus {
    Pass,
    Fail,
    Warn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeFinding {
    pub marker: String,
    pub message: String,
    pub status: ScopeStatus,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeReport {
    pub findings: Vec<ScopeFinding>,
}

impl ScopeReport {
    pub fn passes(&self) -> bool {
        self.findings.iter().all(|f| f.status != ScopeStatus::Fail)
    }
}

/// `plan_text` is the raw, unparsed `.ralph/plan.tsx` content (markers are
/// comments and don't survive into the `PlanNode` tree). `current_files`
/// and `baseline_files` are both keyed by path under `src/`; `baseline_files`
/// is `None` when no `task-N-pre` tag exists yet.
pub fn validate_scope(
    task_n: u32,
    plan_text: &str,
    current_files: &BTreeMap<String, String>,
    baseline_files: Option<&BTreeMap<String, String>>,
) -> ScopeReport {
    let mut report = ScopeReport::default();

    for raw in find_raw_markers(plan_text, task_n) {
        let label = marker_label(task_n, &raw.expectation);
        let Some(gumdrop) = &raw.gumdrop else {
            report.findings.push(ScopeFinding {
                marker: label,
                message: "marker has no enclosing Section.gumdrop; skipping".to_string(),
                status: ScopeStatus::Warn,
            });
            continue;
        };
        let matches = matching_files(gumdrop, current_files);
        if matches.is_empty() {
            report.findings.push(ScopeFinding {
                marker: label,
                message: format!("no source file matches Section `{gumdrop}`; skipping"),
                status: ScopeStatus::Warn,
            });
            continue;
        }
        let current = matches.iter().map(|p| count_items(&current_files[*p])).sum::<usize>();

        let Some(baseline_files) = baseline_files else {
            report.findings.push(ScopeFinding {
                marker: label,
                message: "no task-N-pre baseline available; skipping comparison".to_string(),
                status: ScopeStatus::Warn,
            });
            continue;
        };
        let baseline = matches
            .iter()
            .map(|p| baseline_files.get(*p).map(|c| count_items(c)).unwrap_or(0))
            .sum::<usize>();

        let finding = match &raw.expectation {
            ScopeExpectation::Add(k) => {
                if current == baseline {
                    ScopeFinding {
                        marker: label,
                        message: "count unchanged".to_string(),
                        status: ScopeStatus::Fail,
                    }
                } else {
                    let target = baseline + k;
                    ScopeFinding {
                        marker: label,
                        message: format!("expected +{k} ({baseline} → {target}), found {current}"),
                        status: if current >= target { ScopeStatus::Pass } else { ScopeStatus::Fail },
                    }
                }
            }
            ScopeExpectation::ExistingPreserved(Some(k)) => ScopeFinding {
                marker: label,
                message: format!("expected at least {k} pre-existing item(s), found {current}"),
                status: if current >= *k { ScopeStatus::Pass } else { ScopeStatus::Fail },
            },
            ScopeExpectation::ExistingPreserved(None) => ScopeFinding {
                marker: label,
                message: format!("expected no shrinkage from baseline {baseline}, found {current}"),
                status: if current >= baseline { ScopeStatus::Pass } else { ScopeStatus::Fail },
            },
            ScopeExpectation::NoChanges => ScopeFinding {
                marker: label,
                message: format!("expected item count to stay at {baseline}, found {current}"),
                status: if current == baseline { ScopeStatus::Pass } else { ScopeStatus::Fail },
            },
        };
        report.findings.push(finding);
    }

    report
}

fn marker_label(task_n: u32, expectation: &ScopeExpectation) -> String {
    match expectation {
        ScopeExpectation::Add(k) => format!("TASK-{task_n} [ADD]: {k}"),
        ScopeExpectation::ExistingPreserved(Some(k)) => format!("EXISTING {k} PRESERVED"),
        ScopeExpectation::ExistingPreserved(None) => "PRESERVED".to_string(),
        ScopeExpectation::NoChanges => format!("NO CHANGES for task-{task_n}"),
    }
}

fn matching_files<'a>(gumdrop: &str, files: &'a BTreeMap<String, String>) -> Vec<&'a str> {
    let needle = gumdrop.to_lowercase();
    files
        .iter()
        .filter(|(_, content)| content.to_lowercase().contains(&needle))
        .map(|(p, _)| p.as_str())
        .collect()
}

pub(crate) fn count_items(content: &str) -> usize {
    max_jsx_tag_count(content).max(array_object_count(content))
}

fn max_jsx_tag_count(content: &str) -> usize {
    let chars: Vec<char> = content.chars().collect();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '<'
            && chars.get(i + 1) != Some(&'/')
            && chars.get(i + 1).is_some_and(|c| c.is_ascii_uppercase())
        {
            let start = i + 1;
            let mut j = start;
            while chars.get(j).is_some_and(|c| c.is_alphanumeric() || *c == '.' || *c == '_') {
                j += 1;
            }
            let name: String = chars[start..j].iter().collect();
            *counts.entry(name).or_insert(0) += 1;
            i = j;
        } else {
            i += 1;
        }
    }
    counts.values().copied().max().unwrap_or(0)
}

fn array_object_count(content: &str) -> usize {
    let separators = content.matches("}, {").count();
    if separators > 0 {
        separators + 1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn add_marker_reports_expected_delta_format() {
        let plan = r#"<Section gumdrop="features"> {/* TASK-3 [ADD]: 2 */} </Section>"#;
        let baseline = files(&[("src/Features.tsx", "<Card/><Card/><Card/><Card/>")]);
        let current = files(&[("src/Features.tsx", "<Card/><Card/><Card/><Card/><Card/>")]);
        let report = validate_scope(3, plan, &current, Some(&baseline));
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].message, "expected +2 (4 → 6), found 5");
        assert_eq!(report.findings[0].status, ScopeStatus::Fail);
    }

    #[test]
    fn add_marker_passes_when_target_met() {
        let plan = r#"<Section gumdrop="features"> {/* TASK-3 [ADD]: 2 */} </Section>"#;
        let baseline = files(&[("src/Features.tsx", "<Card/><Card/><Card/><Card/>")]);
        let current = files(&[("src/Features.tsx", "<Card/><Card/><Card/><Card/><Card/><Card/>")]);
        let report = validate_scope(3, plan, &current, Some(&baseline));
        assert_eq!(report.findings[0].status, ScopeStatus::Pass);
    }

    #[test]
    fn add_marker_with_no_change_reports_count_unchanged() {
        let plan = r#"<Section gumdrop="features"> {/* TASK-3 [ADD]: 2 */} </Section>"#;
        let baseline = files(&[("src/Features.tsx", "<Card/><Card/><Card/><Card/>")]);
        let current = files(&[("src/Features.tsx", "<Card/><Card/><Card/><Card/>")]);
        let report = validate_scope(3, plan, &current, Some(&baseline));
        assert_eq!(report.findings[0].message, "count unchanged");
        assert_eq!(report.findings[0].status, ScopeStatus::Fail);
    }

    #[test]
    fn marker_without_enclosing_gumdrop_is_a_warning() {
        let plan = "{/* TASK-1 [ADD]: 1 */}";
        let current = files(&[]);
        let report = validate_scope(1, plan, &current, None);
        assert_eq!(report.findings[0].status, ScopeStatus::Warn);
        assert!(report.passes());
    }

    #[test]
    fn missing_baseline_degrades_to_warning() {
        let plan = r#"<Section gumdrop="features"> {/* TASK-1 [ADD]: 1 */} </Section>"#;
        let current = files(&[("src/Features.tsx", "<Card/>")]);
        let report = validate_scope(1, plan, &current, None);
        assert_eq!(report.findings[0].status, ScopeStatus::Warn);
        assert!(report.passes());
    }

    #[test]
    fn no_matching_file_degrades_to_warning() {
        let plan = r#"<Section gumdrop="features"> {/* TASK-1 [ADD]: 1 */} </Section>"#;
        let current = files(&[("src/Unrelated.tsx", "nothing here")]);
        let baseline = files(&[]);
        let report = validate_scope(1, plan, &current, Some(&baseline));
        assert_eq!(report.findings[0].status, ScopeStatus::Warn);
    }

    #[test]
    fn array_object_heuristic_counts_entries() {
        let content = r#"const rows = [{a: 1}, {a: 2}, {a: 3}];"#;
        assert_eq!(array_object_count(content), 3);
    }

    #[test]
    fn jsx_tag_heuristic_counts_repeated_component() {
        let content = "<Row/><Row/><Row/><Cell/>";
        assert_eq!(max_jsx_tag_count(content), 3);
    }
}
