//! C2 — Write guard (spec §4.2).
//!
//! Pure, side-effect-free admission control. The executor (§4.4) calls
//! [`check_path`]/[`check_content`] before every write reaches the [`Vfs`](crate::vfs::Vfs);
//! rejections are not advisory. Structured as pure functions over `&str`,
//! the same shape as the teacher's `Guardrails::check_*` methods which take
//! a `&serde_json::Value` and return a verdict with no I/O
//! (`src/orchestrator/guardrails.rs`).

/// Outcome of admission control for one write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub suggestion: Option<String>,
}

impl GuardDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            suggestion: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            suggestion: None,
        }
    }

    pub fn deny_with_suggestion(reason: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            suggestion: Some(suggestion.into()),
        }
    }
}

/// Path admission per spec §4.2.
pub fn check_path(path: &str) -> GuardDecision {
    let path = path.trim_start_matches("./");

    if path.starts_with(".ralph/") || path == ".ralph" {
        return GuardDecision::allow();
    }
    if path == "package.json" {
        return GuardDecision::allow();
    }
    if path == "index.html" {
        return GuardDecision::deny("Cannot modify index.html (contains harness-critical markup)");
    }
    if has_ext(path, &["html", "htm"]) {
        return GuardDecision::deny_with_suggestion(
            "HTML files cannot be written directly",
            "rewrite as a component under src/sections/",
        );
    }
    if has_ext(path, &["css"]) && !path.starts_with("src/") {
        return GuardDecision::deny("CSS files outside src/ are not allowed");
    }
    if !path.starts_with("src/") {
        return GuardDecision::deny(format!("Path `{path}` is outside the writable src/ tree"));
    }
    if has_ext(path, &["js"]) {
        return GuardDecision::deny_with_suggestion(
            "JavaScript files are not allowed",
            "use the .ts equivalent",
        );
    }
    if has_ext(path, &["jsx"]) {
        return GuardDecision::deny_with_suggestion(
            "JSX files are not allowed",
            "use the .tsx equivalent",
        );
    }
    if !has_ext(path, &["tsx", "ts", "css", "json"]) {
        return GuardDecision::deny(format!(
            "Extension of `{path}` is not writable inside src/ (allowed: .tsx, .ts, .css, .json)"
        ));
    }

    GuardDecision::allow()
}

/// Content admission per spec §4.2: `.css` may not contain `@tailwind`.
pub fn check_content(path: &str, content: &str) -> GuardDecision {
    if has_ext(path, &["css"]) && content.contains("@tailwind") {
        return GuardDecision::deny_with_suggestion(
            "@tailwind directives cannot be processed by this runtime",
            "declare CSS custom properties (--variables) instead",
        );
    }
    GuardDecision::allow()
}

/// Runs both checks in the order the executor applies them.
pub fn admit_write(path: &str, content: &str) -> GuardDecision {
    let path_decision = check_path(path);
    if !path_decision.allowed {
        return path_decision;
    }
    check_content(path, content)
}

fn has_ext(path: &str, exts: &[&str]) -> bool {
    match path.rsplit_once('.') {
        Some((_, ext)) => exts.iter().any(|e| e.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ralph_dir_always_allowed() {
        assert!(check_path(".ralph/status.txt").allowed);
        assert!(check_path(".ralph/plan.tsx").allowed);
    }

    #[test]
    fn root_package_json_allowed() {
        assert!(check_path("package.json").allowed);
    }

    #[test]
    fn index_html_forbidden() {
        let d = check_path("index.html");
        assert!(!d.allowed);
        assert!(d.reason.unwrap().contains("index.html"));
    }

    #[test]
    fn any_html_forbidden_with_suggestion() {
        let d = check_path("src/pages/about.html");
        assert!(!d.allowed);
        assert!(d.suggestion.unwrap().contains("src/sections"));
    }

    #[test]
    fn css_outside_src_forbidden() {
        assert!(!check_path("styles/theme.css").allowed);
    }

    #[test]
    fn css_inside_src_allowed() {
        assert!(check_path("src/index.css").allowed);
    }

    #[test]
    fn path_outside_src_forbidden() {
        assert!(!check_path("README.md").allowed);
    }

    #[test]
    fn js_and_jsx_suggest_ts_tsx() {
        assert!(check_path("src/App.js").suggestion.unwrap().contains(".ts"));
        assert!(check_path("src/App.jsx")
            .suggestion
            .unwrap()
            .contains(".tsx"));
    }

    #[test]
    fn unknown_extension_inside_src_forbidden() {
        assert!(!check_path("src/data.yaml").allowed);
    }

    #[test]
    fn tsx_ts_json_inside_src_allowed() {
        assert!(check_path("src/App.tsx").allowed);
        assert!(check_path("src/lib/util.ts").allowed);
        assert!(check_path("src/shared/schema.json").allowed);
    }

    #[test]
    fn tailwind_directive_forbidden() {
        let d = check_content("src/index.css", "@tailwind base;\n");
        assert!(!d.allowed);
    }

    #[test]
    fn plain_css_vars_allowed() {
        let d = check_content("src/index.css", ":root { --primary: #000; }\n");
        assert!(d.allowed);
    }

    #[test]
    fn admit_write_checks_path_before_content() {
        let d = admit_write("theme.css", "@tailwind base;\n");
        assert!(!d.allowed);
        assert!(d.reason.unwrap().contains("outside src/"));
    }
}
