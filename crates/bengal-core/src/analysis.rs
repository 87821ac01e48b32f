//! Content intelligence: an advisory, read-only pass over discovered
//! pages.
//!
//! Produces suggestions only — tab-set candidates, accessibility
//! warnings, and prefetch eagerness recommendations. The analyzer never
//! mutates pages or the cache.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The page fields the analyzer reads. Built by the orchestrator from
/// discovered pages.
#[derive(Debug, Clone, Default)]
pub struct PageSample {
    /// Site-relative page path (e.g. `/docs/intro/`).
    pub path: String,
    /// Raw markdown source.
    pub source: String,
    /// Rendered HTML.
    pub html: String,
}

/// Kind and severity of one suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSuggestion {
    /// `tabs`, `accessibility`, `prefetch`, or `structure`.
    pub kind: String,
    /// `info`, `warning`, or `error`.
    pub severity: String,
    /// What was found.
    pub message: String,
    /// Page the finding applies to.
    pub page_path: String,
    /// Recommended action.
    pub suggestion: String,
}

/// Aggregated analysis results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentAnalysisReport {
    /// Number of pages examined.
    pub pages_analyzed: usize,
    /// Pages whose code blocks would work better as tabs.
    pub code_blocks_detected: Vec<String>,
    /// Accessibility findings.
    pub accessibility_warnings: Vec<ContentSuggestion>,
    /// Section path → page count.
    pub navigation_patterns: BTreeMap<String, usize>,
    /// All suggestions, most useful first.
    pub suggestions: Vec<ContentSuggestion>,
    /// Section path → prefetch eagerness (`eager`/`moderate`/`conservative`).
    pub speculation_recommendations: BTreeMap<String, String>,
}

impl ContentAnalysisReport {
    /// JSON form with the suggestion list capped for reports.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!({
            "pages_analyzed": self.pages_analyzed,
            "code_blocks_detected": self.code_blocks_detected,
            "accessibility_warnings": self.accessibility_warnings,
            "navigation_patterns": self.navigation_patterns,
            "suggestions_count": self.suggestions.len(),
            "speculation_recommendations": self.speculation_recommendations,
        });
        let capped: Vec<_> = self.suggestions.iter().take(20).collect();
        if let Ok(suggestions) = serde_json::to_value(capped) {
            value["suggestions"] = suggestions;
        }
        value
    }

    /// Human-readable summary block.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "=".repeat(60),
            "  Content Intelligence Report".to_string(),
            "=".repeat(60),
            String::new(),
            format!("  Pages analyzed: {}", self.pages_analyzed),
            format!("  Tab candidates: {}", self.code_blocks_detected.len()),
            format!(
                "  Accessibility warnings: {}",
                self.accessibility_warnings.len()
            ),
            format!("  Total suggestions: {}", self.suggestions.len()),
            String::new(),
        ];
        if !self.code_blocks_detected.is_empty() {
            lines.push("  Pages with multiple code blocks (consider tabs):".to_string());
            for path in self.code_blocks_detected.iter().take(5) {
                lines.push(format!("     - {path}"));
            }
            if self.code_blocks_detected.len() > 5 {
                lines.push(format!(
                    "     ... and {} more",
                    self.code_blocks_detected.len() - 5
                ));
            }
            lines.push(String::new());
        }
        if !self.accessibility_warnings.is_empty() {
            lines.push("  Accessibility warnings:".to_string());
            for warning in self.accessibility_warnings.iter().take(5) {
                lines.push(format!("     - {}: {}", warning.page_path, warning.message));
            }
            if self.accessibility_warnings.len() > 5 {
                lines.push(format!(
                    "     ... and {} more",
                    self.accessibility_warnings.len() - 5
                ));
            }
            lines.push(String::new());
        }
        if !self.speculation_recommendations.is_empty() {
            lines.push("  Prefetch recommendations:".to_string());
            for (section, eagerness) in self.speculation_recommendations.iter().take(5) {
                lines.push(format!("     - {section}: {eagerness}"));
            }
            lines.push(String::new());
        }
        lines.push("=".repeat(60));
        lines.join("\n")
    }
}

static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<img[^>]*>").expect("valid regex"));
static HEADING_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<h([1-6])").expect("valid regex"));

/// Analyze discovered pages and return the advisory report.
#[must_use]
pub fn analyze_content(pages: &[PageSample]) -> ContentAnalysisReport {
    let mut report = ContentAnalysisReport::default();
    for page in pages {
        report.pages_analyzed += 1;
        check_code_blocks(page, &mut report);
        check_accessibility(page, &mut report);
        track_navigation(page, &mut report);
    }
    recommend_speculation(&mut report);
    report
}

/// Fenced code blocks in the markdown source: (block count, distinct
/// non-empty languages).
fn count_code_blocks(source: &str) -> (usize, std::collections::BTreeSet<String>) {
    let mut blocks = 0usize;
    let mut languages = std::collections::BTreeSet::new();
    let mut open: Option<(u8, usize)> = None;
    for line in source.lines() {
        match open {
            Some(fence) => {
                if crate::directives::fence::closes_code_fence(line, fence) {
                    open = None;
                }
            }
            None => {
                if let Some(fence) = crate::directives::fence::code_fence(line) {
                    blocks += 1;
                    let info = line.trim_start()[fence.1..].trim();
                    if let Some(lang) = info.split_whitespace().next() {
                        languages.insert(lang.to_string());
                    }
                    open = Some(fence);
                }
            }
        }
    }
    (blocks, languages)
}

fn check_code_blocks(page: &PageSample, report: &mut ContentAnalysisReport) {
    let (blocks, languages) = count_code_blocks(&page.source);
    if blocks >= 3 && languages.len() >= 2 {
        report.code_blocks_detected.push(page.path.clone());
        report.suggestions.push(ContentSuggestion {
            kind: "tabs".into(),
            severity: "info".into(),
            message: format!(
                "Page has {blocks} code blocks with {} languages",
                languages.len()
            ),
            page_path: page.path.clone(),
            suggestion: "Consider using a tab-set directive for code examples".into(),
        });
    }
}

fn check_accessibility(page: &PageSample, report: &mut ContentAnalysisReport) {
    // Images without any alt attribute; explicit alt="" is decorative and
    // passes. One warning per page is enough.
    for tag in IMG_TAG.find_iter(&page.html) {
        if !tag.as_str().contains("alt=") {
            let warning = ContentSuggestion {
                kind: "accessibility".into(),
                severity: "warning".into(),
                message: "Image is missing alt text".into(),
                page_path: page.path.clone(),
                suggestion: "Add descriptive alt text to images".into(),
            };
            report.accessibility_warnings.push(warning.clone());
            report.suggestions.push(warning);
            break;
        }
    }

    // Skipped heading levels (e.g. h2 followed by h4).
    let levels: Vec<u32> = HEADING_TAG
        .captures_iter(&page.html)
        .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse().ok()))
        .collect();
    for window in levels.windows(2) {
        if window[1] > window[0] + 1 {
            let warning = ContentSuggestion {
                kind: "accessibility".into(),
                severity: "warning".into(),
                message: format!("Heading levels skipped (h{} to h{})", window[0], window[1]),
                page_path: page.path.clone(),
                suggestion: "Maintain proper heading hierarchy".into(),
            };
            report.accessibility_warnings.push(warning.clone());
            report.suggestions.push(warning);
            break;
        }
    }
}

fn track_navigation(page: &PageSample, report: &mut ContentAnalysisReport) {
    if let Some(first) = page
        .path
        .trim_matches('/')
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
    {
        *report
            .navigation_patterns
            .entry(format!("/{first}/"))
            .or_insert(0) += 1;
    }
}

fn recommend_speculation(report: &mut ContentAnalysisReport) {
    let mut sections: Vec<(&String, &usize)> = report.navigation_patterns.iter().collect();
    sections.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    let recommendations: Vec<(String, String)> = sections
        .into_iter()
        .take(5)
        .map(|(section, &count)| {
            let eagerness = if count >= 10 {
                "eager"
            } else if count >= 5 {
                "moderate"
            } else {
                "conservative"
            };
            (section.clone(), eagerness.to_string())
        })
        .collect();
    report.speculation_recommendations.extend(recommendations);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(path: &str, source: &str, html: &str) -> PageSample {
        PageSample {
            path: path.into(),
            source: source.into(),
            html: html.into(),
        }
    }

    #[test]
    fn test_tab_candidate_detection() {
        let source = "```python\nx\n```\n\n```rust\ny\n```\n\n```python\nz\n```\n";
        let report = analyze_content(&[page("/docs/multi/", source, "")]);
        assert_eq!(report.code_blocks_detected, vec!["/docs/multi/"]);
        assert!(report.suggestions.iter().any(|s| s.kind == "tabs"));
    }

    #[test]
    fn test_few_blocks_or_one_language_not_flagged() {
        let two_blocks = "```python\nx\n```\n\n```rust\ny\n```\n";
        let report = analyze_content(&[page("/a/", two_blocks, "")]);
        assert!(report.code_blocks_detected.is_empty());

        let one_lang = "```python\nx\n```\n\n```python\ny\n```\n\n```python\nz\n```\n";
        let report = analyze_content(&[page("/a/", one_lang, "")]);
        assert!(report.code_blocks_detected.is_empty());
    }

    #[test]
    fn test_missing_alt_warns_once_per_page() {
        let html = r#"<img src="/a.png"><img src="/b.png">"#;
        let report = analyze_content(&[page("/docs/imgs/", "", html)]);
        assert_eq!(report.accessibility_warnings.len(), 1);
    }

    #[test]
    fn test_empty_alt_is_decorative() {
        let html = r#"<img src="/a.png" alt="">"#;
        let report = analyze_content(&[page("/docs/imgs/", "", html)]);
        assert!(report.accessibility_warnings.is_empty());
    }

    #[test]
    fn test_heading_skip_detected() {
        let html = "<h2 id=\"a\">A</h2><h4 id=\"b\">B</h4>";
        let report = analyze_content(&[page("/docs/h/", "", html)]);
        assert_eq!(report.accessibility_warnings.len(), 1);
        assert!(report.accessibility_warnings[0]
            .message
            .contains("h2 to h4"));
    }

    #[test]
    fn test_sequential_headings_pass() {
        let html = "<h1>A</h1><h2>B</h2><h3>C</h3><h2>D</h2>";
        let report = analyze_content(&[page("/docs/h/", "", html)]);
        assert!(report.accessibility_warnings.is_empty());
    }

    #[test]
    fn test_speculation_tiers() {
        let mut pages = Vec::new();
        for i in 0..12 {
            pages.push(page(&format!("/big/p{i}/"), "", ""));
        }
        for i in 0..6 {
            pages.push(page(&format!("/mid/p{i}/"), "", ""));
        }
        pages.push(page("/small/p0/", "", ""));

        let report = analyze_content(&pages);
        assert_eq!(report.speculation_recommendations["/big/"], "eager");
        assert_eq!(report.speculation_recommendations["/mid/"], "moderate");
        assert_eq!(report.speculation_recommendations["/small/"], "conservative");
    }

    #[test]
    fn test_report_json_caps_suggestions() {
        let mut report = ContentAnalysisReport::default();
        for i in 0..30 {
            report.suggestions.push(ContentSuggestion {
                kind: "tabs".into(),
                severity: "info".into(),
                message: format!("s{i}"),
                page_path: "/x/".into(),
                suggestion: String::new(),
            });
        }
        let json = report.to_json();
        assert_eq!(json["suggestions_count"], 30);
        assert_eq!(json["suggestions"].as_array().map(Vec::len), Some(20));
    }

    #[test]
    fn test_summary_mentions_counts() {
        let report = analyze_content(&[page("/docs/a/", "", "")]);
        let summary = report.summary();
        assert!(summary.contains("Pages analyzed: 1"));
    }
}
