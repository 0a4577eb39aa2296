//! Detailed code review tool: syntax, structure and best-practice checks.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::{str_arg_or, Tool, ToolContext};
use crate::error::Result;

static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<img[^>]*>").expect("valid regex"));
static CSS_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^}]+)\}").expect("valid regex"));
static LOOSE_EQ: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^=!]==[^=]").expect("valid regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)").expect("valid regex"));
static VUE_TEMPLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<template[^>]*>([\s\S]*?)</template>").expect("valid regex"));
static VUE_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<style[^>]*>([\s\S]*?)</style>").expect("valid regex"));
static VUE_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<script[^>]*>([\s\S]*?)</script>").expect("valid regex"));

const VOID_TAGS: &[&str] = &[
    "br", "hr", "img", "input", "meta", "link", "area", "base", "col", "embed", "param", "source",
    "track", "wbr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Basic,
    Standard,
    Strict,
}

impl Level {
    fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "basic" => Level::Basic,
            "strict" => Level::Strict,
            _ => Level::Standard,
        }
    }
}

#[derive(Debug, Default)]
struct Report {
    errors: Vec<(&'static str, String)>,
    warnings: Vec<String>,
    suggestions: Vec<String>,
}

impl Report {
    fn render(&self) -> String {
        let mut out = String::from("=== Code check result ===\n\n");

        if self.errors.is_empty() && self.warnings.is_empty() {
            out.push_str("✅ Code check passed, no problems found!\n");
        } else {
            if !self.errors.is_empty() {
                out.push_str(&format!("❌ Errors ({}):\n", self.errors.len()));
                for (kind, message) in &self.errors {
                    out.push_str(&format!("  - [{}] {}\n", kind, message));
                }
                out.push('\n');
            }
            if !self.warnings.is_empty() {
                out.push_str(&format!("⚠️ Warnings ({}):\n", self.warnings.len()));
                for warning in &self.warnings {
                    out.push_str(&format!("  - {}\n", warning));
                }
                out.push('\n');
            }
        }

        if !self.suggestions.is_empty() {
            out.push_str(&format!("💡 Suggestions ({}):\n", self.suggestions.len()));
            for suggestion in &self.suggestions {
                out.push_str(&format!("  - {}\n", suggestion));
            }
        }

        out.push_str(&format!(
            "\nStatus: {}",
            if self.errors.is_empty() { "passed" } else { "needs fixing" }
        ));
        out
    }
}

/// Checks code for syntax errors and common quality problems.
pub struct ValidateCodeTool;

#[async_trait]
impl Tool for ValidateCodeTool {
    fn name(&self) -> &'static str {
        "validateCode"
    }

    fn display_name(&self) -> &'static str {
        "Code check"
    }

    fn description(&self) -> &'static str {
        "Check code quality: syntax errors, structural problems and best practices"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": { "type": "string", "description": "Code to check" },
                "language": { "type": "string", "enum": ["html", "css", "javascript", "vue", "json"] },
                "level": { "type": "string", "enum": ["basic", "standard", "strict"] }
            },
            "required": ["code", "language"]
        })
    }

    async fn execute(&self, args: &Value, _ctx: &ToolContext) -> Result<String> {
        let code = str_arg_or(args, "code", "");
        let language = str_arg_or(args, "language", "html");
        let level = Level::parse(str_arg_or(args, "level", "standard"));
        Ok(validate(code, language, level).render())
    }

    fn format_executed(&self, args: &Value) -> String {
        format!(
            "[Tool call] {} - language: {}, level: {}",
            self.display_name(),
            str_arg_or(args, "language", "html"),
            str_arg_or(args, "level", "standard")
        )
    }
}

fn validate(code: &str, language: &str, level: Level) -> Report {
    let mut report = Report::default();
    match language.to_lowercase().as_str() {
        "html" => check_html(code, level, &mut report),
        "css" => check_css(code, level, &mut report),
        "javascript" | "js" => check_javascript(code, level, &mut report),
        "vue" => check_vue(code, level, &mut report),
        "json" => check_json(code, &mut report),
        other => report.warnings.push(format!("Unknown language: {}", other)),
    }
    report
}

fn check_html(code: &str, level: Level, report: &mut Report) {
    if !code.contains("<!DOCTYPE") && !code.contains("<!doctype") {
        report.warnings.push("Missing DOCTYPE declaration".to_string());
    }

    check_tags_closed(code, report);

    if IMG_TAG.find_iter(code).any(|m| !m.as_str().contains("alt=")) {
        report
            .warnings
            .push("img tag without alt attribute hurts accessibility".to_string());
    }

    if level != Level::Basic && code.contains("style=\"") {
        report
            .suggestions
            .push("Move inline styles into a stylesheet".to_string());
    }

    if level == Level::Strict
        && !code.contains("<header")
        && !code.contains("<nav")
        && !code.contains("<main")
    {
        report
            .suggestions
            .push("Use semantic tags (header, nav, main, footer)".to_string());
    }
}

fn check_css(code: &str, level: Level, report: &mut Report) {
    if code.matches('{').count() != code.matches('}').count() {
        report.errors.push(("Syntax", "Unbalanced braces".to_string()));
    }

    for rule in CSS_RULE.captures_iter(code) {
        for decl in rule[1].lines().map(str::trim) {
            if !decl.is_empty() && !decl.ends_with(';') && decl.contains(':') {
                let preview: String = decl.chars().take(30).collect();
                report
                    .warnings
                    .push(format!("CSS declaration may be missing a semicolon: {}", preview));
            }
        }
    }

    if level != Level::Basic {
        let important = code.matches("!important").count();
        if important > 3 {
            report.warnings.push(format!(
                "Overuse of !important ({} times) makes styles hard to maintain",
                important
            ));
        }
    }

    if level == Level::Strict && !code.contains("var(--") {
        report
            .suggestions
            .push("Use CSS variables (--primary-color etc.) for maintainability".to_string());
    }
}

fn check_javascript(code: &str, level: Level, report: &mut Report) {
    check_bracket_balance(code, report);

    if code.contains("var ") {
        report
            .warnings
            .push("Uses var declarations, prefer let or const".to_string());
    }
    if code.contains("console.log") {
        report
            .warnings
            .push("Contains console.log, remove it for production".to_string());
    }
    if level != Level::Basic && LOOSE_EQ.is_match(code) {
        report
            .warnings
            .push("Uses == for comparison, prefer === for strict equality".to_string());
    }
    if level == Level::Strict && code.contains("async") && !code.contains("try") && !code.contains(".catch") {
        report
            .suggestions
            .push("Add try/catch or .catch() error handling to async code".to_string());
    }
}

fn check_vue(code: &str, level: Level, report: &mut Report) {
    if !code.contains("<template") {
        report
            .errors
            .push(("Structure", "Vue component is missing a <template> section".to_string()));
    }
    if !code.contains("<script") {
        report
            .warnings
            .push("Vue component has no <script> section".to_string());
    }

    if let Some(template) = VUE_TEMPLATE.captures(code) {
        check_html(&template[1], level, report);
    }
    if let Some(style) = VUE_STYLE.captures(code) {
        check_css(&style[1], level, report);
    }
    if let Some(script) = VUE_SCRIPT.captures(code) {
        check_javascript(&script[1], level, report);
    }

    if level != Level::Basic && code.contains("<style") && !code.contains("<style scoped") {
        report
            .suggestions
            .push("Use <style scoped> to avoid leaking styles".to_string());
    }
}

fn check_json(code: &str, report: &mut Report) {
    if let Err(e) = serde_json::from_str::<Value>(code) {
        report.errors.push(("JSON syntax", e.to_string()));
    }
}

fn check_tags_closed(code: &str, report: &mut Report) {
    let mut stack: Vec<String> = Vec::new();

    for cap in TAG.captures_iter(code) {
        let closing = &cap[1] == "/";
        let name = cap[2].to_lowercase();
        if VOID_TAGS.contains(&name.as_str()) {
            continue;
        }

        if closing {
            if stack.last() == Some(&name) {
                stack.pop();
            } else {
                report
                    .errors
                    .push(("Tag", format!("</{}> has no matching opening tag", name)));
            }
        } else {
            stack.push(name);
        }
    }

    while let Some(unclosed) = stack.pop() {
        report.errors.push(("Tag", format!("<{}> is not closed", unclosed)));
    }
}

fn check_bracket_balance(code: &str, report: &mut Report) {
    let (mut parens, mut braces, mut brackets) = (0i64, 0i64, 0i64);
    for c in code.chars() {
        match c {
            '(' => parens += 1,
            ')' => parens -= 1,
            '{' => braces += 1,
            '}' => braces -= 1,
            '[' => brackets += 1,
            ']' => brackets -= 1,
            _ => {}
        }
    }
    if parens != 0 {
        report.errors.push(("Syntax", "Unbalanced parentheses ()".to_string()));
    }
    if braces != 0 {
        report.errors.push(("Syntax", "Unbalanced braces {}".to_string()));
    }
    if brackets != 0 {
        report.errors.push(("Syntax", "Unbalanced brackets []".to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_html_passes() {
        let html = "<!DOCTYPE html><html><body><header><img src=\"a.png\" alt=\"a\"></header></body></html>";
        let rendered = validate(html, "html", Level::Standard).render();
        assert!(rendered.contains("✅ Code check passed"));
        assert!(rendered.ends_with("Status: passed"));
    }

    #[test]
    fn test_unclosed_tags_are_errors() {
        let report = validate("<!DOCTYPE html><div><span></div>", "html", Level::Basic);
        let messages: Vec<&str> = report.errors.iter().map(|(_, m)| m.as_str()).collect();
        assert!(messages.contains(&"</div> has no matching opening tag"));
        assert!(messages.contains(&"<span> is not closed"));
        assert!(report.render().ends_with("Status: needs fixing"));
    }

    #[test]
    fn test_javascript_warnings_by_level() {
        let code = "var a = 1; if (a == 1) { console.log(a) }";
        let basic = validate(code, "js", Level::Basic);
        assert_eq!(basic.warnings.len(), 2);
        let standard = validate(code, "javascript", Level::Standard);
        assert_eq!(standard.warnings.len(), 3);
    }

    #[test]
    fn test_css_semicolon_and_strict_suggestion() {
        let report = validate(".a {\n  color: red\n}", "css", Level::Strict);
        assert!(report.warnings[0].starts_with("CSS declaration may be missing a semicolon"));
        assert_eq!(report.suggestions.len(), 1);
    }

    #[test]
    fn test_vue_sections_are_checked() {
        let code = "<template><div></template>\n<style>\n.a { color: red; }\n</style>";
        let report = validate(code, "vue", Level::Standard);
        assert!(report.warnings.contains(&"Vue component has no <script> section".to_string()));
        assert!(report.errors.iter().any(|(_, m)| m == "<div> is not closed"));
        assert!(report.suggestions.iter().any(|s| s.contains("scoped")));
    }

    #[test]
    fn test_json_and_unknown_language() {
        assert!(validate("{\"a\": 1}", "json", Level::Basic).errors.is_empty());
        assert_eq!(validate("{a:", "json", Level::Basic).errors.len(), 1);
        assert_eq!(
            validate("x", "rust", Level::Basic).warnings,
            vec!["Unknown language: rust".to_string()]
        );
    }
}
