//! Fast syntax sanity checks run after every file write or modify.
//!
//! Only structural balance is checked; the result is appended to the tool
//! output so the model can fix obvious breakage in its next step.

use super::extension;

/// Tags whose open/close counts are compared in HTML files.
const HTML_CHECK_TAGS: [&str; 9] = [
    "div", "span", "section", "header", "footer", "main", "nav", "ul", "li",
];

/// Problems found in `content`, chosen by the extension of `file_path`.
pub fn validate(file_path: &str, content: &str) -> Vec<String> {
    let mut errors = Vec::new();
    match extension(file_path).as_str() {
        "vue" => validate_vue(content, &mut errors),
        "js" | "ts" | "json" => validate_brackets(content, &mut errors),
        "css" | "scss" => validate_css_braces(content, &mut errors),
        "html" => validate_html(content, &mut errors),
        _ => {}
    }
    errors
}

/// `⚠️ Syntax check: a; b`, or `None` when there is nothing to report.
pub fn format_result(errors: &[String]) -> Option<String> {
    if errors.is_empty() {
        None
    } else {
        Some(format!("⚠️ Syntax check: {}", errors.join("; ")))
    }
}

fn validate_vue(content: &str, errors: &mut Vec<String>) {
    let has_template = content.contains("<template");
    if !has_template {
        errors.push("missing <template> tag".to_string());
    }
    if has_template && !content.contains("</template>") {
        errors.push("<template> tag is not closed".to_string());
    }
    if content.contains("<script") && !content.contains("</script>") {
        errors.push("<script> tag is not closed".to_string());
    }
    if content.contains("<style") && !content.contains("</style>") {
        errors.push("<style> tag is not closed".to_string());
    }
    validate_brackets(content, errors);
}

/// Brace, bracket and paren balance, skipping string literals.
fn validate_brackets(content: &str, errors: &mut Vec<String>) {
    let (mut braces, mut brackets, mut parens) = (0i64, 0i64, 0i64);
    let mut in_string: Option<char> = None;
    let mut prev = '\0';

    for c in content.chars() {
        if matches!(c, '"' | '\'' | '`') && prev != '\\' {
            match in_string {
                None => in_string = Some(c),
                Some(open) if open == c => in_string = None,
                Some(_) => {}
            }
            prev = c;
            continue;
        }
        prev = c;
        if in_string.is_some() {
            continue;
        }
        match c {
            '{' => braces += 1,
            '}' => braces -= 1,
            '[' => brackets += 1,
            ']' => brackets -= 1,
            '(' => parens += 1,
            ')' => parens -= 1,
            _ => {}
        }
    }

    if braces != 0 {
        errors.push(format!("braces {{}} unbalanced (diff: {})", braces));
    }
    if brackets != 0 {
        errors.push(format!("brackets [] unbalanced (diff: {})", brackets));
    }
    if parens != 0 {
        errors.push(format!("parentheses () unbalanced (diff: {})", parens));
    }
}

fn validate_css_braces(content: &str, errors: &mut Vec<String>) {
    let diff: i64 = content
        .chars()
        .map(|c| match c {
            '{' => 1,
            '}' => -1,
            _ => 0,
        })
        .sum();
    if diff != 0 {
        errors.push(format!("CSS braces {{}} unbalanced (diff: {})", diff));
    }
}

/// Reports only the first tag with more opens than closes.
fn validate_html(content: &str, errors: &mut Vec<String>) {
    for tag in HTML_CHECK_TAGS {
        let open = content.matches(&format!("<{}", tag)).count();
        let close = content.matches(&format!("</{}>", tag)).count();
        if open > close {
            errors.push(format!(
                "<{}> tag may not be closed (open: {}, close: {})",
                tag, open, close
            ));
            break;
        }
    }
}
