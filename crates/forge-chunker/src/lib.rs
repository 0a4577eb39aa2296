//! Chunker service for generated web project files.
//!
//! Small files are kept whole. Oversized Vue single-file components are
//! split into their `<template>`, `<script>` and `<style>` sections, and
//! everything else is split on line boundaries into size-bounded parts.
//!
//! # Example
//!
//! ```rust
//! use forge_chunker::ChunkerService;
//!
//! let service = ChunkerService::new();
//! let fragments = service.chunk("42", "src/main.js", "console.log('hi')");
//! assert_eq!(fragments.len(), 1);
//! ```

use std::collections::HashMap;

use forge_models::{CodeFragment, FileType, FragmentKind, PART_SECTION_PREFIX};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Chunking strategy chosen for one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    /// File fits in one fragment
    Whole,
    /// Split a component file into its named sections
    Sections,
    /// Size-bounded line slices
    LineBased,
}

/// Configuration for the chunker
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Largest content, in bytes, kept as a single fragment
    pub max_chunk_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 8000,
        }
    }
}

/// One slice before it is stamped into a [`CodeFragment`].
#[derive(Debug)]
struct Piece {
    section: Option<String>,
    kind: FragmentKind,
    content: String,
    lines: Option<(usize, usize)>,
}

/// Service for chunking project source files
pub struct ChunkerService {
    config: ChunkerConfig,
    /// Matches a whole `<script ...>...</script>` block
    script_regex: Regex,
    /// Matches `name: 'Foo'` in a component definition
    component_name_regex: Regex,
}

impl ChunkerService {
    /// Create a new chunker service with default config
    pub fn new() -> Self {
        Self::with_config(ChunkerConfig::default())
    }

    /// Create a new chunker service with custom config
    pub fn with_config(config: ChunkerConfig) -> Self {
        Self {
            config,
            script_regex: Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid regex"),
            component_name_regex: Regex::new(r#"name:\s*['"]([^'"]+)['"]"#).expect("valid regex"),
        }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Whether files at this path are indexed at all.
    pub fn supports(&self, file_path: &str) -> bool {
        FileType::from_path(file_path).is_some()
    }

    /// Split one file into fragments. Unsupported or blank files yield nothing.
    pub fn chunk(&self, project_id: &str, file_path: &str, content: &str) -> Vec<CodeFragment> {
        let Some(file_type) = FileType::from_path(file_path) else {
            debug!(file = %file_path, "Unsupported file type, skipping");
            return Vec::new();
        };
        if content.trim().is_empty() {
            return Vec::new();
        }

        let strategy = self.select_strategy(content, file_type);
        debug!(file = %file_path, strategy = ?strategy, bytes = content.len(), "Chunking file");

        let pieces = match strategy {
            ChunkStrategy::Whole => vec![Piece {
                section: None,
                kind: file_type.default_kind(),
                content: content.to_string(),
                lines: None,
            }],
            ChunkStrategy::Sections => {
                let sections = self.split_sections(content);
                if !sections.is_empty() {
                    sections
                } else {
                    self.split_lines(content, file_type.default_kind())
                }
            }
            ChunkStrategy::LineBased => self.split_lines(content, file_type.default_kind()),
        };

        let base_metadata = self.extract_metadata(file_path, content, file_type);
        let fragments: Vec<CodeFragment> = pieces
            .into_iter()
            .enumerate()
            .map(|(index, piece)| {
                let mut metadata = base_metadata.clone();
                if let Some((start, end)) = piece.lines {
                    metadata.insert("startLine".into(), Value::from(start));
                    metadata.insert("endLine".into(), Value::from(end));
                }
                CodeFragment::new(
                    project_id,
                    file_path,
                    piece.section,
                    piece.content,
                    file_type,
                    piece.kind,
                    index,
                )
                .with_metadata(metadata)
            })
            .collect();

        debug!(file = %file_path, fragments = fragments.len(), "Chunking complete");
        fragments
    }

    /// Select chunking strategy based on size and file type
    pub fn select_strategy(&self, content: &str, file_type: FileType) -> ChunkStrategy {
        if content.len() <= self.config.max_chunk_size {
            ChunkStrategy::Whole
        } else if file_type == FileType::Vue {
            ChunkStrategy::Sections
        } else {
            ChunkStrategy::LineBased
        }
    }

    // =========================================================================
    // Component sections
    // =========================================================================

    fn split_sections(&self, content: &str) -> Vec<Piece> {
        let mut pieces = Vec::new();

        if let Some(template) = outer_block(content, "<template", "</template>") {
            pieces.push(section_piece("template", FragmentKind::Template, template));
        }

        if let Some(script) = self.script_regex.find(content) {
            pieces.push(section_piece("script", FragmentKind::Script, script.as_str()));
        }

        if let Some(style) = first_block(content, "<style", "</style>") {
            pieces.push(section_piece("style", FragmentKind::Style, style));
        }

        pieces
    }

    // =========================================================================
    // Line-based chunking
    // =========================================================================

    /// Greedy line packing; a part is flushed before it would exceed the limit.
    /// A single line longer than the limit becomes its own oversized part.
    fn split_lines(&self, content: &str, kind: FragmentKind) -> Vec<Piece> {
        let max = self.config.max_chunk_size;
        let mut pieces = Vec::new();
        let mut current = String::new();
        let mut start_line = 1;

        for (i, line) in content.split('\n').enumerate() {
            let line_no = i + 1;
            if !current.is_empty() && current.len() + line.len() + 1 > max {
                push_part(&mut pieces, kind, &current, start_line, line_no - 1);
                current.clear();
                start_line = line_no;
            }
            if line_no > start_line {
                current.push('\n');
            }
            current.push_str(line);
        }
        let last_line = content.split('\n').count();
        push_part(&mut pieces, kind, &current, start_line, last_line);

        pieces
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    fn extract_metadata(
        &self,
        file_path: &str,
        content: &str,
        file_type: FileType,
    ) -> HashMap<String, Value> {
        let mut metadata = HashMap::new();
        let file_name = file_path.rsplit('/').next().unwrap_or(file_path);
        metadata.insert("fileName".into(), Value::from(file_name));

        if file_type == FileType::Vue {
            let component_name = self
                .component_name_regex
                .captures(content)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| file_name.trim_end_matches(".vue").to_string());
            metadata.insert("componentName".into(), Value::from(component_name));
            metadata.insert("hasTemplate".into(), Value::from(content.contains("<template")));
            metadata.insert("hasScript".into(), Value::from(content.contains("<script")));
            metadata.insert("hasStyle".into(), Value::from(content.contains("<style")));
            metadata.insert(
                "isScriptSetup".into(),
                Value::from(content.contains("<script setup")),
            );
        }

        metadata
    }
}

impl Default for ChunkerService {
    fn default() -> Self {
        Self::new()
    }
}

fn section_piece(name: &str, kind: FragmentKind, content: &str) -> Piece {
    Piece {
        section: Some(name.to_string()),
        kind,
        content: content.to_string(),
        lines: None,
    }
}

fn push_part(pieces: &mut Vec<Piece>, kind: FragmentKind, content: &str, start: usize, end: usize) {
    if content.trim().is_empty() {
        return;
    }
    let index = pieces.len();
    pieces.push(Piece {
        section: Some(format!("{}{}", PART_SECTION_PREFIX, index)),
        kind,
        content: content.to_string(),
        lines: Some((start, end)),
    });
}

/// From the first `open` to the end of the last `close`, so nested
/// `<template v-if>` blocks stay inside the outer one.
fn outer_block<'a>(content: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = content.find(open)?;
    let end = content.rfind(close)? + close.len();
    (end > start).then(|| &content[start..end]).filter(|s| !s.trim().is_empty())
}

/// From the first `open` to the first `close` after it.
fn first_block<'a>(content: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = content.find(open)?;
    let end = start + content[start..].find(close)? + close.len();
    Some(&content[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn small_chunker(max: usize) -> ChunkerService {
        ChunkerService::with_config(ChunkerConfig {
            max_chunk_size: max,
        })
    }

    const COMPONENT: &str = r#"<template>
  <footer class="footer">Copyright</footer>
</template>

<script setup>
const year = new Date().getFullYear()
</script>

<style scoped>
.footer { color: blue; }
</style>
"#;

    #[test]
    fn test_small_file_is_one_fragment() {
        let service = ChunkerService::new();
        let fragments = service.chunk("7", "src/components/Footer.vue", COMPONENT);
        assert_eq!(fragments.len(), 1);

        let f = &fragments[0];
        assert_eq!(f.section, None);
        assert_eq!(f.kind, FragmentKind::Component);
        assert_eq!(f.chunk_index, 0);
        assert_eq!(f.project_id, "7");
        assert_eq!(f.metadata["fileName"], "Footer.vue");
        assert_eq!(f.metadata["componentName"], "Footer");
        assert_eq!(f.metadata["isScriptSetup"], true);
        assert_eq!(f.metadata["hasStyle"], true);
    }

    #[test]
    fn test_large_component_splits_into_sections() {
        let service = small_chunker(40);
        let fragments = service.chunk("7", "src/components/Footer.vue", COMPONENT);
        assert_eq!(fragments.len(), 3);

        let sections: Vec<_> = fragments.iter().map(|f| f.section.as_deref()).collect();
        assert_eq!(sections, vec![Some("template"), Some("script"), Some("style")]);
        assert_eq!(fragments[0].kind, FragmentKind::Template);
        assert!(fragments[0].content.starts_with("<template>"));
        assert!(fragments[0].content.ends_with("</template>"));
        assert!(fragments[1].content.starts_with("<script setup>"));
        assert!(fragments[2].content.contains(".footer { color: blue; }"));
        assert!(fragments.iter().all(|f| f.file_path == "src/components/Footer.vue"));
        assert!(fragments.iter().all(|f| !f.is_partial()));
        assert_eq!(
            fragments.iter().map(|f| f.chunk_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_large_single_section_component_stays_whole_section() {
        let service = small_chunker(40);
        let content = "<template>\n  <div class=\"banner\">\n    <h1>Welcome to the shop</h1>\n  </div>\n</template>\n";
        let fragments = service.chunk("7", "src/Banner.vue", content);

        let sections: Vec<_> = fragments.iter().map(|f| f.section.as_deref()).collect();
        assert_eq!(sections, vec![Some("template")]);
        assert_eq!(fragments[0].kind, FragmentKind::Template);
        assert!(!fragments[0].is_partial());
    }

    #[test]
    fn test_component_name_from_definition() {
        let service = small_chunker(10);
        let content = "<template><div/></template>\n<script>\nexport default { name: 'SiteFooter' }\n</script>";
        let fragments = service.chunk("1", "src/Foo.vue", content);
        assert!(fragments.iter().all(|f| f.metadata["componentName"] == "SiteFooter"));
    }

    #[test]
    fn test_component_without_sections_falls_back_to_lines() {
        let service = small_chunker(20);
        let content = "<div>first line here</div>\n<div>second line here</div>\n";
        let fragments = service.chunk("1", "src/Odd.vue", content);
        assert_eq!(fragments.len(), 2);
        assert!(fragments.iter().all(|f| f.is_partial()));
        assert!(fragments.iter().all(|f| f.kind == FragmentKind::Component));
    }

    #[test]
    fn test_boundary_exactly_max_is_one_fragment() {
        let content = "const a = 1;\nconst b = 2;";
        let service = small_chunker(content.len());
        assert_eq!(service.chunk("1", "src/a.js", content).len(), 1);
    }

    #[test]
    fn test_boundary_one_over_max_splits() {
        let content = "const a = 1;\nconst b = 2;";
        let service = small_chunker(content.len() - 1);
        let fragments = service.chunk("1", "src/a.js", content);
        assert!(fragments.len() >= 2);
        assert_eq!(fragments[0].section.as_deref(), Some("part0"));
        assert_eq!(fragments[1].section.as_deref(), Some("part1"));
    }

    #[test]
    fn test_line_split_never_breaks_lines() {
        let content: String = (0..50).map(|i| format!("let value{} = {};\n", i, i)).collect();
        let service = small_chunker(120);
        let fragments = service.chunk("1", "src/values.ts", &content);
        assert!(fragments.len() > 1);

        let rebuilt: Vec<&str> = fragments
            .iter()
            .flat_map(|f| f.content.split('\n'))
            .filter(|l| !l.is_empty())
            .collect();
        let original: Vec<&str> = content.split('\n').filter(|l| !l.is_empty()).collect();
        assert_eq!(rebuilt, original);
        assert!(fragments.iter().all(|f| f.content.len() <= 120));
        assert!(fragments.iter().all(|f| f.kind == FragmentKind::Module));
        assert_eq!(fragments[0].metadata["startLine"], 1);
    }

    #[rstest]
    #[case("README.md")]
    #[case("src/main.py")]
    #[case("Dockerfile")]
    fn test_unsupported_files_are_skipped(#[case] path: &str) {
        let service = ChunkerService::new();
        assert!(service.chunk("1", path, "some content").is_empty());
        assert!(!service.supports(path));
    }

    #[test]
    fn test_blank_content_is_skipped() {
        let service = ChunkerService::new();
        assert!(service.chunk("1", "src/a.js", "  \n\t").is_empty());
    }

    #[rstest]
    #[case("styles/site.css", FragmentKind::Style)]
    #[case("package.json", FragmentKind::Config)]
    #[case("index.html", FragmentKind::Html)]
    #[case("src/router.ts", FragmentKind::Module)]
    fn test_whole_file_kind(#[case] path: &str, #[case] kind: FragmentKind) {
        let service = ChunkerService::new();
        let fragments = service.chunk("1", path, "x");
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].kind, kind);
    }

    #[test]
    fn test_strategy_selection() {
        let service = small_chunker(10);
        assert_eq!(service.select_strategy("short", FileType::Vue), ChunkStrategy::Whole);
        assert_eq!(
            service.select_strategy("much longer content", FileType::Vue),
            ChunkStrategy::Sections
        );
        assert_eq!(
            service.select_strategy("much longer content", FileType::Css),
            ChunkStrategy::LineBased
        );
    }
}
