//! Code fragment model for the retrieval index.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::{content_hash, new_id};

/// Source file kinds the chunker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Vue,
    JavaScript,
    TypeScript,
    Css,
    Json,
    Html,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Vue => "vue",
            FileType::JavaScript => "javascript",
            FileType::TypeScript => "typescript",
            FileType::Css => "css",
            FileType::Json => "json",
            FileType::Html => "html",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "vue" => Some(FileType::Vue),
            "javascript" => Some(FileType::JavaScript),
            "typescript" => Some(FileType::TypeScript),
            "css" => Some(FileType::Css),
            "json" => Some(FileType::Json),
            "html" => Some(FileType::Html),
            _ => None,
        }
    }

    /// Detect the file type from a path's extension. Unsupported files yield `None`.
    pub fn from_path(path: &str) -> Option<Self> {
        let lower = path.to_lowercase();
        let ext = lower.rsplit_once('.').map(|(_, ext)| ext)?;
        match ext {
            "vue" => Some(FileType::Vue),
            "js" => Some(FileType::JavaScript),
            "ts" => Some(FileType::TypeScript),
            "css" => Some(FileType::Css),
            "json" => Some(FileType::Json),
            "html" => Some(FileType::Html),
            _ => None,
        }
    }

    /// Fragment kind used when the file is kept whole or split by lines.
    pub fn default_kind(&self) -> FragmentKind {
        match self {
            FileType::Vue => FragmentKind::Component,
            FileType::JavaScript | FileType::TypeScript => FragmentKind::Module,
            FileType::Css => FragmentKind::Style,
            FileType::Json => FragmentKind::Config,
            FileType::Html => FragmentKind::Html,
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What part of a source file a fragment holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    /// A whole Vue single-file component
    Component,
    /// `<template>` block
    Template,
    /// `<script>` block
    Script,
    /// `<style>` block or stylesheet
    Style,
    /// JavaScript / TypeScript module
    Module,
    /// JSON configuration
    Config,
    /// HTML document
    Html,
}

impl FragmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentKind::Component => "component",
            FragmentKind::Template => "template",
            FragmentKind::Script => "script",
            FragmentKind::Style => "style",
            FragmentKind::Module => "module",
            FragmentKind::Config => "config",
            FragmentKind::Html => "html",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "component" => Some(FragmentKind::Component),
            "template" => Some(FragmentKind::Template),
            "script" => Some(FragmentKind::Script),
            "style" => Some(FragmentKind::Style),
            "module" => Some(FragmentKind::Module),
            "config" => Some(FragmentKind::Config),
            "html" => Some(FragmentKind::Html),
            _ => None,
        }
    }
}

impl std::fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Prefix of the section tag given to line-split fragments.
pub const PART_SECTION_PREFIX: &str = "part";

/// A semantically bounded slice of one source file.
///
/// `file_path` is always the plain project-relative path; the optional
/// `section` tag (`template`, `script`, `style`, `partN`) identifies the
/// slice, so deleting by file path removes every section of the file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeFragment {
    pub id: String,
    pub project_id: String,
    pub file_path: String,
    pub section: Option<String>,
    pub content: String,
    pub content_hash: String,
    pub file_type: FileType,
    pub kind: FragmentKind,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    /// Ordinal index within the file
    pub chunk_index: usize,
}

impl CodeFragment {
    pub fn new(
        project_id: impl Into<String>,
        file_path: impl Into<String>,
        section: Option<String>,
        content: impl Into<String>,
        file_type: FileType,
        kind: FragmentKind,
        chunk_index: usize,
    ) -> Self {
        let content = content.into();
        Self {
            id: new_id(),
            project_id: project_id.into(),
            file_path: file_path.into(),
            section,
            content_hash: content_hash(&content),
            content,
            file_type,
            kind,
            metadata: HashMap::new(),
            chunk_index,
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// `path` or `path#section`.
    pub fn display_path(&self) -> String {
        display_path(&self.file_path, self.section.as_deref())
    }

    /// True for size-bounded line slices, which never hold a whole unit.
    pub fn is_partial(&self) -> bool {
        is_partial_section(self.section.as_deref())
    }
}

/// One ranked hit from a retrieval query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalMatch {
    pub file_path: String,
    pub section: Option<String>,
    pub content: String,
    pub kind: FragmentKind,
    /// Similarity in [0, 1]
    pub score: f32,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl RetrievalMatch {
    pub fn display_path(&self) -> String {
        display_path(&self.file_path, self.section.as_deref())
    }

    pub fn is_partial(&self) -> bool {
        is_partial_section(self.section.as_deref())
    }
}

fn display_path(file_path: &str, section: Option<&str>) -> String {
    match section {
        Some(section) => format!("{}#{}", file_path, section),
        None => file_path.to_string(),
    }
}

fn is_partial_section(section: Option<&str>) -> bool {
    section.is_some_and(|s| s.starts_with(PART_SECTION_PREFIX))
}
