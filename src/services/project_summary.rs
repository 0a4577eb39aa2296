//! Project state summary injected ahead of the user's request.
//!
//! Rendered from the file system on every request and never cached. The tree
//! is bounded in depth and fan-out so large projects stay readable.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use forge_models::CodeGenType;
use futures::future::{BoxFuture, FutureExt};
use tokio::fs;
use tracing::debug;

/// Directories skipped in trees, listings and indexing walks.
pub const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    ".idea",
    ".vscode",
    "__pycache__",
    "target",
    "build",
    ".nuxt",
    ".next",
];

/// Files skipped in trees and listings.
pub const IGNORED_FILES: &[&str] = &[
    ".DS_Store",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    ".gitignore",
];

const MAX_TREE_DEPTH: usize = 4;
const MAX_ENTRIES_PER_DIR: usize = 15;
const RECENT_FILES: usize = 5;

/// Builds project summaries for apps under the code output root.
#[derive(Debug, Clone)]
pub struct ProjectSummaryService {
    output_root: PathBuf,
}

impl ProjectSummaryService {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    /// Summary block, or an empty string when the project does not exist yet.
    pub async fn summary(&self, app_id: i64, codegen_type: CodeGenType) -> String {
        let dir_name = codegen_type.dir_name(app_id);
        let dir = self.output_root.join(&dir_name);
        if !is_dir(&dir).await {
            debug!(app_id, dir = %dir.display(), "No project directory, skipping summary");
            return String::new();
        }

        let mut summary = String::from("=== Current project state ===\n");
        summary.push_str(&format!("Project directory: {}\n\n", dir_name));
        summary.push_str("File structure:\n");
        summary.push_str(&file_tree(&dir).await);

        let recent = recent_files(&dir, RECENT_FILES).await;
        if !recent.is_empty() {
            summary.push_str("\nRecently modified files:\n");
            for path in recent {
                summary.push_str(&format!("  - {}\n", path));
            }
        }

        summary.push_str("\n=== End of project state ===\n\n");
        debug!(app_id, len = summary.len(), "Project summary generated");
        summary
    }

    /// Prefix the message with the summary for the tool pipeline; other
    /// pipelines and brand-new projects get the message unchanged.
    pub async fn enhance(&self, message: &str, app_id: i64, codegen_type: CodeGenType) -> String {
        if !codegen_type.uses_tools() {
            return message.to_string();
        }
        let summary = self.summary(app_id, codegen_type).await;
        if summary.trim().is_empty() {
            return message.to_string();
        }
        format!("{}User request:\n{}", summary, message)
    }
}

pub async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

/// Whether a directory entry belongs in trees and walks.
pub fn should_include(name: &str, is_dir: bool) -> bool {
    if is_dir {
        !IGNORED_DIRS.contains(&name)
    } else {
        !IGNORED_FILES.contains(&name)
    }
}

struct Entry {
    path: PathBuf,
    name: String,
    is_dir: bool,
    is_file: bool,
    modified: SystemTime,
}

/// Included entries of one directory. Symlinks are not followed.
async fn list_dir(dir: &Path) -> Vec<Entry> {
    let Ok(mut read_dir) = fs::read_dir(dir).await else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    while let Ok(Some(entry)) = read_dir.next_entry().await {
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        let name = entry.file_name().to_string_lossy().to_string();
        if !should_include(&name, metadata.is_dir()) {
            continue;
        }
        entries.push(Entry {
            path: entry.path(),
            name,
            is_dir: metadata.is_dir(),
            is_file: metadata.is_file(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }
    entries
}

/// Box-drawing tree of `dir`: directories first, then files, by name.
pub async fn file_tree(dir: &Path) -> String {
    render_tree(dir, String::new(), 0).await
}

fn render_tree(dir: &Path, prefix: String, depth: usize) -> BoxFuture<'_, String> {
    async move {
        if depth >= MAX_TREE_DEPTH {
            return format!("{}└── ...\n", prefix);
        }

        let mut entries = list_dir(dir).await;
        entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

        let total = entries.len();
        let has_more = total > MAX_ENTRIES_PER_DIR;
        entries.truncate(MAX_ENTRIES_PER_DIR);

        let mut tree = String::new();
        let shown = entries.len();
        for (i, entry) in entries.iter().enumerate() {
            let is_last = i + 1 == shown && !has_more;
            let connector = if is_last { "└── " } else { "├── " };

            if entry.is_dir {
                tree.push_str(&format!("{}{}{}/\n", prefix, connector, entry.name));
                let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
                tree.push_str(&render_tree(&entry.path, child_prefix, depth + 1).await);
            } else {
                tree.push_str(&format!("{}{}{}\n", prefix, connector, entry.name));
            }
        }

        if has_more {
            tree.push_str(&format!(
                "{}└── ... ({} more files/directories omitted)\n",
                prefix,
                total - MAX_ENTRIES_PER_DIR
            ));
        }

        tree
    }
    .boxed()
}

/// Most recently modified files, as forward-slash paths relative to `dir`.
pub async fn recent_files(dir: &Path, limit: usize) -> Vec<String> {
    let mut files = collect_files(dir).await;
    files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    files
        .into_iter()
        .take(limit)
        .filter_map(|(path, _)| relative_path(dir, &path))
        .collect()
}

/// Every included file under `dir`, at any depth.
pub async fn walk_files(dir: &Path) -> Vec<PathBuf> {
    collect_files(dir).await.into_iter().map(|(path, _)| path).collect()
}

async fn collect_files(dir: &Path) -> Vec<(PathBuf, SystemTime)> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in list_dir(&current).await {
            if entry.is_dir {
                pending.push(entry.path);
            } else if entry.is_file {
                files.push((entry.path, entry.modified));
            }
        }
    }
    files
}

/// `path` relative to `base`, with forward slashes.
pub fn relative_path(base: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(base)
        .ok()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(root: &Path) -> PathBuf {
        let dir = root.join("vue_project_1");
        std::fs::create_dir_all(dir.join("src/components")).unwrap();
        std::fs::create_dir_all(dir.join("node_modules/vue")).unwrap();
        std::fs::write(dir.join("package.json"), "{}").unwrap();
        std::fs::write(dir.join("package-lock.json"), "{}").unwrap();
        std::fs::write(dir.join("src/App.vue"), "<template/>").unwrap();
        std::fs::write(dir.join("src/components/Footer.vue"), "<template/>").unwrap();
        std::fs::write(dir.join("node_modules/vue/index.js"), "").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_tree_dirs_first_and_ignores() {
        let root = tempfile::tempdir().unwrap();
        let dir = project(root.path());
        let tree = file_tree(&dir).await;
        assert_eq!(
            tree,
            "├── src/\n│   ├── components/\n│   │   └── Footer.vue\n│   └── App.vue\n└── package.json\n"
        );
    }

    #[tokio::test]
    async fn test_tree_fan_out_is_bounded() {
        let root = tempfile::tempdir().unwrap();
        for i in 0..20 {
            std::fs::write(root.path().join(format!("f{:02}.js", i)), "").unwrap();
        }
        let tree = file_tree(root.path()).await;
        assert_eq!(tree.lines().count(), 16);
        assert!(tree.ends_with("└── ... (5 more files/directories omitted)\n"));
    }

    #[tokio::test]
    async fn test_summary_layout() {
        let root = tempfile::tempdir().unwrap();
        project(root.path());
        let service = ProjectSummaryService::new(root.path());

        let summary = service.summary(1, CodeGenType::VueProject).await;
        assert!(summary.starts_with("=== Current project state ===\nProject directory: vue_project_1\n\nFile structure:\n"));
        assert!(summary.contains("Recently modified files:\n  - "));
        assert!(!summary.contains("node_modules"));
        assert!(summary.ends_with("\n=== End of project state ===\n\n"));

        assert_eq!(service.summary(2, CodeGenType::VueProject).await, "");
    }

    #[tokio::test]
    async fn test_enhance() {
        let root = tempfile::tempdir().unwrap();
        project(root.path());
        let service = ProjectSummaryService::new(root.path());

        let enhanced = service.enhance("add a footer", 1, CodeGenType::VueProject).await;
        assert!(enhanced.ends_with("=== End of project state ===\n\nUser request:\nadd a footer"));
        assert_eq!(service.enhance("add a footer", 1, CodeGenType::Html).await, "add a footer");
        assert_eq!(service.enhance("add a footer", 9, CodeGenType::VueProject).await, "add a footer");
    }

    #[tokio::test]
    async fn test_walk_files_skips_ignored() {
        let root = tempfile::tempdir().unwrap();
        let dir = project(root.path());
        let mut files: Vec<String> = walk_files(&dir)
            .await
            .iter()
            .filter_map(|p| relative_path(&dir, p))
            .collect();
        files.sort();
        assert_eq!(files, vec!["package.json", "src/App.vue", "src/components/Footer.vue"]);
    }

    #[tokio::test]
    async fn test_walk_files_reaches_past_tree_depth() {
        let root = tempfile::tempdir().unwrap();
        let dir = project(root.path());
        let deep = dir.join("src/views/admin/reports/charts/widgets");
        std::fs::create_dir_all(&deep).unwrap();
        std::fs::write(deep.join("Bar.vue"), "<template/>").unwrap();
        std::fs::create_dir_all(dir.join("src/views/dist")).unwrap();
        std::fs::write(dir.join("src/views/dist/bundle.js"), "").unwrap();

        let files: Vec<String> = walk_files(&dir)
            .await
            .iter()
            .filter_map(|p| relative_path(&dir, p))
            .collect();
        assert!(files.contains(&"src/views/admin/reports/charts/widgets/Bar.vue".to_string()));
        assert!(!files.iter().any(|f| f.contains("dist")));

        let tree = file_tree(&dir).await;
        assert!(tree.contains("└── ...\n"));
        assert!(!tree.contains("Bar.vue"));
    }
}
