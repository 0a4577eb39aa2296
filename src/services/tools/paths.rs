//! Project root resolution and path safety for the file tools.

use std::path::{Component, Path, PathBuf};

use forge_models::CodeGenType;

/// Project directory prefixes, in lookup priority.
const PROJECT_DIR_ORDER: [CodeGenType; 3] = [
    CodeGenType::VueProject,
    CodeGenType::Html,
    CodeGenType::MultiFile,
];

/// First existing project directory for the app; a new app gets the
/// `vue_project_{id}` directory.
pub fn resolve_project_root(output_root: &Path, app_id: i64) -> PathBuf {
    PROJECT_DIR_ORDER
        .iter()
        .map(|kind| output_root.join(kind.dir_name(app_id)))
        .find(|dir| dir.is_dir())
        .unwrap_or_else(|| output_root.join(CodeGenType::VueProject.dir_name(app_id)))
}

/// Resolve a model-supplied path against the app's project root.
///
/// Absolute paths and `..` sequences are rejected, and the result must stay
/// under `output_root`. The error is text meant for the model.
pub fn resolve_file_path(output_root: &Path, app_id: i64, relative: &str) -> Result<PathBuf, String> {
    let candidate = Path::new(relative);
    if candidate.is_absolute() || relative.starts_with('/') || relative.starts_with('\\') {
        return Err(format!(
            "Error: security restriction, absolute paths are not allowed - {}",
            relative
        ));
    }
    if relative.contains("..") {
        return Err(format!(
            "Error: security restriction, path traversal is not allowed - {}",
            relative
        ));
    }

    let resolved = normalize(&resolve_project_root(output_root, app_id).join(candidate));
    if !resolved.starts_with(normalize(output_root)) {
        return Err(format!(
            "Error: security restriction, path is outside the allowed directory - {}",
            relative
        ));
    }

    Ok(resolved)
}

/// Project-relative form of a tool path: no leading `./` or `/`, forward slashes.
pub fn normalize_relative(path: &str) -> String {
    let mut path = path.trim().replace('\\', "/");
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest.to_string();
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest.to_string();
        } else {
            break;
        }
    }
    path
}

/// Lexical normalization: drops `.` components without touching the disk.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_app_defaults_to_vue_project() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_project_root(root.path(), 42),
            root.path().join("vue_project_42")
        );
    }

    #[test]
    fn test_existing_project_dir_wins() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("multi_file_5")).unwrap();
        std::fs::create_dir_all(root.path().join("html_5")).unwrap();
        assert_eq!(resolve_project_root(root.path(), 5), root.path().join("html_5"));

        std::fs::create_dir_all(root.path().join("vue_project_5")).unwrap();
        assert_eq!(
            resolve_project_root(root.path(), 5),
            root.path().join("vue_project_5")
        );
    }

    #[test]
    fn test_resolve_rejects_unsafe_paths() {
        let root = tempfile::tempdir().unwrap();
        assert!(resolve_file_path(root.path(), 1, "/etc/passwd")
            .unwrap_err()
            .contains("absolute"));
        assert!(resolve_file_path(root.path(), 1, "../../secret")
            .unwrap_err()
            .contains("traversal"));
        assert!(resolve_file_path(root.path(), 1, "src/../../x")
            .unwrap_err()
            .contains("traversal"));
    }

    #[test]
    fn test_resolve_joins_under_project() {
        let root = tempfile::tempdir().unwrap();
        let resolved = resolve_file_path(root.path(), 9, "./src/components/Footer.vue").unwrap();
        assert_eq!(
            resolved,
            root.path().join("vue_project_9/src/components/Footer.vue")
        );
    }

    #[test]
    fn test_normalize_relative() {
        assert_eq!(normalize_relative("./src/App.vue"), "src/App.vue");
        assert_eq!(normalize_relative("/src/App.vue"), "src/App.vue");
        assert_eq!(normalize_relative("src\\components\\A.vue"), "src/components/A.vue");
        assert_eq!(normalize_relative(".//src/a.js"), "src/a.js");
    }
}
