//! 工作目录沙箱
//!
//! Workspace 绑定 root，所有路径先做词法归一化，再把已存在的最长前缀解析为真实路径（跟随符号链接），
//! 结果必须仍在 root 下。protected_files 以同样方式解析，落在其下的路径禁止写入与删除。

use std::path::{Component, Path, PathBuf};

use crate::config::AgentEnvironment;
use crate::tools::ToolError;

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    protected: Vec<PathBuf>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Workspace {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let root = root.canonicalize().unwrap_or(root);
        Self {
            root,
            protected: Vec::new(),
        }
    }

    /// 读取工作目录与 `protected_files`
    pub fn from_env(env: &AgentEnvironment) -> Self {
        let protected: Vec<String> = env.get_config_or("protected_files", Vec::new());
        Self::new(env.working_dir()).with_protected(&protected)
    }

    /// 越界的受保护路径直接忽略
    pub fn with_protected<S: AsRef<str>>(mut self, paths: &[S]) -> Self {
        self.protected = paths
            .iter()
            .filter_map(|p| self.resolve(p.as_ref()).ok())
            .collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 解析为 root 下的绝对路径
    pub fn resolve(&self, rel: &str) -> Result<PathBuf, ToolError> {
        let joined = normalize(&self.root.join(rel));
        let resolved = resolve_existing_prefix(&joined);
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(ToolError::OutsideWorkspace(rel.to_string()))
        }
    }

    /// 路径本身或其祖先是受保护路径
    pub fn is_protected(&self, abs: &Path) -> bool {
        self.protected.iter().any(|p| abs.starts_with(p))
    }

    /// 目录下包含受保护路径（删除目录前检查）
    pub fn contains_protected(&self, abs_dir: &Path) -> bool {
        self.protected.iter().any(|p| p.starts_with(abs_dir))
    }

    /// 解析并拒绝受保护路径
    pub fn resolve_writable(&self, rel: &str) -> Result<PathBuf, ToolError> {
        let abs = self.resolve(rel)?;
        if self.is_protected(&abs) {
            return Err(ToolError::Protected(rel.to_string()));
        }
        Ok(abs)
    }
}

/// 词法归一化：去掉 `.`，`..` 弹出上一级（不越过根）
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// 对已存在的最长前缀做 canonicalize，其余部分原样拼回
fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut rest = Vec::new();
    loop {
        if let Ok(canon) = existing.canonicalize() {
            let mut out = canon;
            for part in rest.iter().rev() {
                out.push(part);
            }
            return out;
        }
        match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name);
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_inside_and_missing_paths() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        let p = ws.resolve("a/b/../c.txt").unwrap();
        assert_eq!(p, ws.root().join("a/c.txt"));
        assert_eq!(ws.resolve(".").unwrap(), ws.root());
    }

    #[test]
    fn test_escape_is_rejected() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        assert!(matches!(ws.resolve("../x"), Err(ToolError::OutsideWorkspace(_))));
        assert!(matches!(ws.resolve("/etc/passwd"), Err(ToolError::OutsideWorkspace(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_rejected() {
        let outside = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let ws = Workspace::new(dir.path());
        assert!(matches!(ws.resolve("link/f.txt"), Err(ToolError::OutsideWorkspace(_))));
    }

    #[test]
    fn test_protected_paths() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path()).with_protected(&[".waa", "../outside"]);
        let inner = ws.resolve(".waa/config.json").unwrap();
        assert!(ws.is_protected(&inner));
        assert!(ws.contains_protected(ws.root()));
        assert!(matches!(
            ws.resolve_writable(".waa/config.json"),
            Err(ToolError::Protected(_))
        ));
        assert!(ws.resolve_writable("index.html").is_ok());
    }
}
