use std::path::{Component, Path, PathBuf};

/// Resolves paths written in a config file relative to that file's directory.
#[derive(Clone, Debug)]
pub struct PathResolver {
    base_dir: PathBuf,
}

impl PathResolver {
    pub fn new(config_path: &Path) -> Self {
        let base_dir = config_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();
        Self { base_dir }
    }

    pub fn resolve_opt_str(&self, p: &mut Option<String>) {
        if let Some(s) = p.as_mut() {
            self.resolve_str(s);
        }
    }

    /// Blank and absolute values are left untouched.
    pub fn resolve_str(&self, s: &mut String) {
        if s.trim().is_empty() {
            return;
        }
        let pb = PathBuf::from(&*s);
        if pb.is_absolute() {
            return;
        }
        *s = self.join_clean(&pb).to_string_lossy().to_string();
    }

    fn join_clean(&self, rel: &Path) -> PathBuf {
        let mut out = PathBuf::new();
        for c in self.base_dir.join(rel).components() {
            match c {
                Component::CurDir => {}
                Component::ParentDir => {
                    out.pop();
                }
                Component::RootDir | Component::Prefix(_) | Component::Normal(_) => {
                    out.push(c.as_os_str())
                }
            }
        }
        out
    }
}
