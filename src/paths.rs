use std::{
    io,
    path::{Path, PathBuf},
};

const ROOT_MARKER: &str = "$ROOT";

const CONFIG_FILE: &str = "config.toml";
const MAPPING_FILE: &str = "mapping.toml";
const MARKERS_DIR: &str = "calibration";

/// Location of the files kept between runs
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    fn default_root() -> PathBuf {
        dirs::config_dir()
            .map(|mut path| {
                path.push("ambicam");
                path
            })
            .unwrap_or_else(|| PathBuf::from(".ambicam"))
    }

    pub fn new(root: Option<PathBuf>) -> Self {
        let root = root.unwrap_or_else(Self::default_root);
        debug!(path = %root.display(), "found state root");

        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn mapping_file(&self) -> PathBuf {
        self.root.join(MAPPING_FILE)
    }

    pub fn markers_dir(&self) -> PathBuf {
        self.root.join(MARKERS_DIR)
    }

    pub fn marker_path(&self, index: usize) -> PathBuf {
        self.markers_dir().join(format!("{}.jpg", index))
    }

    /// Remove the marker directory and everything in it, then create it again
    pub async fn reset_markers_dir(&self) -> io::Result<PathBuf> {
        let dir = self.markers_dir();

        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(path = %dir.display(), "removed marker directory"),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => return Err(error),
        }

        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Resolve a configured path, `$ROOT` standing for the state directory
    pub fn resolve_path(&self, p: impl Into<PathBuf>) -> PathBuf {
        let p: PathBuf = p.into();

        if p.is_absolute() {
            trace!(path = %p.display(), "left unchanged");
            return p;
        }

        let mut out_path = PathBuf::new();
        let mut components = p.components().peekable();

        if let Some(component) = components.peek() {
            if component.as_os_str().to_str() == Some(ROOT_MARKER) {
                out_path.push(&self.root);
                components.next();
            }
        }

        out_path.extend(components);

        trace!(src = %p.display(), dst = %out_path.display(), "remapped path");
        out_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_files_live_under_root() {
        let paths = Paths::new(Some("/var/lib/ambicam".into()));

        assert_eq!(paths.config_file(), Path::new("/var/lib/ambicam/config.toml"));
        assert_eq!(paths.mapping_file(), Path::new("/var/lib/ambicam/mapping.toml"));
        assert_eq!(
            paths.marker_path(12),
            Path::new("/var/lib/ambicam/calibration/12.jpg")
        );
    }

    #[test]
    fn resolve_root_marker() {
        let paths = Paths::new(Some("/var/lib/ambicam".into()));

        assert_eq!(
            paths.resolve_path("$ROOT/frame.jpg"),
            Path::new("/var/lib/ambicam/frame.jpg")
        );
        assert_eq!(paths.resolve_path("/tmp/frame.jpg"), Path::new("/tmp/frame.jpg"));
        assert_eq!(paths.resolve_path("frame.jpg"), Path::new("frame.jpg"));
    }

    #[tokio::test]
    async fn reset_markers_dir_removes_old_markers() {
        let root = std::env::temp_dir().join(format!("ambicam-paths-{}", std::process::id()));
        let paths = Paths::new(Some(root.clone()));

        paths.reset_markers_dir().await.unwrap();
        tokio::fs::write(paths.marker_path(0), b"old").await.unwrap();

        paths.reset_markers_dir().await.unwrap();
        assert!(paths.markers_dir().is_dir());
        assert!(!paths.marker_path(0).exists());

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
