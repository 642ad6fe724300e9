//! The fixture window's state file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FixtureError, Result};
use crate::geometry::Point;
use crate::wait::DEFAULT_INTERVAL;

/// Window state as last written by the fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    #[serde(default = "d_100")]
    pub x: i32,
    #[serde(default = "d_100")]
    pub y: i32,
    #[serde(default = "d_800")]
    pub width: i32,
    #[serde(default = "d_600")]
    pub height: i32,
    #[serde(default)]
    pub button_clicks: Vec<String>,
    #[serde(default)]
    pub entry_text: String,
    #[serde(default)]
    pub entry2_text: String,
    #[serde(default)]
    pub ready: bool,
}

impl Default for WindowSnapshot {
    fn default() -> Self {
        Self {
            x: d_100(),
            y: d_100(),
            width: d_800(),
            height: d_600(),
            button_clicks: Vec::new(),
            entry_text: String::new(),
            entry2_text: String::new(),
            ready: false,
        }
    }
}

fn d_100() -> i32 {
    100
}
fn d_800() -> i32 {
    800
}
fn d_600() -> i32 {
    600
}

impl WindowSnapshot {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    /// Translate a window-relative point into screen coordinates.
    pub fn absolute(&self, rel: Point) -> Point {
        Point::new(self.x + rel.x, self.y + rel.y)
    }

    pub fn clicks_of(&self, button: &str) -> usize {
        self.button_clicks.iter().filter(|b| *b == button).count()
    }
}

/// Reader for the state file. Keeps the last good snapshot so a missing or
/// half-written file never produces a regression.
#[derive(Debug)]
pub struct SnapshotFile {
    path: PathBuf,
    last: WindowSnapshot,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last: WindowSnapshot::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file. A missing file or one that does not parse yields
    /// the previous snapshot (defaults before the first good read).
    pub fn read(&mut self) -> WindowSnapshot {
        match self.try_read() {
            Ok(Some(snapshot)) => self.last = snapshot,
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "snapshot unreadable");
            }
        }
        self.last.clone()
    }

    fn try_read(&self) -> Result<Option<WindowSnapshot>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(FixtureError::Snapshot {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        // Partial writes are expected while the fixture is rewriting.
        Ok(serde_json::from_str(&raw).ok())
    }

    /// Wait until the fixture reports `ready`.
    pub async fn wait_ready(&mut self, timeout: Duration) -> Result<WindowSnapshot> {
        self.wait_until(|s| s.ready, timeout)
            .await
            .map_err(|_| FixtureError::NotReady(timeout))
    }

    /// Poll until `pred` holds for a fresh snapshot.
    pub async fn wait_until<P>(&mut self, mut pred: P, timeout: Duration) -> Result<WindowSnapshot>
    where
        P: FnMut(&WindowSnapshot) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let snapshot = self.read();
            if pred(&snapshot) {
                return Ok(snapshot);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(FixtureError::Timeout(timeout));
            }
            tokio::time::sleep(DEFAULT_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let snap: WindowSnapshot = serde_json::from_str(r#"{"ready": true}"#).unwrap();
        assert!(snap.ready);
        assert_eq!(snap.position(), Point::new(100, 100));
        assert_eq!(snap.size(), (800, 600));
        assert!(snap.button_clicks.is_empty());
    }

    #[test]
    fn absolute_offsets_by_window_origin() {
        let snap = WindowSnapshot {
            x: 20,
            y: 30,
            ..Default::default()
        };
        assert_eq!(snap.absolute(Point::new(150, 200)), Point::new(170, 230));
    }

    #[test]
    fn counts_clicks_per_button() {
        let snap = WindowSnapshot {
            button_clicks: vec!["button1".into(), "button2".into(), "button1".into()],
            ..Default::default()
        };
        assert_eq!(snap.clicks_of("button1"), 2);
        assert_eq!(snap.clicks_of("button3"), 0);
    }
}
