//! keepalived.conf rendering.

use askama::Template;
use common::{Error, Result};
use failover::ConfigSnapshot;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::debug;

/// Snapshot view rendered into the keepalived configuration grammar.
///
/// The template is compiled in, so a malformed template or a field
/// reference that no longer exists fails the build instead of a tick.
#[derive(Template)]
#[template(path = "keepalived.conf", escape = "none")]
struct KeepalivedConf<'a> {
    interface: &'a str,
    track_interface: &'a str,
    self_address: &'a str,
    vip: &'a str,
    virtual_router_id: u8,
    priority: u8,
    neighbors: &'a [String],
}

impl<'a> From<&'a ConfigSnapshot> for KeepalivedConf<'a> {
    fn from(snapshot: &'a ConfigSnapshot) -> Self {
        Self {
            interface: &snapshot.interface,
            track_interface: &snapshot.track_interface,
            self_address: &snapshot.self_address,
            vip: &snapshot.vip,
            virtual_router_id: snapshot.virtual_router_id,
            priority: snapshot.priority,
            neighbors: &snapshot.neighbors,
        }
    }
}

/// Writes snapshots to the daemon's config file path.
pub struct Renderer {
    config_path: PathBuf,
}

impl Renderer {
    /// Create a renderer targeting the given config file path.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Render a snapshot to its keepalived.conf text.
    pub fn render(snapshot: &ConfigSnapshot) -> Result<String> {
        KeepalivedConf::from(snapshot)
            .render()
            .map_err(Error::template)
    }

    /// Render and write the config file.
    ///
    /// The rendered text lands in a temp file in the target directory and
    /// is renamed over the config path, so the daemon either sees the old
    /// complete file or the new complete file, never a partial write.
    pub fn write(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        let text = Self::render(snapshot)?;

        let dir = self.config_path.parent().ok_or_else(|| {
            Error::config(format!(
                "config path {} has no parent directory",
                self.config_path.display()
            ))
        })?;

        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(text.as_bytes())?;
        staged.flush()?;
        staged
            .persist(&self.config_path)
            .map_err(|e| Error::Io(e.error))?;

        debug!(path = %self.config_path.display(), bytes = text.len(), "wrote keepalived config");
        Ok(())
    }
}
