//! Store configuration, layered from an optional TOML file and
//! `EAVSTORE_*` environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Path that opens a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreConfig {
  /// Database file; a leading `~/` is expanded, `:memory:` opens in memory.
  #[serde(default = "default_path")]
  pub path:            PathBuf,
  /// How long a writer waits on a locked database before failing.
  #[serde(default)]
  pub busy_timeout_ms: Option<u64>,
}

fn default_path() -> PathBuf { PathBuf::from("eavstore.db") }

impl Default for StoreConfig {
  fn default() -> Self { Self { path: default_path(), busy_timeout_ms: None } }
}

impl StoreConfig {
  /// Read `file` if it exists, then apply `EAVSTORE_*` overrides
  /// (e.g. `EAVSTORE_PATH`, `EAVSTORE_BUSY_TIMEOUT_MS`).
  pub fn load(file: impl AsRef<Path>) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file.as_ref().to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("EAVSTORE"))
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  pub fn in_memory() -> Self { Self { path: PathBuf::from(IN_MEMORY), ..Self::default() } }

  pub fn is_in_memory(&self) -> bool { self.path.as_os_str() == IN_MEMORY }

  /// [`path`](Self::path) with `~/` expanded.
  pub fn resolved_path(&self) -> PathBuf { expand_tilde(&self.path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
