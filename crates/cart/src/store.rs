//! Persistence of the cart between sessions.
//!
//! The ledger writes the **whole** serialised list after every mutation and
//! reads it once at session start. Stores never see incremental diffs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, anyhow};

use crate::line::CartLine;

/// Well-known key the cart is persisted under.
pub const CART_STORAGE_KEY: &str = "carrito";

/// Durable storage for the serialised cart.
pub trait CartStore: core::fmt::Debug + Send + Sync {
    /// Read the persisted lines, `None` when nothing was persisted.
    fn load(&self) -> anyhow::Result<Option<Vec<CartLine>>>;

    /// Overwrite the persisted lines with `lines`.
    fn save(&self, lines: &[CartLine]) -> anyhow::Result<()>;

    /// Remove the persisted cart.
    fn clear(&self) -> anyhow::Result<()>;
}

/// In-process store; keeps the serialised JSON exactly as a durable store
/// would, which makes it suitable for tests that inspect the persisted form.
///
/// Cheap to clone; clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a raw payload (e.g. a cart from a previous session).
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(raw.into()))),
        }
    }

    /// The raw persisted payload, if any.
    pub fn raw(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

impl CartStore for InMemoryCartStore {
    fn load(&self) -> anyhow::Result<Option<Vec<CartLine>>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("cart store lock poisoned"))?;
        match slot.as_deref() {
            Some(raw) => {
                let lines = serde_json::from_str(raw).context("failed to deserialize persisted cart")?;
                Ok(Some(lines))
            }
            None => Ok(None),
        }
    }

    fn save(&self, lines: &[CartLine]) -> anyhow::Result<()> {
        let payload = serde_json::to_string(lines).context("failed to serialize cart")?;
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("cart store lock poisoned"))?;
        *slot = Some(payload);
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("cart store lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

/// JSON file store: `{dir}/carrito.json`.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// target, so a reader never observes a half-written list.
#[derive(Debug, Clone)]
pub struct FileCartStore {
    path: PathBuf,
}

impl FileCartStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{CART_STORAGE_KEY}.json")),
        }
    }

    /// Store under `{app_data_dir}/storefront/`.
    pub fn in_default_location() -> anyhow::Result<Self> {
        Ok(Self::new(default_data_dir()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

impl CartStore for FileCartStore {
    fn load(&self) -> anyhow::Result<Option<Vec<CartLine>>> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read cart file {:?}", self.path));
            }
        };

        let lines = serde_json::from_str(&data)
            .with_context(|| format!("failed to deserialize cart file {:?}", self.path))?;
        Ok(Some(lines))
    }

    fn save(&self, lines: &[CartLine]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create cart directory at {:?}", parent))?;
        }

        let payload = serde_json::to_vec(lines).context("failed to serialize cart")?;
        let tmp = self.temp_path();
        fs::write(&tmp, payload).with_context(|| format!("failed to write {:?}", tmp))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to move {:?} over {:?}", tmp, self.path))?;
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to remove cart file {:?}", self.path)),
        }
    }
}

/// Resolve `{app_data_dir}/storefront`.
pub fn default_data_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    let mut dir = base;
    dir.push("storefront");
    Ok(dir)
}
