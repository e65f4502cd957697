//! Local preview handles for the selected image.
//!
//! A [`PreviewHandle`] is the client's counterpart to a browser object URL:
//! it names locally held image bytes so the rendering surface can show the
//! original without going back to disk. Each handle owns its registry entry
//! and releases it on drop.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::debug;

const PREVIEW_SCHEME: &str = "preview://";

pub type PreviewId = u64;

struct PreviewEntry {
    name: String,
    bytes: Arc<[u8]>,
}

#[derive(Default)]
struct RegistryState {
    next_id: PreviewId,
    entries: HashMap<PreviewId, PreviewEntry>,
}

#[derive(Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, name: &str, bytes: Arc<[u8]>) -> PreviewHandle {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.entries.insert(
            id,
            PreviewEntry {
                name: name.to_string(),
                bytes,
            },
        );
        debug!(preview_id = id, live = state.entries.len(), "preview: acquired");
        PreviewHandle {
            id,
            uri: format!("{PREVIEW_SCHEME}{id}/{name}"),
            registry: self.clone(),
        }
    }

    /// Looks up the bytes behind a `preview://` URI while its handle is alive.
    pub fn resolve(&self, uri: &str) -> Option<Arc<[u8]>> {
        let id = parse_preview_id(uri)?;
        self.lock()
            .entries
            .get(&id)
            .map(|entry| Arc::clone(&entry.bytes))
    }

    pub fn live_count(&self) -> usize {
        self.lock().entries.len()
    }

    fn release(&self, id: PreviewId) {
        let mut state = self.lock();
        if let Some(entry) = state.entries.remove(&id) {
            debug!(
                preview_id = id,
                name = %entry.name,
                live = state.entries.len(),
                "preview: released"
            );
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn parse_preview_id(uri: &str) -> Option<PreviewId> {
    let rest = uri.strip_prefix(PREVIEW_SCHEME)?;
    let id = rest.split('/').next()?;
    id.parse().ok()
}

/// Exclusively owned registry entry; dropping it revokes the URI.
pub struct PreviewHandle {
    id: PreviewId,
    uri: String,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    pub fn id(&self) -> PreviewId {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("id", &self.id)
            .field("uri", &self.uri)
            .finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_handle_revokes_uri() {
        let registry = PreviewRegistry::new();
        let handle = registry.acquire("cat.jpg", Arc::from(&b"jpeg"[..]));
        let uri = handle.uri().to_string();
        assert!(uri.starts_with("preview://"));
        assert_eq!(registry.resolve(&uri).as_deref(), Some(&b"jpeg"[..]));

        drop(handle);
        assert!(registry.resolve(&uri).is_none());
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn ids_are_never_reused() {
        let registry = PreviewRegistry::new();
        let first = registry.acquire("a.png", Arc::from(&b"a"[..]));
        let first_id = first.id();
        drop(first);
        let second = registry.acquire("b.png", Arc::from(&b"b"[..]));
        assert_ne!(first_id, second.id());
    }

    #[test]
    fn resolve_rejects_foreign_uris() {
        let registry = PreviewRegistry::new();
        let _handle = registry.acquire("a.png", Arc::from(&b"a"[..]));
        assert!(registry.resolve("blob:1").is_none());
        assert!(registry.resolve("preview://not-a-number/a.png").is_none());
    }
}
