//! Texture registry
//!
//! Maps opaque texture ids to their sampler metadata. Textures are created
//! and owned by collaborators; the registry only tracks which ids are live
//! so the renderer can treat unregistered ids as unbound and clear stale
//! bindings on deletion.

use hashbrown::HashMap;

use crate::context::TextureId;
use crate::sampler::SamplerState;

#[derive(Debug, Default)]
pub struct TextureRegistry {
    entries: HashMap<TextureId, SamplerState>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a created texture and its sampler metadata. Re-registering an
    /// id replaces the metadata.
    pub fn register(&mut self, id: TextureId, sampler: SamplerState) {
        if id == TextureId::INVALID {
            return;
        }
        self.entries.insert(id, sampler);
    }

    /// Forget a deleted texture. Returns its metadata if it was known.
    pub fn remove(&mut self, id: TextureId) -> Option<SamplerState> {
        self.entries.remove(&id)
    }

    pub fn contains(&self, id: TextureId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn sampler(&self, id: TextureId) -> Option<&SamplerState> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything; used on context loss when every handle is stale.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::FilterMode;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = TextureRegistry::new();
        let sampler = SamplerState {
            mag_filter: FilterMode::Linear,
            ..SamplerState::default()
        };
        registry.register(TextureId(5), sampler);
        assert!(registry.contains(TextureId(5)));
        assert_eq!(registry.sampler(TextureId(5)), Some(&sampler));
    }

    #[test]
    fn test_invalid_id_never_registers() {
        let mut registry = TextureRegistry::new();
        registry.register(TextureId::INVALID, SamplerState::default());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut registry = TextureRegistry::new();
        assert!(registry.remove(TextureId(9)).is_none());
    }
}
