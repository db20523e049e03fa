use crate::arena::Arena;
use crate::device::{BlendFactors, CullMode, TextureId};
use crate::error::{AllocError, MaterialError};
use crate::handle::BlockStore;
use crate::shader::CollectionId;

use super::{Material, MaterialHandle, ParamBlock};

/// Handle-addressed material storage.
///
/// Every operation resolves its handle first; a stale or never-allocated handle
/// yields [`MaterialError::InvalidHandle`] and changes nothing.
#[derive(Debug)]
pub struct MaterialStore {
    blocks: BlockStore<Material>,
    temporaries: Arena<MaterialHandle>,
}

impl MaterialStore {
    pub fn new(address_limit: u32) -> Self {
        Self {
            blocks: BlockStore::new(address_limit),
            temporaries: Arena::with_capacity(16),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn create(&mut self) -> Result<MaterialHandle, AllocError> {
        self.blocks.allocate(Material::default()).map(MaterialHandle)
    }

    pub fn free(&mut self, handle: MaterialHandle) -> Result<(), MaterialError> {
        if !self.blocks.free(handle.0) {
            return Err(MaterialError::InvalidHandle(handle.raw()));
        }
        // An explicitly freed temporary must not be released again at end of frame:
        // its slot may belong to someone else by then.
        if let Some(pos) = self.temporaries.iter().position(|&h| h == handle) {
            self.temporaries.swap_remove(pos);
        }
        Ok(())
    }

    /// Creates a material released by [`release_temporaries`](Self::release_temporaries).
    pub fn create_temporary(&mut self) -> Result<MaterialHandle, MaterialError> {
        let handle = self.create()?;
        self.temporaries.push(handle);
        Ok(handle)
    }

    /// Deep-copies `source` into a new temporary material.
    pub fn clone_temporary(&mut self, source: MaterialHandle) -> Result<MaterialHandle, MaterialError> {
        let copy = self.resolve(source)?.clone();
        let handle = self.blocks.allocate(copy).map(MaterialHandle)?;
        self.temporaries.push(handle);
        Ok(handle)
    }

    /// Frees every temporary material. Returns how many were released.
    pub fn release_temporaries(&mut self) -> usize {
        let mut released = 0;
        for &handle in self.temporaries.iter() {
            if self.blocks.free(handle.0) {
                released += 1;
            }
        }
        self.temporaries.reset();
        released
    }

    #[inline]
    pub fn get(&self, handle: MaterialHandle) -> Option<&Material> {
        self.blocks.get(handle.0)
    }

    #[inline]
    pub fn contains(&self, handle: MaterialHandle) -> bool {
        self.blocks.contains(handle.0)
    }

    pub fn is_transparent(&self, handle: MaterialHandle) -> Result<bool, MaterialError> {
        self.resolve(handle).map(Material::is_transparent)
    }

    /// `Some(factors)` makes the material transparent; `None` makes it opaque.
    pub fn set_blend_mode(
        &mut self,
        handle: MaterialHandle,
        blend: Option<BlendFactors>,
    ) -> Result<(), MaterialError> {
        self.resolve_mut(handle)?.blend = blend;
        Ok(())
    }

    pub fn set_cull(&mut self, handle: MaterialHandle, cull: CullMode) -> Result<(), MaterialError> {
        self.resolve_mut(handle)?.cull = cull;
        Ok(())
    }

    pub fn set_shaders(
        &mut self,
        handle: MaterialHandle,
        shaders: Option<CollectionId>,
    ) -> Result<(), MaterialError> {
        self.resolve_mut(handle)?.shaders = shaders;
        Ok(())
    }

    pub fn set_capabilities(&mut self, handle: MaterialHandle, caps: u32) -> Result<(), MaterialError> {
        self.resolve_mut(handle)?.capabilities = caps;
        Ok(())
    }

    pub fn set_sampler_name(
        &mut self,
        handle: MaterialHandle,
        index: usize,
        name: Option<&str>,
    ) -> Result<(), MaterialError> {
        let material = self.resolve_mut(handle)?;
        let sampler = material
            .samplers
            .get_mut(index)
            .ok_or(MaterialError::SamplerOutOfRange(index))?;
        sampler.set_name(name);
        Ok(())
    }

    pub fn set_sampler_texture(
        &mut self,
        handle: MaterialHandle,
        index: usize,
        texture: Option<TextureId>,
    ) -> Result<(), MaterialError> {
        let material = self.resolve_mut(handle)?;
        let sampler = material
            .samplers
            .get_mut(index)
            .ok_or(MaterialError::SamplerOutOfRange(index))?;
        sampler.texture = texture;
        Ok(())
    }

    /// Copies `bytes` as the fragment-stage block. Empty clears it.
    pub fn set_fragment_parameters(
        &mut self,
        handle: MaterialHandle,
        bytes: &[u8],
    ) -> Result<(), MaterialError> {
        let block = param_block(bytes)?;
        self.resolve_mut(handle)?.fragment_params = block;
        Ok(())
    }

    /// Copies `bytes` as the vertex-stage block. Empty clears it.
    pub fn set_vertex_parameters(
        &mut self,
        handle: MaterialHandle,
        bytes: &[u8],
    ) -> Result<(), MaterialError> {
        let block = param_block(bytes)?;
        self.resolve_mut(handle)?.vertex_params = block;
        Ok(())
    }

    fn resolve(&self, handle: MaterialHandle) -> Result<&Material, MaterialError> {
        self.blocks
            .get(handle.0)
            .ok_or(MaterialError::InvalidHandle(handle.raw()))
    }

    fn resolve_mut(&mut self, handle: MaterialHandle) -> Result<&mut Material, MaterialError> {
        self.blocks
            .get_mut(handle.0)
            .ok_or(MaterialError::InvalidHandle(handle.raw()))
    }
}

fn param_block(bytes: &[u8]) -> Result<Option<ParamBlock>, MaterialError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    ParamBlock::new(bytes)
        .map(Some)
        .ok_or(MaterialError::Misaligned(bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::BlendFactor;
    use crate::handle::SLOT_SPAN;
    use crate::material::MAX_SAMPLERS;

    fn store() -> MaterialStore {
        MaterialStore::new(1 << 23)
    }

    // ── parameters ────────────────────────────────────────────────────────

    #[test]
    fn twenty_byte_block_is_misaligned() {
        let mut s = store();
        let m = s.create().unwrap();
        assert_eq!(
            s.set_fragment_parameters(m, &[0u8; 20]),
            Err(MaterialError::Misaligned(20))
        );
        assert!(s.get(m).unwrap().fragment_params().is_none());
    }

    #[test]
    fn thirty_two_byte_block_is_accepted() {
        let mut s = store();
        let m = s.create().unwrap();
        let bytes: Vec<u8> = (0..32).collect();

        s.set_fragment_parameters(m, &bytes).unwrap();
        assert_eq!(s.get(m).unwrap().fragment_params().unwrap().bytes(), &bytes[..]);
    }

    #[test]
    fn empty_block_clears() {
        let mut s = store();
        let m = s.create().unwrap();
        s.set_vertex_parameters(m, &[1u8; 16]).unwrap();
        s.set_vertex_parameters(m, &[]).unwrap();
        assert!(s.get(m).unwrap().vertex_params().is_none());
    }

    // ── handles ───────────────────────────────────────────────────────────

    #[test]
    fn operations_on_freed_handle_fail_without_effect() {
        let mut s = store();
        let m = s.create().unwrap();
        s.free(m).unwrap();

        assert_eq!(s.set_cull(m, CullMode::None), Err(MaterialError::InvalidHandle(m.raw())));
        assert_eq!(s.free(m), Err(MaterialError::InvalidHandle(m.raw())));
        assert!(s.is_transparent(m).is_err());
    }

    #[test]
    fn blend_mode_drives_transparency() {
        let mut s = store();
        let m = s.create().unwrap();
        assert_eq!(s.is_transparent(m), Ok(false));

        s.set_blend_mode(m, Some(BlendFactors::new(BlendFactor::SrcAlpha, BlendFactor::InvSrcAlpha)))
            .unwrap();
        assert_eq!(s.is_transparent(m), Ok(true));
    }

    #[test]
    fn sampler_index_is_bounded() {
        let mut s = store();
        let m = s.create().unwrap();
        assert_eq!(
            s.set_sampler_name(m, MAX_SAMPLERS, Some("tex")),
            Err(MaterialError::SamplerOutOfRange(MAX_SAMPLERS))
        );
    }

    // ── temporaries ───────────────────────────────────────────────────────

    #[test]
    fn clone_deep_copies_parameters_and_shares_textures() {
        let mut s = store();
        let src = s.create().unwrap();
        s.set_fragment_parameters(src, &[5u8; 16]).unwrap();
        s.set_sampler_name(src, 0, Some("diffuse")).unwrap();
        s.set_sampler_texture(src, 0, Some(TextureId(3))).unwrap();

        let copy = s.clone_temporary(src).unwrap();
        s.set_fragment_parameters(copy, &[6u8; 16]).unwrap();

        assert_eq!(s.get(src).unwrap().fragment_params().unwrap().bytes(), &[5u8; 16]);
        assert_eq!(s.get(copy).unwrap().samplers()[0].texture(), Some(TextureId(3)));
        assert_eq!(s.get(copy).unwrap().samplers()[0].name(), Some("diffuse"));
    }

    #[test]
    fn release_frees_only_temporaries() {
        let mut s = store();
        let keep = s.create().unwrap();
        let t1 = s.create_temporary().unwrap();
        let t2 = s.clone_temporary(keep).unwrap();

        assert_eq!(s.release_temporaries(), 2);
        assert!(s.contains(keep));
        assert!(!s.contains(t1));
        assert!(!s.contains(t2));
    }

    #[test]
    fn explicitly_freed_temporary_is_not_released_twice() {
        let mut s = store();
        let t = s.create_temporary().unwrap();
        s.free(t).unwrap();

        // Slot is recycled by a long-lived material under a new handle.
        let keep = s.create().unwrap();
        assert_ne!(keep, t);

        assert_eq!(s.release_temporaries(), 0);
        assert!(s.contains(keep));
    }

    #[test]
    fn released_temporary_does_not_reach_recycled_material() {
        let mut s = store();
        let t = s.create_temporary().unwrap();
        s.release_temporaries();
        let fresh = s.create().unwrap();

        assert!(s.get(t).is_none());
        assert_eq!(s.set_cull(t, CullMode::None), Err(MaterialError::InvalidHandle(t.raw())));
        assert_eq!(s.get(fresh).unwrap().cull(), CullMode::Ccw);
    }

    #[test]
    fn handles_stay_below_the_address_limit() {
        let limit = 8 * SLOT_SPAN;
        let mut s = MaterialStore::new(limit);
        let mut live = Vec::new();
        for round in 0..500 {
            if round % 4 == 3 {
                if let Some(h) = live.pop() {
                    s.free(h).unwrap();
                }
            } else if let Ok(h) = s.create_temporary() {
                assert!(h.raw() >= 1 && h.raw() < limit);
                live.push(h);
            }
            if round % 50 == 49 {
                s.release_temporaries();
                live.clear();
            }
        }
    }
}
