use crate::device::ProgramId;
use crate::error::ShaderError;

use super::{Shader, ShaderCollection};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ShaderId(pub(crate) u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CollectionId(pub(crate) u32);

/// Owns shaders and collections. Materials reference them by id.
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    shaders: Vec<Shader>,
    collections: Vec<Option<ShaderCollection>>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a backend program compiled elsewhere.
    pub fn create_shader(&mut self, program: ProgramId) -> ShaderId {
        let id = ShaderId(self.shaders.len() as u32);
        self.shaders.push(Shader::new(program));
        id
    }

    #[inline]
    pub fn shader(&self, id: ShaderId) -> Option<&Shader> {
        self.shaders.get(id.0 as usize)
    }

    #[inline]
    pub fn shader_mut(&mut self, id: ShaderId) -> Option<&mut Shader> {
        self.shaders.get_mut(id.0 as usize)
    }

    pub fn create_collection(&mut self) -> CollectionId {
        // Reuse a destroyed slot first.
        if let Some(i) = self.collections.iter().position(Option::is_none) {
            self.collections[i] = Some(ShaderCollection::new());
            return CollectionId(i as u32);
        }
        let id = CollectionId(self.collections.len() as u32);
        self.collections.push(Some(ShaderCollection::new()));
        id
    }

    pub fn destroy_collection(&mut self, id: CollectionId) -> Result<(), ShaderError> {
        match self.collections.get_mut(id.0 as usize) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                Ok(())
            }
            _ => Err(ShaderError::UnknownCollection(id.0)),
        }
    }

    pub fn add_default_shader(
        &mut self,
        collection: CollectionId,
        caps: u32,
        shader: ShaderId,
    ) -> Result<(), ShaderError> {
        self.check_shader(shader)?;
        self.collection_mut(collection)?.add_default(caps, shader)
    }

    pub fn add_vertex_shader(
        &mut self,
        collection: CollectionId,
        layout_hash: u64,
        caps: u32,
        shader: ShaderId,
    ) -> Result<(), ShaderError> {
        self.check_shader(shader)?;
        self.collection_mut(collection)?
            .add_for_layout(layout_hash, caps, shader)
    }

    pub fn lookup(&self, collection: CollectionId, layout_hash: u64, caps: u32) -> Option<ShaderId> {
        self.collections
            .get(collection.0 as usize)?
            .as_ref()?
            .lookup(layout_hash, caps)
    }

    fn check_shader(&self, shader: ShaderId) -> Result<(), ShaderError> {
        match self.shader(shader) {
            Some(_) => Ok(()),
            None => Err(ShaderError::UnknownShader(shader.0)),
        }
    }

    fn collection_mut(&mut self, id: CollectionId) -> Result<&mut ShaderCollection, ShaderError> {
        self.collections
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(ShaderError::UnknownCollection(id.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_goes_through_collection() {
        let mut lib = ShaderLibrary::new();
        let s = lib.create_shader(ProgramId(10));
        let c = lib.create_collection();
        lib.add_vertex_shader(c, 42, 0, s).unwrap();

        assert_eq!(lib.lookup(c, 42, 0), Some(s));
        assert_eq!(lib.shader(s).unwrap().program(), ProgramId(10));
    }

    #[test]
    fn destroyed_collection_resolves_nothing_and_slot_is_reused() {
        let mut lib = ShaderLibrary::new();
        let s = lib.create_shader(ProgramId(1));
        let c = lib.create_collection();
        lib.add_default_shader(c, 0, s).unwrap();

        lib.destroy_collection(c).unwrap();
        assert_eq!(lib.lookup(c, 0, 0), None);
        assert_eq!(lib.destroy_collection(c), Err(ShaderError::UnknownCollection(c.0)));

        let again = lib.create_collection();
        assert_eq!(again, c);
        assert_eq!(lib.lookup(again, 0, 0), None);
    }

    #[test]
    fn unknown_shader_is_rejected() {
        let mut lib = ShaderLibrary::new();
        let c = lib.create_collection();
        assert_eq!(
            lib.add_default_shader(c, 0, ShaderId(5)),
            Err(ShaderError::UnknownShader(5))
        );
    }
}
