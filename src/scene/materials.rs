//! Versioned material table edited between frames.

use principled_bsdf::Material;

/// Materials of the loaded scene plus a dirty flag.
///
/// Every mutable access marks the table dirty and bumps the version; the
/// frame orchestrator consumes the flag once per frame to re-upload the
/// table and reset accumulation.
#[derive(Debug, Clone, Default)]
pub struct MaterialTable {
    materials: Vec<Material>,
    version: u64,
    dirty: bool,
}

impl MaterialTable {
    pub fn new(materials: Vec<Material>) -> Self {
        Self {
            materials: materials.iter().map(Material::sanitized).collect(),
            version: 1,
            dirty: true,
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[Material] {
        &self.materials
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Material> {
        self.materials.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Replace one material. Values are clamped into their valid ranges.
    /// Writing an identical value does not dirty the table.
    pub fn set(&mut self, index: usize, material: Material) -> bool {
        let material = material.sanitized();
        match self.materials.get_mut(index) {
            Some(slot) if *slot != material => {
                *slot = material;
                self.touch();
                true
            }
            _ => false,
        }
    }

    /// Edit a material in place. The result is sanitized and the table
    /// marked dirty if anything changed.
    pub fn edit<F>(&mut self, index: usize, f: F) -> bool
    where
        F: FnOnce(&mut Material),
    {
        let Some(mut material) = self.materials.get(index).copied() else {
            return false;
        };
        f(&mut material);
        self.set(index, material)
    }

    pub fn push(&mut self, material: Material) -> u32 {
        self.materials.push(material.sanitized());
        self.touch();
        (self.materials.len() - 1) as u32
    }

    /// Replace the whole table (scene switch).
    pub fn replace(&mut self, materials: Vec<Material>) {
        self.materials = materials.iter().map(Material::sanitized).collect();
        self.touch();
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Return and clear the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Flag the table for another upload without changing its contents.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn touch(&mut self) {
        self.version += 1;
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_dirty_consumed_once() {
        let mut table = MaterialTable::new(vec![Material::default()]);
        assert!(table.take_dirty());
        assert!(!table.take_dirty());

        assert!(table.edit(0, |m| m.roughness = 0.9));
        assert_eq!(table.version(), 2);
        assert!(table.take_dirty());
        assert!(!table.is_dirty());
    }

    #[test]
    fn test_identical_write_is_clean() {
        let mut table = MaterialTable::new(vec![Material::diffuse(Vec3::ONE)]);
        table.take_dirty();
        assert!(!table.set(0, Material::diffuse(Vec3::ONE)));
        assert!(!table.is_dirty());
        assert!(!table.set(5, Material::default()));
    }

    #[test]
    fn test_values_clamped() {
        let mut table = MaterialTable::new(vec![Material::default()]);
        table.edit(0, |m| {
            m.metallic = 4.0;
            m.ior = -1.0;
        });
        let m = table.get(0).unwrap();
        assert_eq!(m.metallic, 1.0);
        assert!(m.ior > 0.0);
    }
}
