use crate::data::Triangle;
use std::ops::Range;

/// Flat, append-only storage of object-space triangles for every mesh in a batch.
#[derive(Debug, Default, Clone)]
pub struct TriangleStore {
    triangles: Vec<Triangle>,
}

impl TriangleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `triangles` and returns the index range they occupy.
    pub fn append(&mut self, triangles: &[Triangle]) -> Range<u32> {
        let start = self.triangles.len() as u32;
        self.triangles.extend_from_slice(triangles);
        start..self.triangles.len() as u32
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&Triangle> {
        self.triangles.get(index as usize)
    }

    pub fn as_slice(&self) -> &[Triangle] {
        &self.triangles
    }
}
