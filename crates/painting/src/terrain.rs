//! Terrain collaborator interface.

use glam::Vec3;
use tracing::debug;

use crate::height_field::{HeightField, HeightRegion};

/// The terrain whose height field is painted.
///
/// The painting core never reconstructs these values; it only reads and
/// writes whole regions through this trait.
pub trait TerrainTarget {
    /// Height samples per edge
    fn resolution(&self) -> u32;

    /// World position of the terrain's origin corner
    fn world_position(&self) -> Vec3;

    /// World size (X, max height, Z)
    fn world_size(&self) -> Vec3;

    /// Copy out a region of the height field
    fn heights(&self, region: HeightRegion) -> HeightField;

    /// Overwrite a region of the height field
    fn set_heights(&mut self, region: HeightRegion, heights: &HeightField);

    /// Whether a world point lies over the terrain on the horizontal plane
    fn contains_xz(&self, point: Vec3) -> bool {
        let pos = self.world_position();
        let size = self.world_size();
        point.x >= pos.x && point.x <= pos.x + size.x && point.z >= pos.z && point.z <= pos.z + size.z
    }
}

/// Pick the first terrain whose horizontal footprint contains `anchor`.
///
/// Height is ignored since paths may float above the surface.
pub fn find_terrain_under<'a, T: TerrainTarget + ?Sized>(
    terrains: impl IntoIterator<Item = &'a T>,
    anchor: Vec3,
) -> Option<usize>
where
    T: 'a,
{
    let found = terrains
        .into_iter()
        .position(|terrain| terrain.contains_xz(anchor));
    debug!("find_terrain_under({:?}) -> {:?}", anchor, found);
    found
}

/// Terrain held entirely in memory, for headless tools and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryTerrain {
    pub position: Vec3,
    pub size: Vec3,
    heights: HeightField,
    /// Number of `set_heights` calls, for observing writes
    writes: usize,
}

impl MemoryTerrain {
    /// Flat terrain of the given resolution
    pub fn new(resolution: u32, position: Vec3, size: Vec3) -> Self {
        Self {
            position,
            size,
            heights: HeightField::square(resolution, 0.0),
            writes: 0,
        }
    }

    /// Terrain with existing samples. The field must be square.
    pub fn with_heights(heights: HeightField, position: Vec3, size: Vec3) -> Option<Self> {
        heights.resolution()?;
        Some(Self {
            position,
            size,
            heights,
            writes: 0,
        })
    }

    /// The full height field
    pub fn height_field(&self) -> &HeightField {
        &self.heights
    }

    /// How many times the field has been written
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl TerrainTarget for MemoryTerrain {
    fn resolution(&self) -> u32 {
        self.heights.width()
    }

    fn world_position(&self) -> Vec3 {
        self.position
    }

    fn world_size(&self) -> Vec3 {
        self.size
    }

    fn heights(&self, region: HeightRegion) -> HeightField {
        self.heights.region(region)
    }

    fn set_heights(&mut self, region: HeightRegion, heights: &HeightField) {
        let clipped = heights.region(HeightRegion {
            x: 0,
            y: 0,
            width: region.width,
            height: region.height,
        });
        self.heights.write_region(region.x, region.y, &clipped);
        self.writes += 1;
    }
}
