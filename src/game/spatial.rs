//! Spatial hash grid for broad-phase queries
//!
//! Divides the world into square cells and buckets entity heads, sampled
//! body points and food by cell. The grid is cleared and repopulated once
//! per tick; nothing survives a rebuild.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::game::state::{EntityId, FoodId};
use crate::util::vec2::Vec2;

/// Initial capacity for the cell map (number of expected non-empty cells)
const GRID_INITIAL_CAPACITY: usize = 512;

/// Initial capacity for occupant vectors within cells
const CELL_INITIAL_CAPACITY: usize = 8;

/// Grid cell key - (x, y) cell coordinates
pub type CellKey = (i32, i32);

/// What a grid entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occupant {
    /// Entity head
    Head(EntityId),
    /// Sampled trail point of an entity
    Body(EntityId),
    Food(FoodId),
}

impl Occupant {
    /// Owning entity for heads and bodies
    pub fn entity(&self) -> Option<EntityId> {
        match *self {
            Occupant::Head(id) | Occupant::Body(id) => Some(id),
            Occupant::Food(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SpatialEntry {
    pub occupant: Occupant,
    pub position: Vec2,
}

/// Spatial hash grid rebuilt every tick
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f32,
    /// Inverse cell size for fast position-to-cell conversion
    inv_cell_size: f32,
    cells: HashMap<CellKey, Vec<SpatialEntry>>,
}

impl SpatialIndex {
    pub fn new(cell_size: f32) -> Self {
        let cell_size = cell_size.max(1.0);
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::with_capacity(GRID_INITIAL_CAPACITY),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Clear all occupants, keeping cell allocations for the next rebuild
    #[inline]
    pub fn clear(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
    }

    #[inline]
    fn position_to_cell(&self, position: Vec2) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.y * self.inv_cell_size).floor() as i32,
        )
    }

    #[inline]
    fn insert(&mut self, occupant: Occupant, position: Vec2) {
        if !position.is_finite() {
            return;
        }
        let key = self.position_to_cell(position);
        self.cells
            .entry(key)
            .or_insert_with(|| Vec::with_capacity(CELL_INITIAL_CAPACITY))
            .push(SpatialEntry { occupant, position });
    }

    /// Insert an entity head plus every `stride`-th trail point (and the tail)
    pub fn insert_entity<'a, I>(&mut self, id: EntityId, head: Vec2, trail: I, stride: usize)
    where
        I: ExactSizeIterator<Item = &'a Vec2>,
    {
        self.insert(Occupant::Head(id), head);

        let stride = stride.max(1);
        let last = trail.len().saturating_sub(1);
        for (i, point) in trail.enumerate() {
            if i % stride == 0 || i == last {
                self.insert(Occupant::Body(id), *point);
            }
        }
    }

    pub fn insert_food(&mut self, id: FoodId, position: Vec2) {
        self.insert(Occupant::Food(id), position);
    }

    /// Visit every occupant within `radius` of `center` (exact distance filter)
    pub fn for_each_in_radius<F>(&self, center: Vec2, radius: f32, mut visit: F)
    where
        F: FnMut(&SpatialEntry),
    {
        if !center.is_finite() || !(radius >= 0.0) {
            return;
        }

        let radius_sq = radius * radius;
        let mut visit_cell = |cell: &Vec<SpatialEntry>| {
            for entry in cell {
                if entry.position.distance_sq_to(center) <= radius_sq {
                    visit(entry);
                }
            }
        };

        // Windows wider than the occupied grid scan the occupied cells instead
        let reach = (radius * self.inv_cell_size).ceil().min(i32::MAX as f32) as i64;
        let window = (2 * reach + 1).saturating_mul(2 * reach + 1);
        if window > self.cells.len() as i64 {
            self.cells.values().for_each(|cell| visit_cell(cell));
            return;
        }

        let (cx, cy) = self.position_to_cell(center);
        let reach = reach as i32;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                if let Some(cell) = self.cells.get(&(cx.saturating_add(dx), cy.saturating_add(dy))) {
                    visit_cell(cell);
                }
            }
        }
    }

    /// All occupants within `radius` of `center`
    pub fn query_radius(&self, center: Vec2, radius: f32) -> SmallVec<[SpatialEntry; 32]> {
        let mut out = SmallVec::new();
        self.for_each_in_radius(center, radius, |entry| out.push(*entry));
        out
    }

    /// Entities whose head lies within `radius`
    pub fn query_entities(&self, center: Vec2, radius: f32) -> SmallVec<[EntityId; 16]> {
        let mut out = SmallVec::new();
        self.for_each_in_radius(center, radius, |entry| {
            if let Occupant::Head(id) = entry.occupant {
                out.push(id);
            }
        });
        out
    }

    /// Distinct entities with a head or body sample within `radius`
    pub fn query_bodies(&self, center: Vec2, radius: f32) -> SmallVec<[EntityId; 16]> {
        let mut out: SmallVec<[EntityId; 16]> = SmallVec::new();
        self.for_each_in_radius(center, radius, |entry| {
            if let Some(id) = entry.occupant.entity() {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        });
        out
    }

    /// Food items within `radius`
    pub fn query_food(&self, center: Vec2, radius: f32) -> SmallVec<[FoodId; 32]> {
        let mut out = SmallVec::new();
        self.for_each_in_radius(center, radius, |entry| {
            if let Occupant::Food(id) = entry.occupant {
                out.push(id);
            }
        });
        out
    }

    /// Distance to the closest head or body sample within `radius`
    pub fn nearest_entity_distance(&self, center: Vec2, radius: f32) -> Option<f32> {
        let mut nearest_sq: Option<f32> = None;
        self.for_each_in_radius(center, radius, |entry| {
            if entry.occupant.entity().is_some() {
                let d = entry.position.distance_sq_to(center);
                if nearest_sq.map_or(true, |n| d < n) {
                    nearest_sq = Some(d);
                }
            }
        });
        nearest_sq.map(f32::sqrt)
    }

    /// Get statistics about the grid
    pub fn stats(&self) -> SpatialIndexStats {
        let non_empty_cells = self.cells.values().filter(|c| !c.is_empty()).count();
        let total_entries: usize = self.cells.values().map(|c| c.len()).sum();
        let max_per_cell = self.cells.values().map(|c| c.len()).max().unwrap_or(0);

        SpatialIndexStats {
            non_empty_cells,
            total_entries,
            max_per_cell,
        }
    }
}

/// Statistics about the spatial index
#[derive(Debug, Clone, Default)]
pub struct SpatialIndexStats {
    pub non_empty_cells: usize,
    pub total_entries: usize,
    pub max_per_cell: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_radius_exact_filter() {
        let mut index = SpatialIndex::new(100.0);
        index.insert_food(1, Vec2::new(50.0, 50.0));
        index.insert_food(2, Vec2::new(149.0, 50.0));
        index.insert_food(3, Vec2::new(151.0, 50.0));

        let found = index.query_food(Vec2::new(50.0, 50.0), 100.0);
        assert!(found.contains(&1));
        assert!(found.contains(&2));
        assert!(!found.contains(&3));
    }

    #[test]
    fn test_query_spans_multiple_cells() {
        let mut index = SpatialIndex::new(10.0);
        index.insert_food(1, Vec2::new(0.0, 0.0));
        index.insert_food(2, Vec2::new(35.0, 0.0));

        // 40 units covers four cells to the right
        let found = index.query_food(Vec2::new(0.0, 0.0), 40.0);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_huge_radius_scans_occupied_cells() {
        let mut index = SpatialIndex::new(100.0);
        index.insert_food(1, Vec2::new(10.0, 10.0));
        index.insert_food(2, Vec2::new(5_000.0, -3_000.0));

        let found = index.query_food(Vec2::new(0.0, 0.0), 1e12);
        assert_eq!(found.len(), 2);
        assert!(index.query_food(Vec2::new(0.0, 0.0), f32::INFINITY).len() == 2);
    }

    #[test]
    fn test_negative_coordinates() {
        let mut index = SpatialIndex::new(100.0);
        index.insert_food(1, Vec2::new(-5.0, -5.0));
        let found = index.query_food(Vec2::new(5.0, 5.0), 20.0);
        assert_eq!(found.as_slice(), &[1]);
    }

    #[test]
    fn test_body_samples_and_distinct_owners() {
        let mut index = SpatialIndex::new(50.0);
        let trail: Vec<Vec2> = (1..=9).map(|i| Vec2::new(i as f32 * 3.0, 0.0)).collect();
        index.insert_entity(7, Vec2::ZERO, trail.iter(), 4);

        // head + samples at 0, 4, 8 (8 is also the tail)
        assert_eq!(index.stats().total_entries, 4);

        let owners = index.query_bodies(Vec2::new(10.0, 0.0), 30.0);
        assert_eq!(owners.as_slice(), &[7]);

        let heads = index.query_entities(Vec2::new(27.0, 0.0), 5.0);
        assert!(heads.is_empty());
    }

    #[test]
    fn test_rebuild_forgets_previous_tick() {
        let mut index = SpatialIndex::new(50.0);
        index.insert_food(1, Vec2::new(10.0, 10.0));
        index.clear();
        assert!(index.query_food(Vec2::new(10.0, 10.0), 5.0).is_empty());
        assert_eq!(index.stats().total_entries, 0);
    }

    #[test]
    fn test_nearest_entity_distance_ignores_food() {
        let mut index = SpatialIndex::new(50.0);
        index.insert_food(1, Vec2::new(1.0, 0.0));
        index.insert_entity(2, Vec2::new(30.0, 0.0), std::iter::empty(), 4);

        let d = index.nearest_entity_distance(Vec2::ZERO, 100.0).unwrap();
        assert!((d - 30.0).abs() < 1e-4);
        assert!(index.nearest_entity_distance(Vec2::ZERO, 10.0).is_none());
    }

    #[test]
    fn test_non_finite_positions_ignored() {
        let mut index = SpatialIndex::new(50.0);
        index.insert_food(1, Vec2::new(f32::NAN, 0.0));
        assert_eq!(index.stats().total_entries, 0);
        assert!(index.query_radius(Vec2::new(f32::NAN, 0.0), 10.0).is_empty());
    }
}
