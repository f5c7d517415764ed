//! Sparse hash grid for proximity queries

use ahash::AHashMap;
use crate::core::types::{ObjectId, Position};

/// Sparse hash grid keyed by object identity
#[derive(Debug, Clone)]
pub struct SparseHashGrid {
    cell_size: f32,
    cells: AHashMap<(i32, i32), Vec<ObjectId>>,
}

impl SparseHashGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(f32::EPSILON),
            cells: AHashMap::new(),
        }
    }

    #[inline]
    fn cell_coord(&self, pos: Position) -> (i32, i32) {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
        )
    }

    pub fn insert(&mut self, object: ObjectId, pos: Position) {
        let coord = self.cell_coord(pos);
        self.cells.entry(coord).or_default().push(object);
    }

    /// Query every object in cells overlapping the square around `center`
    fn query_cells(&self, center: Position, radius: f32) -> impl Iterator<Item = &ObjectId> + '_ {
        let (cx, cy) = self.cell_coord(center);
        let reach = (radius.max(0.0) / self.cell_size).ceil() as i32;

        (-reach..=reach).flat_map(move |dx| {
            (-reach..=reach).flat_map(move |dy| {
                self.cells.get(&(cx + dx, cy + dy))
                    .into_iter()
                    .flatten()
            })
        })
    }

    /// Query objects within radius, nearest first
    ///
    /// `position_of` supplies the current position of each candidate.
    /// Candidates it cannot place are dropped.
    pub fn query_radius<F>(&self, center: Position, radius: f32, position_of: F) -> Vec<ObjectId>
    where
        F: Fn(&ObjectId) -> Option<Position>,
    {
        let mut hits: Vec<(f32, &ObjectId)> = self
            .query_cells(center, radius)
            .filter_map(|object| {
                let distance = center.distance(&position_of(object)?);
                (distance <= radius).then_some((distance, object))
            })
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        hits.into_iter().map(|(_, object)| object.clone()).collect()
    }
}
