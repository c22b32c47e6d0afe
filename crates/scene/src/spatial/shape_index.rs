use foundation::bounds::Aabb2;
use geo::{BoundingRect, Contains, MultiPolygon, Point};

use crate::shapes::{ShapeId, ShapeSet};

#[derive(Debug, Clone)]
struct Entry {
    id: ShapeId,
    bounds: Aabb2,
    geometry: MultiPolygon<f64>,
}

/// Point-in-shape lookup over a snapshot of the drawn shapes.
///
/// Bounding boxes reject most points before the exact polygon test.
///
/// Boundary contract: a point exactly on an edge or vertex is NOT contained
/// (`geo::Contains`, DE-9IM interior semantics). The box prefilter is
/// inclusive so it never rejects a point the exact test would accept.
#[derive(Debug, Clone, Default)]
pub struct ShapeIndex {
    entries: Vec<Entry>,
}

impl ShapeIndex {
    pub fn build(shapes: &ShapeSet) -> Self {
        let entries = shapes
            .iter()
            .filter_map(|shape| {
                let rect = shape.geometry.bounding_rect()?;
                Some(Entry {
                    id: shape.id,
                    bounds: Aabb2::new([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                    geometry: shape.geometry.clone(),
                })
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Union of every shape's bounding box.
    pub fn bounds(&self) -> Option<Aabb2> {
        self.entries
            .iter()
            .map(|e| e.bounds)
            .reduce(|a, b| a.union(&b))
    }

    /// True if any shape strictly contains the point.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.first_containing(lon, lat).is_some()
    }

    /// Lowest-id shape strictly containing the point.
    pub fn first_containing(&self, lon: f64, lat: f64) -> Option<ShapeId> {
        let point = Point::new(lon, lat);
        self.entries
            .iter()
            .filter(|e| e.bounds.contains_point(lon, lat))
            .find(|e| e.geometry.contains(&point))
            .map(|e| e.id)
    }
}
