//! User-drawn selection shapes.
//!
//! Shapes come from the draw control as GeoJSON-like geometry and are kept as
//! `geo` multipolygons so containment tests can run on them directly.

use std::collections::BTreeMap;

use formats::geojson::{GeoPoint, VectorGeometry};
use geo::{Coord, LineString, MultiPolygon, Polygon};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShapeId(pub u64);

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shape#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("drawn shapes must be polygons, got {0}")]
    UnsupportedGeometry(&'static str),
    #[error("polygon has no exterior ring")]
    EmptyPolygon,
    #[error("unknown shape {0}")]
    UnknownShape(ShapeId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawnShape {
    pub id: ShapeId,
    pub geometry: MultiPolygon<f64>,
}

impl DrawnShape {
    /// Accepts `Polygon` and `MultiPolygon` geometry; rectangles arrive as
    /// polygons.
    pub fn from_geometry(id: ShapeId, geometry: &VectorGeometry) -> Result<Self, ShapeError> {
        let polygons = match geometry {
            VectorGeometry::Polygon(rings) => vec![to_polygon(rings)?],
            VectorGeometry::MultiPolygon(polys) => polys
                .iter()
                .map(|rings| to_polygon(rings))
                .collect::<Result<Vec<_>, _>>()?,
            other => return Err(ShapeError::UnsupportedGeometry(other.type_name())),
        };
        Ok(Self {
            id,
            geometry: MultiPolygon::new(polygons),
        })
    }

    pub fn to_geometry(&self) -> VectorGeometry {
        let mut polys: Vec<Vec<Vec<GeoPoint>>> =
            self.geometry.0.iter().map(from_polygon).collect();
        if polys.len() == 1 {
            return VectorGeometry::Polygon(polys.remove(0));
        }
        VectorGeometry::MultiPolygon(polys)
    }
}

fn to_polygon(rings: &[Vec<GeoPoint>]) -> Result<Polygon<f64>, ShapeError> {
    let Some((exterior, interiors)) = rings.split_first() else {
        return Err(ShapeError::EmptyPolygon);
    };
    if exterior.is_empty() {
        return Err(ShapeError::EmptyPolygon);
    }
    Ok(Polygon::new(
        to_line_string(exterior),
        interiors.iter().map(|r| to_line_string(r)).collect(),
    ))
}

fn to_line_string(ring: &[GeoPoint]) -> LineString<f64> {
    LineString::new(
        ring.iter()
            .map(|p| Coord { x: p.lon, y: p.lat })
            .collect(),
    )
}

fn from_polygon(polygon: &Polygon<f64>) -> Vec<Vec<GeoPoint>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| ring.coords().map(|c| GeoPoint::new(c.x, c.y)).collect())
        .collect()
}

/// Change notifications from the draw control.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawEvent {
    ShapeCreated {
        geometry: VectorGeometry,
    },
    ShapeEdited {
        shapes: Vec<(ShapeId, VectorGeometry)>,
    },
    ShapeDeleteCompleted {
        ids: Vec<ShapeId>,
    },
    ShapesCleared,
}

/// The drawn-shape group, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct ShapeSet {
    next_id: u64,
    shapes: BTreeMap<ShapeId, DrawnShape>,
}

impl ShapeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, geometry: &VectorGeometry) -> Result<ShapeId, ShapeError> {
        let id = ShapeId(self.next_id + 1);
        let shape = DrawnShape::from_geometry(id, geometry)?;
        self.next_id += 1;
        self.shapes.insert(id, shape);
        Ok(id)
    }

    pub fn replace(&mut self, id: ShapeId, geometry: &VectorGeometry) -> Result<(), ShapeError> {
        if !self.shapes.contains_key(&id) {
            return Err(ShapeError::UnknownShape(id));
        }
        let shape = DrawnShape::from_geometry(id, geometry)?;
        self.shapes.insert(id, shape);
        Ok(())
    }

    pub fn remove(&mut self, id: ShapeId) -> bool {
        self.shapes.remove(&id).is_some()
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
    }

    /// Applies one draw event.
    ///
    /// Edits are validated as a batch; on error the set is left unchanged.
    /// Deleting an unknown id is a no-op.
    pub fn apply(&mut self, event: &DrawEvent) -> Result<(), ShapeError> {
        match event {
            DrawEvent::ShapeCreated { geometry } => self.create(geometry).map(|_| ()),
            DrawEvent::ShapeEdited { shapes } => {
                let edited = shapes
                    .iter()
                    .map(|(id, geometry)| {
                        if !self.shapes.contains_key(id) {
                            return Err(ShapeError::UnknownShape(*id));
                        }
                        DrawnShape::from_geometry(*id, geometry)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                for shape in edited {
                    self.shapes.insert(shape.id, shape);
                }
                Ok(())
            }
            DrawEvent::ShapeDeleteCompleted { ids } => {
                for id in ids {
                    self.remove(*id);
                }
                Ok(())
            }
            DrawEvent::ShapesCleared => {
                self.clear();
                Ok(())
            }
        }
    }

    pub fn get(&self, id: ShapeId) -> Option<&DrawnShape> {
        self.shapes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrawnShape> {
        self.shapes.values()
    }

    pub fn ids(&self) -> Vec<ShapeId> {
        self.shapes.keys().copied().collect()
    }
}
