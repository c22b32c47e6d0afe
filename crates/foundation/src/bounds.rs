/// Axis-aligned bounding box in lon/lat degrees.
///
/// `min` is `[lon, lat]` of the south-west corner, `max` of the north-east one.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    /// Smallest box covering every point, `None` for an empty input.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = [f64; 2]>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut out = Aabb2::new(first, first);
        for p in iter {
            out.min[0] = out.min[0].min(p[0]);
            out.min[1] = out.min[1].min(p[1]);
            out.max[0] = out.max[0].max(p[0]);
            out.max[1] = out.max[1].max(p[1]);
        }
        Some(out)
    }

    pub fn is_empty(&self) -> bool {
        self.min[0] > self.max[0] || self.min[1] > self.max[1]
    }

    /// Inclusive on every edge.
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min[0] && lon <= self.max[0] && lat >= self.min[1] && lat <= self.max[1]
    }

    pub fn union(&self, other: &Self) -> Self {
        Aabb2::new(
            [self.min[0].min(other.min[0]), self.min[1].min(other.min[1])],
            [self.max[0].max(other.max[0]), self.max[1].max(other.max[1])],
        )
    }
}
