use std::collections::HashSet;

use foundation::ids::DeviceId;
use formats::telemetry::{FeatureCollection, Ping};

use crate::shapes::ShapeSet;
use crate::spatial::ShapeIndex;

/// Pings inside the drawn shapes and the devices they belong to.
///
/// Ordering contract:
/// - `matched` keeps the order of the input pings.
/// - `device_ids` lists each device once, in order of first appearance in
///   `matched`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub matched: FeatureCollection<Ping>,
    pub device_ids: Vec<DeviceId>,
}

impl Selection {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matched.len()
    }
}

/// Full recompute of the selection against the union of `shapes`.
pub fn compute_selection(pings: &FeatureCollection<Ping>, shapes: &ShapeSet) -> Selection {
    if pings.is_empty() || shapes.is_empty() {
        return Selection::empty();
    }
    let index = ShapeIndex::build(shapes);
    select_with_index(pings, &index)
}

pub fn select_with_index(pings: &FeatureCollection<Ping>, index: &ShapeIndex) -> Selection {
    if index.is_empty() {
        return Selection::empty();
    }
    let matched: FeatureCollection<Ping> = pings
        .iter()
        .filter(|p| index.contains(p.position.lon, p.position.lat))
        .cloned()
        .collect();
    let device_ids = unique_in_order(matched.iter().map(Ping::device_id));
    tracing::debug!(
        "selection: {} of {} pings, {} devices",
        matched.len(),
        pings.len(),
        device_ids.len()
    );
    Selection {
        matched,
        device_ids,
    }
}

/// Stable de-duplication: keeps the first occurrence of each id.
pub fn unique_in_order(ids: impl IntoIterator<Item = DeviceId>) -> Vec<DeviceId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::{Selection, compute_selection, unique_in_order};
    use crate::shapes::ShapeSet;
    use chrono::{TimeZone, Utc};
    use formats::geojson::{GeoPoint, VectorGeometry};
    use formats::telemetry::{FeatureCollection, Ping, PingProperties};
    use foundation::ids::DeviceId;
    use pretty_assertions::assert_eq;

    fn ping(device: u64, lon: f64, lat: f64) -> Ping {
        let at = Utc.with_ymd_and_hms(2023, 1, 5, 10, 0, 0).unwrap();
        Ping::new(
            GeoPoint::new(lon, lat),
            PingProperties::new(DeviceId(device), at),
        )
    }

    fn triangle_set() -> ShapeSet {
        let mut shapes = ShapeSet::new();
        shapes
            .create(&VectorGeometry::Polygon(vec![vec![
                GeoPoint::new(0.0, 0.0),
                GeoPoint::new(10.0, 0.0),
                GeoPoint::new(0.0, 10.0),
                GeoPoint::new(0.0, 0.0),
            ]]))
            .unwrap();
        shapes
    }

    #[test]
    fn dedup_keeps_first_seen_order() {
        let ids = [5, 3, 5, 7, 3].map(DeviceId);
        assert_eq!(unique_in_order(ids), vec![DeviceId(5), DeviceId(3), DeviceId(7)]);
    }

    #[test]
    fn no_pings_or_no_shapes_selects_nothing() {
        let pings: FeatureCollection<Ping> = vec![ping(1, 1.0, 1.0)].into_iter().collect();
        assert_eq!(compute_selection(&pings, &ShapeSet::new()), Selection::empty());
        assert_eq!(
            compute_selection(&FeatureCollection::empty(), &triangle_set()),
            Selection::empty()
        );
    }

    #[test]
    fn triangle_selects_inside_pings_in_order() {
        let pings: FeatureCollection<Ping> = vec![
            ping(10, 1.0, 1.0),
            ping(22, 2.0, 3.0),
            ping(30, 9.0, 9.0),
        ]
        .into_iter()
        .collect();

        let selection = compute_selection(&pings, &triangle_set());
        assert_eq!(selection.device_ids, vec![DeviceId(10), DeviceId(22)]);
        assert_eq!(selection.len(), 2);
        assert_eq!(selection.matched.as_slice()[1].device_id(), DeviceId(22));
    }

    #[test]
    fn repeated_devices_are_listed_once() {
        let pings: FeatureCollection<Ping> = [(5, 1.0), (3, 2.0), (5, 3.0), (7, 1.5), (3, 2.5)]
            .into_iter()
            .map(|(device, x)| ping(device, x, 1.0))
            .collect();

        let selection = compute_selection(&pings, &triangle_set());
        assert_eq!(selection.len(), 5);
        assert_eq!(
            selection.device_ids,
            vec![DeviceId(5), DeviceId(3), DeviceId(7)]
        );
    }

    #[test]
    fn pings_on_the_edge_are_not_selected() {
        let pings: FeatureCollection<Ping> =
            vec![ping(1, 5.0, 5.0), ping(2, 0.0, 4.0)].into_iter().collect();
        assert!(compute_selection(&pings, &triangle_set()).is_empty());
    }
}
