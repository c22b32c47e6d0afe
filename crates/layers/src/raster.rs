use crate::layer::{Layer, LayerId, LayerKind};

/// XYZ tile base layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLayer {
    id: LayerId,
    pub name: String,
    /// `{z}`, `{x}` and `{y}` are substituted per tile.
    pub url_template: String,
    pub attribution: String,
    pub max_zoom: u8,
    /// Deepest zoom the server has tiles for; deeper zooms upscale.
    pub max_native_zoom: Option<u8>,
}

impl TileLayer {
    pub fn new(id: LayerId, name: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            url_template: url_template.into(),
            attribution: String::new(),
            max_zoom: 24,
            max_native_zoom: None,
        }
    }

    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = attribution.into();
        self
    }

    pub fn with_max_native_zoom(mut self, zoom: u8) -> Self {
        self.max_native_zoom = Some(zoom);
        self
    }

    /// Satellite imagery; active by default.
    pub fn esri_world_imagery() -> Self {
        Self::new(
            LayerId::BASE_IMAGERY,
            "Bing Satellite",
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}",
        )
        .with_attribution(r#"&copy; <a href="https://esri.com">ESRI Basemap</a>"#)
        .with_max_native_zoom(17)
    }

    pub fn bc_government_roads() -> Self {
        Self::new(
            LayerId::BASE_ROADS,
            "BC Government",
            "https://maps.gov.bc.ca/arcgis/rest/services/province/roads_wm/MapServer/tile/{z}/{y}/{x}",
        )
        .with_attribution(
            r#"&copy; <a href="https://www2.gov.bc.ca/gov/content/home">BC Government</a>"#,
        )
    }

    pub fn defaults() -> Vec<TileLayer> {
        vec![Self::esri_world_imagery(), Self::bc_government_roads()]
    }

    pub fn tile_url(&self, z: u8, x: u32, y: u32) -> String {
        self.url_template
            .replace("{z}", &z.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }

    /// Zoom level to request from the server when displaying `zoom`.
    pub fn source_zoom(&self, zoom: u8) -> u8 {
        let zoom = zoom.min(self.max_zoom);
        self.max_native_zoom.map_or(zoom, |native| zoom.min(native))
    }
}

impl Layer for TileLayer {
    fn id(&self) -> LayerId {
        self.id
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Base
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::TileLayer;
    use crate::layer::{Layer, LayerId};

    #[test]
    fn defaults_start_with_imagery() {
        let layers = TileLayer::defaults();
        assert_eq!(layers[0].id(), LayerId::BASE_IMAGERY);
        assert_eq!(layers[1].id(), LayerId::BASE_ROADS);
        assert_eq!(layers[1].max_native_zoom, None);
    }

    #[test]
    fn tile_url_orders_y_before_x() {
        let url = TileLayer::esri_world_imagery().tile_url(6, 10, 21);
        assert!(url.ends_with("/tile/6/21/10"));
    }

    #[test]
    fn deep_zoom_is_served_from_native_tiles() {
        let imagery = TileLayer::esri_world_imagery();
        assert_eq!(imagery.source_zoom(12), 12);
        assert_eq!(imagery.source_zoom(20), 17);
        assert_eq!(imagery.source_zoom(30), 17);
        assert_eq!(TileLayer::bc_government_roads().source_zoom(30), 24);
    }
}
