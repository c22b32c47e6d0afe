use formats::telemetry::Ping;

pub const MORTALITY_COLOR: &str = "#ff0000";
pub const LIVE_COLOR: &str = "#00ff44";
pub const HIGHLIGHT_COLOR: &str = "#ffff00";
pub const OUTLINE_COLOR: &str = "#000";

/// Circle marker style for point features.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointStyle {
    pub radius: f32,
    pub fill_color: &'static str,
    pub stroke_color: &'static str,
    pub weight: f32,
    pub opacity: f32,
    pub fill_opacity: f32,
}

impl PointStyle {
    pub const fn filled(radius: f32, fill_color: &'static str, fill_opacity: f32) -> Self {
        Self {
            radius,
            fill_color,
            stroke_color: OUTLINE_COLOR,
            weight: 1.0,
            opacity: 1.0,
            fill_opacity,
        }
    }
}

/// Red for mortality, green for everything else.
pub fn ping_style(ping: &Ping) -> PointStyle {
    let fill = if ping.properties.status.is_mortality() {
        MORTALITY_COLOR
    } else {
        LIVE_COLOR
    };
    PointStyle::filled(8.0, fill, 0.9)
}

/// Style of the selection highlight drawn over selected pings.
pub fn highlight_style() -> PointStyle {
    PointStyle::filled(10.0, HIGHLIGHT_COLOR, 1.0)
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LineStyle {
    pub color: &'static str,
    pub weight: f32,
    pub opacity: f32,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            color: "#3388ff",
            weight: 3.0,
            opacity: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LIVE_COLOR, MORTALITY_COLOR, highlight_style, ping_style};
    use chrono::{TimeZone, Utc};
    use formats::geojson::GeoPoint;
    use formats::telemetry::{AnimalStatus, Ping, PingProperties};
    use foundation::ids::DeviceId;

    fn ping_with(status: AnimalStatus) -> Ping {
        let mut props =
            PingProperties::new(DeviceId(1), Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
        props.status = status;
        Ping::new(GeoPoint::new(0.0, 0.0), props)
    }

    #[test]
    fn mortality_is_red_everything_else_green() {
        assert_eq!(ping_style(&ping_with(AnimalStatus::Mortality)).fill_color, MORTALITY_COLOR);
        assert_eq!(ping_style(&ping_with(AnimalStatus::Alive)).fill_color, LIVE_COLOR);
        assert_eq!(ping_style(&ping_with(AnimalStatus::Unknown)).fill_color, LIVE_COLOR);
        assert_eq!(
            ping_style(&ping_with(AnimalStatus::Other("Captured".into()))).fill_color,
            LIVE_COLOR
        );
        assert_eq!(ping_style(&ping_with(AnimalStatus::Alive)).radius, 8.0);
    }

    #[test]
    fn highlight_is_larger_and_yellow() {
        let style = highlight_style();
        assert_eq!(style.fill_color, "#ffff00");
        assert_eq!(style.radius, 10.0);
    }
}
