use chrono::FixedOffset;
use formats::kml::escape_xml;
use formats::telemetry::Ping;

pub const MISSING_ANIMAL_ID: &str = "No WLHID";
pub const POPUP_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Text shown when a ping marker is clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popup {
    pub title: String,
    pub lines: Vec<String>,
}

impl Popup {
    /// Title, a rule, then one line per entry. Text is HTML-escaped.
    pub fn to_html(&self) -> String {
        let lines: Vec<String> = self.lines.iter().map(|l| escape_xml(l)).collect();
        format!("{}<hr>{}", escape_xml(&self.title), lines.join("<br>"))
    }
}

/// Popup for one ping; the timestamp is shown in `offset`.
pub fn ping_popup(ping: &Ping, offset: FixedOffset) -> Popup {
    let p = &ping.properties;
    let species = non_empty(p.species.as_deref()).unwrap_or_default();
    let animal = non_empty(p.animal_id.as_deref()).unwrap_or(MISSING_ANIMAL_ID);
    let title = format!("{species} {animal}").trim_start().to_string();

    let mut lines = Vec::with_capacity(5);
    lines.push(match non_empty(p.vendor.as_deref()) {
        Some(vendor) => format!("Device ID {} ({vendor})", p.device_id),
        None => format!("Device ID {}", p.device_id),
    });
    if let Some(frequency) = p.frequency.filter(|f| *f != 0.0) {
        lines.push(format!("Frequency of {frequency}"));
    }
    if let Some(unit) = non_empty(p.population_unit.as_deref()) {
        lines.push(format!("Unit {unit}"));
    }
    lines.push(
        p.recorded_at
            .with_timezone(&offset)
            .format(POPUP_TIME_FORMAT)
            .to_string(),
    );
    lines.push(format!("{:.5}, {:.5}", ping.position.lon, ping.position.lat));

    Popup { title, lines }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}
