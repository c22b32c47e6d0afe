#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub u64);

impl LayerId {
    pub const BASE_IMAGERY: LayerId = LayerId(1);
    pub const BASE_ROADS: LayerId = LayerId(2);
    pub const TRACKS: LayerId = LayerId(10);
    pub const PINGS: LayerId = LayerId(11);
    pub const DRAWN_SHAPES: LayerId = LayerId(12);
    pub const SELECTION_HIGHLIGHT: LayerId = LayerId(13);
}

/// Base layers are mutually exclusive; overlays toggle independently.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Base,
    Overlay,
}

/// Overlays listed in the layer picker.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    Tracks,
    Pings,
}

pub trait Layer {
    fn id(&self) -> LayerId;
    fn kind(&self) -> LayerKind;
    /// Label shown in the layer picker.
    fn name(&self) -> &str;
}
