//! List widget address arithmetic.
//!
//! Every surface exposes three flat channel spaces (bool, u16, text). A list
//! widget owns one fixed window per space: `stride` channels per row starting
//! after `base`, for `capacity` rows. Row fields are 1-based offsets within
//! the row, so
//!
//! ```text
//! channel = base + (ordinal - 1) * stride + field
//! ```
//!
//! The windows are declared once in the venue config and never grow at
//! runtime; an ordinal beyond `capacity` means the deployment declared fewer
//! channels than the rig has rows, which is a configuration error, not a
//! recoverable condition.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Flat channel number within one of a surface's three signal spaces.
pub type Channel = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Bool,
    U16,
    Text,
}

/// The seven repeating-list widgets present on every surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListRole {
    StageMasters,
    StageFixtures,
    PtzMaster,
    PtzFixtures,
    PtzExtended,
    StagePresets,
    PtzPresets,
}

impl ListRole {
    pub const ALL: [ListRole; 7] = [
        ListRole::StageMasters,
        ListRole::StageFixtures,
        ListRole::PtzMaster,
        ListRole::PtzFixtures,
        ListRole::PtzExtended,
        ListRole::StagePresets,
        ListRole::PtzPresets,
    ];
}

/// Row fields of a master list row (stage groups and the PTZ master).
pub mod master {
    // bool
    pub const SELECTED: u32 = 1;
    pub const RAISE: u32 = 3;
    pub const LOWER: u32 = 5;
    pub const TOGGLE: u32 = 6;
    // u16
    pub const INTENSITY: u32 = 1;
    // text
    pub const NAME: u32 = 1;
}

/// Row fields of a fixture list row. Same control cluster as a master row
/// plus the read-only effective value displays.
pub mod fixture {
    // bool
    pub const SELECTED: u32 = 1;
    pub const RAISE: u32 = 3;
    pub const LOWER: u32 = 5;
    pub const TOGGLE: u32 = 6;
    pub const EFFECTIVE_ON: u32 = 8;
    // u16
    pub const INTENSITY: u32 = 1;
    pub const EFFECTIVE_INTENSITY: u32 = 7;
    // text
    pub const NAME: u32 = 1;
}

/// Row fields of a PTZ extended-detail row. The Blade and BladeRotation u16
/// channels are shared by the four blade pairs and switched by the per-row
/// blade selector buttons.
pub mod extended {
    // bool steppers
    pub const ZOOM_PLUS: u32 = 13;
    pub const ZOOM_MINUS: u32 = 14;
    pub const FOCUS_PLUS: u32 = 15;
    pub const FOCUS_MINUS: u32 = 16;
    pub const IRIS_PLUS: u32 = 17;
    pub const IRIS_MINUS: u32 = 18;
    pub const BLADE_PLUS: u32 = 19;
    pub const BLADE_MINUS: u32 = 20;
    pub const BLADE_ROTATE_PLUS: u32 = 21;
    pub const BLADE_ROTATE_MINUS: u32 = 22;
    // bool blade selectors, one per blade
    pub const BLADE_SELECT: [u32; 4] = [23, 24, 25, 26];
    // u16
    pub const ZOOM: u32 = 3;
    pub const FOCUS: u32 = 4;
    pub const IRIS: u32 = 5;
    pub const PAN: u32 = 6;
    pub const TILT: u32 = 7;
    pub const BLADE: u32 = 8;
    pub const BLADE_ROTATION: u32 = 9;
    // text
    pub const NAME: u32 = 1;
}

/// Row fields of a preset list row.
pub mod preset {
    // bool
    pub const SELECTED: u32 = 1;
    pub const SAVE: u32 = 2;
    pub const DELETE: u32 = 3;
    pub const SAVE_DELETE_ENABLED: u32 = 4;
    // text
    pub const MASTER_NAME: u32 = 1;
    pub const NAME: u32 = 2;
}

/// Largest field offset a role binds in the given signal space. Strides must
/// be at least this wide.
pub fn max_field(role: ListRole, kind: SignalKind) -> u32 {
    match (role, kind) {
        (ListRole::StageMasters | ListRole::PtzMaster, SignalKind::Bool) => master::TOGGLE,
        (ListRole::StageMasters | ListRole::PtzMaster, SignalKind::U16) => master::INTENSITY,
        (ListRole::StageMasters | ListRole::PtzMaster, SignalKind::Text) => master::NAME,
        (ListRole::StageFixtures | ListRole::PtzFixtures, SignalKind::Bool) => {
            fixture::EFFECTIVE_ON
        }
        (ListRole::StageFixtures | ListRole::PtzFixtures, SignalKind::U16) => {
            fixture::EFFECTIVE_INTENSITY
        }
        (ListRole::StageFixtures | ListRole::PtzFixtures, SignalKind::Text) => fixture::NAME,
        (ListRole::PtzExtended, SignalKind::Bool) => extended::BLADE_SELECT[3],
        (ListRole::PtzExtended, SignalKind::U16) => extended::BLADE_ROTATION,
        (ListRole::PtzExtended, SignalKind::Text) => extended::NAME,
        (ListRole::StagePresets | ListRole::PtzPresets, SignalKind::Bool) => {
            preset::SAVE_DELETE_ENABLED
        }
        (ListRole::StagePresets | ListRole::PtzPresets, SignalKind::U16) => 0,
        (ListRole::StagePresets | ListRole::PtzPresets, SignalKind::Text) => preset::NAME,
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("{role:?}: ordinal {ordinal} outside declared capacity {capacity}")]
    OrdinalOutOfRange {
        role: ListRole,
        ordinal: u16,
        capacity: u16,
    },
    #[error("{role:?}: ordinal 0 is not addressable, rows are 1-based")]
    OrdinalZero { role: ListRole },
    #[error("{role:?}: {kind:?} field {field} does not fit stride {stride}")]
    FieldBeyondStride {
        role: ListRole,
        kind: SignalKind,
        field: u32,
        stride: u32,
    },
    #[error("{kind:?} windows of {a:?} and {b:?} overlap")]
    WindowOverlap {
        kind: SignalKind,
        a: ListRole,
        b: ListRole,
    },
    #[error("{role:?}: count channel {channel} lies inside the u16 window of {other:?}")]
    CountChannelCollision {
        role: ListRole,
        channel: Channel,
        other: ListRole,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindWindow {
    pub base: Channel,
    pub stride: u32,
}

/// Declared channel window of one list widget. Configuration data supplied
/// at startup; identical across surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListLayout {
    pub role: ListRole,
    pub capacity: u16,
    /// u16 channel receiving the current live row count.
    pub count_channel: Channel,
    pub bool_window: KindWindow,
    pub u16_window: KindWindow,
    pub text_window: KindWindow,
}

impl ListLayout {
    pub fn window(&self, kind: SignalKind) -> KindWindow {
        match kind {
            SignalKind::Bool => self.bool_window,
            SignalKind::U16 => self.u16_window,
            SignalKind::Text => self.text_window,
        }
    }

    /// Channel of `field` on row `ordinal`. Pure and total for ordinals in
    /// `1..=capacity`; anything else is a configuration error.
    pub fn channel(
        &self,
        kind: SignalKind,
        ordinal: u16,
        field: u32,
    ) -> Result<Channel, LayoutError> {
        if ordinal == 0 {
            return Err(LayoutError::OrdinalZero { role: self.role });
        }
        if ordinal > self.capacity {
            return Err(LayoutError::OrdinalOutOfRange {
                role: self.role,
                ordinal,
                capacity: self.capacity,
            });
        }
        let window = self.window(kind);
        if field == 0 || field > window.stride {
            return Err(LayoutError::FieldBeyondStride {
                role: self.role,
                kind,
                field,
                stride: window.stride,
            });
        }
        Ok(window.base + (ordinal as u32 - 1) * window.stride + field)
    }

    /// Startup check that every field this role binds fits its stride.
    pub fn validate(&self) -> Result<(), LayoutError> {
        for kind in [SignalKind::Bool, SignalKind::U16, SignalKind::Text] {
            let field = max_field(self.role, kind);
            let window = self.window(kind);
            if field > window.stride {
                return Err(LayoutError::FieldBeyondStride {
                    role: self.role,
                    kind,
                    field,
                    stride: window.stride,
                });
            }
        }
        Ok(())
    }

    fn span(&self, kind: SignalKind) -> (Channel, Channel) {
        let window = self.window(kind);
        let end = window.base + self.capacity as u32 * window.stride;
        (window.base + 1, end)
    }
}

/// Check that no two widgets' windows overlap within a signal space and that
/// no count channel falls inside another widget's u16 window.
pub fn validate_disjoint(layouts: &[ListLayout]) -> Result<(), LayoutError> {
    for kind in [SignalKind::Bool, SignalKind::U16, SignalKind::Text] {
        for (i, a) in layouts.iter().enumerate() {
            let (a_lo, a_hi) = a.span(kind);
            for b in &layouts[i + 1..] {
                let (b_lo, b_hi) = b.span(kind);
                if a_lo <= b_hi && b_lo <= a_hi {
                    return Err(LayoutError::WindowOverlap {
                        kind,
                        a: a.role,
                        b: b.role,
                    });
                }
            }
        }
    }
    for a in layouts {
        for b in layouts {
            let (lo, hi) = b.span(SignalKind::U16);
            if a.count_channel >= lo && a.count_channel <= hi {
                return Err(LayoutError::CountChannelCollision {
                    role: a.role,
                    channel: a.count_channel,
                    other: b.role,
                });
            }
        }
    }
    Ok(())
}
