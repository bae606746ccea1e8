//! Per-channel action table.
//!
//! Each surface carries one table mapping `(signal kind, channel)` to the
//! typed mutation that channel drives. Row actions are built at render time
//! and capture their row's entity and ordinal by value, so dispatch never
//! resolves anything through shared loop state.
//!
//! Bool channels are edge-triggered: the action fires on the transition to
//! `true` (press) and a `false` level never resolves. U16 and text channels
//! are level-triggered and resolve on every reported value. That asymmetry
//! is what separates momentary raise/lower/toggle buttons from sliders and
//! typed fields.

use std::collections::HashMap;

use crate::layout::{Channel, ListRole, SignalKind};
use crate::model::{Axis, Blade, BladePart, EntityRef, FixtureId, GroupId, StepDir};
use crate::transport::SignalValue;

/// A typed domain mutation bound to one surface channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Bump a level axis by one step (bool edge).
    Step {
        target: EntityRef,
        axis: Axis,
        dir: StepDir,
    },
    /// Absolute level from a slider (u16 level).
    SetLevel { target: EntityRef, axis: Axis },
    /// Flip the mute flag (bool edge).
    ToggleMute { target: EntityRef },
    /// Single-select a stage master row (bool edge).
    SelectMaster { ordinal: u16 },
    /// Show the PTZ detail overlay on the originating surface (bool edge).
    OpenPtzOverlay,
    /// Hide the PTZ detail overlay (bool edge).
    ClosePtzOverlay,
    /// Switch the shared blade channels of one extended row (bool edge).
    SelectBlade {
        fixture: FixtureId,
        ordinal: u16,
        blade: Blade,
    },
    /// Absolute blade level through the row's selector (u16 level).
    SetBladeLevel { fixture: FixtureId, ordinal: u16, part: BladePart },
    /// Bump a blade level through the row's selector (bool edge).
    StepBlade {
        fixture: FixtureId,
        ordinal: u16,
        part: BladePart,
        dir: StepDir,
    },
    /// Apply a stored preset to its group (bool edge).
    LoadPreset { group: GroupId, name: String },
    /// Overwrite a named preset with the group's live values (bool edge).
    SavePreset { group: GroupId, name: String },
    /// Delete a preset, then rebuild the list (bool edge).
    DeletePreset {
        role: ListRole,
        group: GroupId,
        name: String,
    },
    /// Sentinel row: collect a name for a new preset (bool edge).
    NewPreset { role: ListRole },
    /// Name-entry OK button (bool edge).
    ModalConfirm,
    /// Name-entry Cancel button (bool edge).
    ModalCancel,
    /// Name-entry text field (text level).
    ModalText,
}

#[derive(Debug, Default)]
pub struct ActionTable {
    bound: HashMap<(SignalKind, Channel), Action>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `action` to a channel. Re-attaching replaces the previous
    /// binding; list rebuilds rely on that.
    pub fn attach(&mut self, kind: SignalKind, channel: Channel, action: Action) {
        self.bound.insert((kind, channel), action);
    }

    /// Remove a binding, used when a rebuilt list has fewer rows.
    pub fn detach(&mut self, kind: SignalKind, channel: Channel) {
        self.bound.remove(&(kind, channel));
    }

    /// Resolve an inbound value to its bound action. `None` for unbound
    /// channels (silent no-op: surfaces report events for blank trailing
    /// rows) and for bool `false` levels (release half of a press).
    pub fn resolve(&self, channel: Channel, value: &SignalValue) -> Option<&Action> {
        if matches!(value, SignalValue::Bool(false)) {
            return None;
        }
        self.bound.get(&(value.kind(), channel))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.bound.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_release_never_resolves() {
        let mut table = ActionTable::new();
        table.attach(
            SignalKind::Bool,
            1026,
            Action::ToggleMute {
                target: EntityRef::Group(GroupId(0)),
            },
        );

        assert_eq!(
            table.resolve(1026, &SignalValue::Bool(false)),
            None,
            "release edge must not fire the action"
        );
        assert!(
            table.resolve(1026, &SignalValue::Bool(true)).is_some(),
            "press edge fires"
        );
    }

    #[test]
    fn levels_resolve_on_every_value() {
        let mut table = ActionTable::new();
        table.attach(
            SignalKind::U16,
            1011,
            Action::SetLevel {
                target: EntityRef::Fixture(FixtureId(3)),
                axis: Axis::Intensity,
            },
        );
        for value in [0u16, 1, 32768, u16::MAX] {
            assert!(table.resolve(1011, &SignalValue::U16(value)).is_some());
        }
    }

    #[test]
    fn unbound_channels_resolve_to_nothing() {
        let table = ActionTable::new();
        assert_eq!(table.resolve(9999, &SignalValue::Bool(true)), None);
    }

    #[test]
    fn reattach_replaces_the_previous_binding() {
        let mut table = ActionTable::new();
        table.attach(
            SignalKind::Bool,
            1601,
            Action::LoadPreset {
                group: GroupId(0),
                name: "Warm".into(),
            },
        );
        table.attach(
            SignalKind::Bool,
            1601,
            Action::LoadPreset {
                group: GroupId(0),
                name: "Cool".into(),
            },
        );

        assert_eq!(table.len(), 1);
        assert_eq!(
            table.resolve(1601, &SignalValue::Bool(true)),
            Some(&Action::LoadPreset {
                group: GroupId(0),
                name: "Cool".into(),
            })
        );
    }

    #[test]
    fn kinds_share_channel_numbers_without_clashing() {
        let mut table = ActionTable::new();
        table.attach(SignalKind::Bool, 2001, Action::ModalConfirm);
        table.attach(SignalKind::Text, 2001, Action::ModalText);

        assert_eq!(
            table.resolve(2001, &SignalValue::Bool(true)),
            Some(&Action::ModalConfirm)
        );
        assert_eq!(
            table.resolve(2001, &SignalValue::Text("Sunset".into())),
            Some(&Action::ModalText)
        );
    }

    #[test]
    fn detach_unbinds_a_stale_row() {
        let mut table = ActionTable::new();
        table.attach(SignalKind::Bool, 1603, Action::NewPreset {
            role: ListRole::StagePresets,
        });
        table.detach(SignalKind::Bool, 1603);
        assert_eq!(table.resolve(1603, &SignalValue::Bool(true)), None);
    }
}
