//! Rig domain model: groups of fixtures with 16-bit levels and mute flags,
//! plus the PTZ axis set on moving-head fixtures.
//!
//! Every mutation goes through the `Rig` and records a [`FieldChange`] in an
//! internal journal. The engine drains the journal after each dispatched
//! action and mirrors the changes to every surface, so the model itself never
//! holds callbacks or surface handles.

use thiserror::Error;

/// Raise/lower step shared by every level control: 1/100 of full range.
pub const LEVEL_STEP: u16 = u16::MAX / 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixtureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Group(GroupId),
    Fixture(FixtureId),
}

/// One of the four framing-shutter blades on a PTZ fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Blade {
    B1,
    B2,
    B3,
    B4,
}

impl Blade {
    pub const ALL: [Blade; 4] = [Blade::B1, Blade::B2, Blade::B3, Blade::B4];

    fn index(self) -> usize {
        match self {
            Blade::B1 => 0,
            Blade::B2 => 1,
            Blade::B3 => 2,
            Blade::B4 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BladePart {
    Position,
    Rotation,
}

/// Continuous level axes addressable by set/step actions. Blade axes are
/// separate because they dispatch through the per-surface blade selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Intensity,
    Pan,
    Tilt,
    Zoom,
    Focus,
    Iris,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDir {
    Up,
    Down,
}

impl StepDir {
    fn apply(self, value: u16) -> u16 {
        match self {
            StepDir::Up => value.saturating_add(LEVEL_STEP),
            StepDir::Down => value.saturating_sub(LEVEL_STEP),
        }
    }
}

/// Which scalar on an entity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Intensity,
    Muted,
    EffectiveIntensity,
    EffectiveMute,
    Pan,
    Tilt,
    Zoom,
    Focus,
    Iris,
    BladePos(Blade),
    BladeRot(Blade),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    U16(u16),
    Bool(bool),
}

/// Change notification carrying the old and new value, drained in mutation
/// order via [`Rig::take_changes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldChange {
    pub entity: EntityRef,
    pub field: Field,
    pub old: FieldValue,
    pub new: FieldValue,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RigError {
    #[error("unknown group {0:?}")]
    UnknownGroup(GroupId),
    #[error("unknown fixture {0:?}")]
    UnknownFixture(FixtureId),
    #[error("fixture {0:?} has no PTZ axes")]
    NotPtz(FixtureId),
    #[error("{axis:?} is not addressable on {target:?}")]
    NoSuchAxis { target: EntityRef, axis: Axis },
    #[error("rig has no PTZ group")]
    MissingPtzGroup,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BladePair {
    pub position: u16,
    pub rotation: u16,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PtzAxes {
    pub pan: u16,
    pub tilt: u16,
    pub zoom: u16,
    pub focus: u16,
    pub iris: u16,
    pub blades: [BladePair; 4],
}

#[derive(Debug)]
pub struct Fixture {
    id: FixtureId,
    pub name: String,
    intensity: u16,
    muted: bool,
    effective_intensity: u16,
    effective_mute: bool,
    ptz: Option<PtzAxes>,
}

impl Fixture {
    pub fn id(&self) -> FixtureId {
        self.id
    }

    pub fn intensity(&self) -> u16 {
        self.intensity
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn effective_intensity(&self) -> u16 {
        self.effective_intensity
    }

    pub fn effective_mute(&self) -> bool {
        self.effective_mute
    }

    pub fn ptz(&self) -> Option<&PtzAxes> {
        self.ptz.as_ref()
    }
}

#[derive(Debug)]
pub struct Group {
    id: GroupId,
    pub name: String,
    intensity: u16,
    muted: bool,
    fixtures: Vec<Fixture>,
}

impl Group {
    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn intensity(&self) -> u16 {
        self.intensity
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn fixtures(&self) -> &[Fixture] {
        &self.fixtures
    }

    fn set_intensity(&mut self, value: u16, changes: &mut Vec<FieldChange>) {
        if self.intensity == value {
            return;
        }
        changes.push(FieldChange {
            entity: EntityRef::Group(self.id),
            field: Field::Intensity,
            old: FieldValue::U16(self.intensity),
            new: FieldValue::U16(value),
        });
        self.intensity = value;
        for index in 0..self.fixtures.len() {
            self.refresh_effective(index, changes);
        }
    }

    fn set_muted(&mut self, muted: bool, changes: &mut Vec<FieldChange>) {
        if self.muted == muted {
            return;
        }
        changes.push(FieldChange {
            entity: EntityRef::Group(self.id),
            field: Field::Muted,
            old: FieldValue::Bool(self.muted),
            new: FieldValue::Bool(muted),
        });
        self.muted = muted;
        for index in 0..self.fixtures.len() {
            self.refresh_effective(index, changes);
        }
    }

    fn set_fixture_intensity(&mut self, index: usize, value: u16, changes: &mut Vec<FieldChange>) {
        let fixture = &mut self.fixtures[index];
        if fixture.intensity != value {
            changes.push(FieldChange {
                entity: EntityRef::Fixture(fixture.id),
                field: Field::Intensity,
                old: FieldValue::U16(fixture.intensity),
                new: FieldValue::U16(value),
            });
            fixture.intensity = value;
            self.refresh_effective(index, changes);
        }
    }

    fn set_fixture_muted(&mut self, index: usize, muted: bool, changes: &mut Vec<FieldChange>) {
        let fixture = &mut self.fixtures[index];
        if fixture.muted != muted {
            changes.push(FieldChange {
                entity: EntityRef::Fixture(fixture.id),
                field: Field::Muted,
                old: FieldValue::Bool(fixture.muted),
                new: FieldValue::Bool(muted),
            });
            fixture.muted = muted;
            self.refresh_effective(index, changes);
        }
    }

    /// Recompute one member's derived values, emitting a change per field
    /// that actually moved.
    fn refresh_effective(&mut self, index: usize, changes: &mut Vec<FieldChange>) {
        let mute = self.muted || self.fixtures[index].muted;
        let level = if mute {
            0
        } else {
            scale(self.fixtures[index].intensity, self.intensity)
        };
        let fixture = &mut self.fixtures[index];
        if fixture.effective_mute != mute {
            changes.push(FieldChange {
                entity: EntityRef::Fixture(fixture.id),
                field: Field::EffectiveMute,
                old: FieldValue::Bool(fixture.effective_mute),
                new: FieldValue::Bool(mute),
            });
            fixture.effective_mute = mute;
        }
        if fixture.effective_intensity != level {
            changes.push(FieldChange {
                entity: EntityRef::Fixture(fixture.id),
                field: Field::EffectiveIntensity,
                old: FieldValue::U16(fixture.effective_intensity),
                new: FieldValue::U16(level),
            });
            fixture.effective_intensity = level;
        }
    }
}

/// 16-bit multiply: a level scaled by a master level.
fn scale(value: u16, master: u16) -> u16 {
    ((value as u32 * master as u32) / u16::MAX as u32) as u16
}

#[derive(Debug, Clone, Copy)]
enum GroupSlot {
    Stage(usize),
    Ptz,
}

/// The whole venue rig: stage groups plus the single PTZ group, with the
/// pending change journal.
#[derive(Debug)]
pub struct Rig {
    stage: Vec<Group>,
    ptz: Group,
    changes: Vec<FieldChange>,
}

impl Rig {
    pub fn stage_groups(&self) -> &[Group] {
        &self.stage
    }

    pub fn ptz_group(&self) -> &Group {
        &self.ptz
    }

    /// Drain the pending change journal in mutation order.
    pub fn take_changes(&mut self) -> Vec<FieldChange> {
        std::mem::take(&mut self.changes)
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.stage
            .iter()
            .find(|g| g.id == id)
            .or_else(|| (self.ptz.id == id).then_some(&self.ptz))
    }

    pub fn fixture(&self, id: FixtureId) -> Option<&Fixture> {
        self.locate_fixture(id).map(|(slot, index)| {
            let group = match slot {
                GroupSlot::Stage(g) => &self.stage[g],
                GroupSlot::Ptz => &self.ptz,
            };
            &group.fixtures()[index]
        })
    }

    fn locate_group(&self, id: GroupId) -> Option<GroupSlot> {
        if self.ptz.id == id {
            return Some(GroupSlot::Ptz);
        }
        self.stage
            .iter()
            .position(|g| g.id == id)
            .map(GroupSlot::Stage)
    }

    fn locate_fixture(&self, id: FixtureId) -> Option<(GroupSlot, usize)> {
        for (g, group) in self.stage.iter().enumerate() {
            if let Some(index) = group.fixtures.iter().position(|f| f.id == id) {
                return Some((GroupSlot::Stage(g), index));
            }
        }
        self.ptz
            .fixtures
            .iter()
            .position(|f| f.id == id)
            .map(|index| (GroupSlot::Ptz, index))
    }

    fn slot_mut(&mut self, slot: GroupSlot) -> &mut Group {
        match slot {
            GroupSlot::Stage(g) => &mut self.stage[g],
            GroupSlot::Ptz => &mut self.ptz,
        }
    }

    /// Current value of a level axis, for step arithmetic and row renders.
    pub fn level(&self, target: EntityRef, axis: Axis) -> Result<u16, RigError> {
        match (target, axis) {
            (EntityRef::Group(id), Axis::Intensity) => self
                .group(id)
                .map(Group::intensity)
                .ok_or(RigError::UnknownGroup(id)),
            (EntityRef::Fixture(id), Axis::Intensity) => self
                .fixture(id)
                .map(Fixture::intensity)
                .ok_or(RigError::UnknownFixture(id)),
            (EntityRef::Fixture(id), axis) => {
                let fixture = self.fixture(id).ok_or(RigError::UnknownFixture(id))?;
                let ptz = fixture.ptz().ok_or(RigError::NotPtz(id))?;
                Ok(match axis {
                    Axis::Pan => ptz.pan,
                    Axis::Tilt => ptz.tilt,
                    Axis::Zoom => ptz.zoom,
                    Axis::Focus => ptz.focus,
                    Axis::Iris => ptz.iris,
                    Axis::Intensity => unreachable!("handled above"),
                })
            }
            (target, axis) => Err(RigError::NoSuchAxis { target, axis }),
        }
    }

    pub fn blade_level(
        &self,
        id: FixtureId,
        blade: Blade,
        part: BladePart,
    ) -> Result<u16, RigError> {
        let fixture = self.fixture(id).ok_or(RigError::UnknownFixture(id))?;
        let ptz = fixture.ptz().ok_or(RigError::NotPtz(id))?;
        let pair = ptz.blades[blade.index()];
        Ok(match part {
            BladePart::Position => pair.position,
            BladePart::Rotation => pair.rotation,
        })
    }

    pub fn set_level(&mut self, target: EntityRef, axis: Axis, value: u16) -> Result<(), RigError> {
        match (target, axis) {
            (EntityRef::Group(id), Axis::Intensity) => {
                let slot = self.locate_group(id).ok_or(RigError::UnknownGroup(id))?;
                let changes = &mut self.changes;
                match slot {
                    GroupSlot::Stage(g) => self.stage[g].set_intensity(value, changes),
                    GroupSlot::Ptz => self.ptz.set_intensity(value, changes),
                }
                Ok(())
            }
            (EntityRef::Fixture(id), Axis::Intensity) => {
                let (slot, index) = self
                    .locate_fixture(id)
                    .ok_or(RigError::UnknownFixture(id))?;
                let changes = &mut self.changes;
                match slot {
                    GroupSlot::Stage(g) => self.stage[g].set_fixture_intensity(index, value, changes),
                    GroupSlot::Ptz => self.ptz.set_fixture_intensity(index, value, changes),
                }
                Ok(())
            }
            (EntityRef::Fixture(id), axis) => self.set_ptz_axis(id, axis, value),
            (target, axis) => Err(RigError::NoSuchAxis { target, axis }),
        }
    }

    pub fn step_level(
        &mut self,
        target: EntityRef,
        axis: Axis,
        dir: StepDir,
    ) -> Result<(), RigError> {
        let current = self.level(target, axis)?;
        self.set_level(target, axis, dir.apply(current))
    }

    pub fn set_muted(&mut self, target: EntityRef, muted: bool) -> Result<(), RigError> {
        match target {
            EntityRef::Group(id) => {
                let slot = self.locate_group(id).ok_or(RigError::UnknownGroup(id))?;
                let changes = &mut self.changes;
                match slot {
                    GroupSlot::Stage(g) => self.stage[g].set_muted(muted, changes),
                    GroupSlot::Ptz => self.ptz.set_muted(muted, changes),
                }
            }
            EntityRef::Fixture(id) => {
                let (slot, index) = self
                    .locate_fixture(id)
                    .ok_or(RigError::UnknownFixture(id))?;
                let changes = &mut self.changes;
                match slot {
                    GroupSlot::Stage(g) => self.stage[g].set_fixture_muted(index, muted, changes),
                    GroupSlot::Ptz => self.ptz.set_fixture_muted(index, muted, changes),
                }
            }
        }
        Ok(())
    }

    pub fn toggle_muted(&mut self, target: EntityRef) -> Result<(), RigError> {
        let current = match target {
            EntityRef::Group(id) => self
                .group(id)
                .map(Group::muted)
                .ok_or(RigError::UnknownGroup(id))?,
            EntityRef::Fixture(id) => self
                .fixture(id)
                .map(Fixture::muted)
                .ok_or(RigError::UnknownFixture(id))?,
        };
        self.set_muted(target, !current)
    }

    fn set_ptz_axis(&mut self, id: FixtureId, axis: Axis, value: u16) -> Result<(), RigError> {
        let (slot, index) = self
            .locate_fixture(id)
            .ok_or(RigError::UnknownFixture(id))?;
        let changes = &mut self.changes;
        let group = match slot {
            GroupSlot::Stage(g) => &mut self.stage[g],
            GroupSlot::Ptz => &mut self.ptz,
        };
        let fixture = &mut group.fixtures[index];
        let ptz = fixture.ptz.as_mut().ok_or(RigError::NotPtz(id))?;
        let (current, field) = match axis {
            Axis::Pan => (&mut ptz.pan, Field::Pan),
            Axis::Tilt => (&mut ptz.tilt, Field::Tilt),
            Axis::Zoom => (&mut ptz.zoom, Field::Zoom),
            Axis::Focus => (&mut ptz.focus, Field::Focus),
            Axis::Iris => (&mut ptz.iris, Field::Iris),
            Axis::Intensity => unreachable!("intensity is routed through set_level"),
        };
        if *current != value {
            changes.push(FieldChange {
                entity: EntityRef::Fixture(id),
                field,
                old: FieldValue::U16(*current),
                new: FieldValue::U16(value),
            });
            *current = value;
        }
        Ok(())
    }

    pub fn set_blade(
        &mut self,
        id: FixtureId,
        blade: Blade,
        part: BladePart,
        value: u16,
    ) -> Result<(), RigError> {
        let (slot, index) = self
            .locate_fixture(id)
            .ok_or(RigError::UnknownFixture(id))?;
        let changes = &mut self.changes;
        let group = match slot {
            GroupSlot::Stage(g) => &mut self.stage[g],
            GroupSlot::Ptz => &mut self.ptz,
        };
        let fixture = &mut group.fixtures[index];
        let ptz = fixture.ptz.as_mut().ok_or(RigError::NotPtz(id))?;
        let pair = &mut ptz.blades[blade.index()];
        let (current, field) = match part {
            BladePart::Position => (&mut pair.position, Field::BladePos(blade)),
            BladePart::Rotation => (&mut pair.rotation, Field::BladeRot(blade)),
        };
        if *current != value {
            changes.push(FieldChange {
                entity: EntityRef::Fixture(id),
                field,
                old: FieldValue::U16(*current),
                new: FieldValue::U16(value),
            });
            *current = value;
        }
        Ok(())
    }

    pub fn step_blade(
        &mut self,
        id: FixtureId,
        blade: Blade,
        part: BladePart,
        dir: StepDir,
    ) -> Result<(), RigError> {
        let current = self.blade_level(id, blade, part)?;
        self.set_blade(id, blade, part, dir.apply(current))
    }
}

/// Builds the rig once at startup. Iteration order of groups and fixtures is
/// frozen here and is what every ordinal assignment derives from.
#[derive(Debug, Default)]
pub struct RigBuilder {
    stage: Vec<Group>,
    ptz: Option<Group>,
    next_group: u32,
    next_fixture: u32,
}

impl RigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_group<'a>(
        &mut self,
        name: &str,
        fixtures: impl IntoIterator<Item = &'a str>,
    ) -> GroupId {
        let group = self.make_group(name, fixtures, false);
        let id = group.id;
        self.stage.push(group);
        id
    }

    /// The single PTZ group; calling twice replaces the first (config
    /// validation rejects that before we get here).
    pub fn ptz_group<'a>(
        &mut self,
        name: &str,
        fixtures: impl IntoIterator<Item = &'a str>,
    ) -> GroupId {
        let group = self.make_group(name, fixtures, true);
        let id = group.id;
        self.ptz = Some(group);
        id
    }

    pub fn build(self) -> Result<Rig, RigError> {
        let ptz = self.ptz.ok_or(RigError::MissingPtzGroup)?;
        Ok(Rig {
            stage: self.stage,
            ptz,
            changes: Vec::new(),
        })
    }

    fn make_group<'a>(
        &mut self,
        name: &str,
        fixtures: impl IntoIterator<Item = &'a str>,
        ptz: bool,
    ) -> Group {
        let id = GroupId(self.next_group);
        self.next_group += 1;
        let fixtures = fixtures
            .into_iter()
            .map(|fixture_name| {
                let fid = FixtureId(self.next_fixture);
                self.next_fixture += 1;
                Fixture {
                    id: fid,
                    name: fixture_name.to_string(),
                    intensity: 0,
                    muted: false,
                    effective_intensity: 0,
                    effective_mute: false,
                    ptz: ptz.then(PtzAxes::default),
                }
            })
            .collect();
        Group {
            id,
            name: name.to_string(),
            intensity: 0,
            muted: false,
            fixtures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_rig() -> Rig {
        let mut builder = RigBuilder::new();
        builder.stage_group("Podium", ["Podium Wash", "Podium Spot"]);
        builder.stage_group("Stage", ["Stage Left", "Stage Right"]);
        builder.ptz_group("PTZ", ["PTZ 1"]);
        builder.build().expect("demo rig should build")
    }

    fn fixture_id(rig: &Rig, name: &str) -> FixtureId {
        rig.stage_groups()
            .iter()
            .chain(std::iter::once(rig.ptz_group()))
            .flat_map(|g| g.fixtures())
            .find(|f| f.name == name)
            .map(Fixture::id)
            .expect("fixture exists")
    }

    #[test]
    fn set_level_records_old_and_new() {
        let mut rig = test_rig();
        let id = fixture_id(&rig, "Podium Wash");
        rig.set_level(EntityRef::Fixture(id), Axis::Intensity, 32768)
            .unwrap();

        let changes = rig.take_changes();
        assert_eq!(
            changes[0],
            FieldChange {
                entity: EntityRef::Fixture(id),
                field: Field::Intensity,
                old: FieldValue::U16(0),
                new: FieldValue::U16(32768),
            },
            "first change should be the raw intensity"
        );
        assert!(rig.take_changes().is_empty(), "journal drains on take");
    }

    #[test]
    fn unchanged_set_emits_nothing() {
        let mut rig = test_rig();
        let id = fixture_id(&rig, "Podium Wash");
        rig.set_level(EntityRef::Fixture(id), Axis::Intensity, 0)
            .unwrap();
        assert!(rig.take_changes().is_empty(), "no-op sets stay silent");
    }

    #[test]
    fn master_intensity_drives_effective_levels() {
        let mut rig = test_rig();
        let gid = rig.stage_groups()[0].id();
        let id = fixture_id(&rig, "Podium Wash");

        rig.set_level(EntityRef::Fixture(id), Axis::Intensity, u16::MAX)
            .unwrap();
        rig.take_changes();

        rig.set_level(EntityRef::Group(gid), Axis::Intensity, u16::MAX)
            .unwrap();
        let changes = rig.take_changes();
        assert_eq!(
            changes[0].field,
            Field::Intensity,
            "master change comes first"
        );
        assert!(
            changes.iter().any(|c| c.entity == EntityRef::Fixture(id)
                && c.field == Field::EffectiveIntensity
                && c.new == FieldValue::U16(u16::MAX)),
            "member at full should follow the master to full"
        );
        assert_eq!(rig.fixture(id).unwrap().effective_intensity(), u16::MAX);
    }

    #[test]
    fn mute_propagates_to_effective_mute() {
        let mut rig = test_rig();
        let gid = rig.stage_groups()[0].id();
        rig.set_muted(EntityRef::Group(gid), true).unwrap();

        let changes = rig.take_changes();
        let member_mutes = changes
            .iter()
            .filter(|c| c.field == Field::EffectiveMute && c.new == FieldValue::Bool(true))
            .count();
        assert_eq!(member_mutes, 2, "both members report effective mute");

        rig.toggle_muted(EntityRef::Group(gid)).unwrap();
        assert!(!rig.stage_groups()[0].muted(), "toggle flips back");
    }

    #[test]
    fn steps_clamp_at_range_ends() {
        let mut rig = test_rig();
        let id = fixture_id(&rig, "Stage Left");
        let target = EntityRef::Fixture(id);

        rig.step_level(target, Axis::Intensity, StepDir::Down).unwrap();
        assert_eq!(rig.fixture(id).unwrap().intensity(), 0, "clamped at zero");

        rig.set_level(target, Axis::Intensity, u16::MAX - 1).unwrap();
        rig.step_level(target, Axis::Intensity, StepDir::Up).unwrap();
        assert_eq!(
            rig.fixture(id).unwrap().intensity(),
            u16::MAX,
            "clamped at full instead of wrapping"
        );
    }

    #[test]
    fn ptz_axes_only_exist_on_ptz_fixtures() {
        let mut rig = test_rig();
        let stage = fixture_id(&rig, "Podium Wash");
        let ptz = fixture_id(&rig, "PTZ 1");

        assert_eq!(
            rig.set_level(EntityRef::Fixture(stage), Axis::Pan, 100),
            Err(RigError::NotPtz(stage)),
        );

        rig.set_level(EntityRef::Fixture(ptz), Axis::Pan, 100).unwrap();
        rig.set_blade(ptz, Blade::B3, BladePart::Rotation, 42).unwrap();
        let changes = rig.take_changes();
        assert!(changes.iter().any(|c| c.field == Field::Pan));
        assert!(changes
            .iter()
            .any(|c| c.field == Field::BladeRot(Blade::B3)
                && c.new == FieldValue::U16(42)));
    }

    #[test]
    fn group_axis_mismatch_is_an_error() {
        let mut rig = test_rig();
        let gid = rig.stage_groups()[0].id();
        let err = rig
            .set_level(EntityRef::Group(gid), Axis::Pan, 1)
            .unwrap_err();
        assert!(matches!(err, RigError::NoSuchAxis { .. }));
    }
}
