//! The binding/sync engine.
//!
//! `SyncEngine` owns the rig, the preset store, and one state bundle per
//! connected surface (port, action table, selection cache, blade selectors,
//! name-entry modal). Everything runs on one logical dispatch thread: an
//! inbound event resolves to an action, the action mutates the rig, and the
//! rig's change journal is drained straight into channel writes on every
//! surface within the same call stack. Actions must not block.

use std::collections::HashMap;

use log::{debug, info, warn};
use thiserror::Error;

use crate::actions::{Action, ActionTable};
use crate::config::VenueConfig;
use crate::layout::{self, LayoutError, ListLayout, ListRole, SignalKind};
use crate::modal::{AlreadyOpen, CloseReason, TextEntry};
use crate::model::{
    Axis, Blade, BladePart, EntityRef, Field, FieldChange, FieldValue, Fixture, FixtureId,
    GroupId, Rig, RigError, StepDir,
};
use crate::store::{PresetLevel, PresetStore};
use crate::transport::{SignalValue, SurfaceEvent, SurfacePort};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unknown surface {0:?}")]
    UnknownSurface(String),
    #[error("expected {expected} surface ports, got {got}")]
    PortCount { expected: usize, got: usize },
    #[error("no {role:?} row for {entity:?}, subscription graph desynchronized")]
    OrdinalLookupMiss { role: ListRole, entity: EntityRef },
    #[error(transparent)]
    Rig(#[from] RigError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Per-surface selection bookkeeping, keyed by list role and ordinal. Local
/// scratch state only: never part of the rig and never written to another
/// surface.
#[derive(Debug, Default)]
pub struct SelectionCache {
    flags: HashMap<(ListRole, u16), bool>,
}

impl SelectionCache {
    pub fn get(&self, role: ListRole, ordinal: u16) -> bool {
        self.flags.get(&(role, ordinal)).copied().unwrap_or(false)
    }

    pub fn set(&mut self, role: ListRole, ordinal: u16, selected: bool) {
        self.flags.insert((role, ordinal), selected);
    }

    /// The one selected ordinal of a list, if any.
    pub fn selected(&self, role: ListRole) -> Option<u16> {
        self.flags
            .iter()
            .find(|((r, _), set)| *r == role && **set)
            .map(|((_, ordinal), _)| *ordinal)
    }
}

/// What the name-entry modal is collecting a name for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NameRequest {
    role: ListRole,
    group: GroupId,
}

struct Surface {
    name: String,
    port: Box<dyn SurfacePort>,
    table: ActionTable,
    selection: SelectionCache,
    modal: TextEntry<NameRequest>,
    /// Selected blade per PtzExtended row; the shared Blade/BladeRotation
    /// channels dispatch through this.
    blades: HashMap<u16, Blade>,
    /// Rows currently bound per preset list (sentinel included), so a
    /// rebuild knows which trailing rows to unbind.
    preset_rows: HashMap<ListRole, u16>,
}

pub struct SyncEngine {
    config: VenueConfig,
    rig: Rig,
    store: PresetStore,
    surfaces: Vec<Surface>,
    /// Stage group ids in master-list ordinal order.
    stage_order: Vec<GroupId>,
    master_ordinals: HashMap<GroupId, u16>,
    fixture_ordinals: HashMap<FixtureId, u16>,
    ptz_ordinals: HashMap<FixtureId, u16>,
}

impl SyncEngine {
    /// Build the per-surface bindings and render everything. `ports` pairs
    /// with `config.surfaces` by position. Ordinal assignment is frozen from
    /// the rig's iteration order here and never changes afterwards.
    pub fn new(
        config: VenueConfig,
        rig: Rig,
        store: PresetStore,
        ports: Vec<Box<dyn SurfacePort>>,
    ) -> Result<Self, SyncError> {
        if ports.len() != config.surfaces.len() {
            return Err(SyncError::PortCount {
                expected: config.surfaces.len(),
                got: ports.len(),
            });
        }

        let mut stage_order = Vec::new();
        let mut master_ordinals = HashMap::new();
        let mut fixture_ordinals = HashMap::new();
        let mut fixture_ordinal = 0u16;
        for (i, group) in rig.stage_groups().iter().enumerate() {
            stage_order.push(group.id());
            master_ordinals.insert(group.id(), (i + 1) as u16);
            for fixture in group.fixtures() {
                fixture_ordinal += 1;
                fixture_ordinals.insert(fixture.id(), fixture_ordinal);
            }
        }
        let ptz_ordinals = rig
            .ptz_group()
            .fixtures()
            .iter()
            .enumerate()
            .map(|(i, fixture)| (fixture.id(), (i + 1) as u16))
            .collect();

        let surfaces = config
            .surfaces
            .iter()
            .zip(ports)
            .map(|(name, port)| Surface {
                name: name.clone(),
                port,
                table: ActionTable::new(),
                selection: SelectionCache::default(),
                modal: TextEntry::new(),
                blades: HashMap::new(),
                preset_rows: HashMap::new(),
            })
            .collect();

        let mut engine = Self {
            config,
            rig,
            store,
            surfaces,
            stage_order,
            master_ordinals,
            fixture_ordinals,
            ptz_ordinals,
        };
        engine.render_all()?;
        info!(
            "[SYNC] engine up: {} surfaces, {} stage groups, {} PTZ fixtures",
            engine.surfaces.len(),
            engine.stage_order.len(),
            engine.ptz_ordinals.len()
        );
        Ok(engine)
    }

    pub fn surface_names(&self) -> impl Iterator<Item = &str> {
        self.surfaces.iter().map(|s| s.name.as_str())
    }

    /// Deliver one inbound surface event. Unbound channels and bool release
    /// edges are silent no-ops; everything resolved runs synchronously,
    /// including the fan-out of whatever it changed.
    pub fn dispatch(&mut self, surface: &str, event: SurfaceEvent) -> Result<(), SyncError> {
        let si = self
            .surfaces
            .iter()
            .position(|s| s.name == surface)
            .ok_or_else(|| SyncError::UnknownSurface(surface.to_string()))?;

        let action = match self.surfaces[si].table.resolve(event.channel, &event.value) {
            Some(action) => action.clone(),
            None => {
                debug!(
                    "[SYNC] unbound {:?} event on {} channel {}",
                    event.value.kind(),
                    surface,
                    event.channel
                );
                return Ok(());
            }
        };
        debug!("[SYNC] {} channel {} -> {:?}", surface, event.channel, action);

        self.run_action(si, &action, &event.value)?;
        self.fan_out()
    }

    fn run_action(
        &mut self,
        si: usize,
        action: &Action,
        value: &SignalValue,
    ) -> Result<(), SyncError> {
        match action {
            Action::Step { target, axis, dir } => self.rig.step_level(*target, *axis, *dir)?,
            Action::SetLevel { target, axis } => {
                if let SignalValue::U16(level) = value {
                    self.rig.set_level(*target, *axis, *level)?;
                }
            }
            Action::ToggleMute { target } => self.rig.toggle_muted(*target)?,
            Action::SelectMaster { ordinal } => self.select_stage_master(si, *ordinal)?,
            Action::OpenPtzOverlay => {
                let visibility = self.config.overlay.visibility;
                self.surfaces[si].port.write_bool(visibility, true);
            }
            Action::ClosePtzOverlay => {
                let visibility = self.config.overlay.visibility;
                self.surfaces[si].port.write_bool(visibility, false);
            }
            Action::SelectBlade {
                fixture,
                ordinal,
                blade,
            } => self.select_blade(si, *fixture, *ordinal, *blade)?,
            Action::SetBladeLevel {
                fixture,
                ordinal,
                part,
            } => {
                if let SignalValue::U16(level) = value {
                    let blade = self.selected_blade(si, *ordinal);
                    self.rig.set_blade(*fixture, blade, *part, *level)?;
                }
            }
            Action::StepBlade {
                fixture,
                ordinal,
                part,
                dir,
            } => {
                let blade = self.selected_blade(si, *ordinal);
                self.rig.step_blade(*fixture, blade, *part, *dir)?;
            }
            Action::LoadPreset { group, name } => self.load_preset(*group, name)?,
            Action::SavePreset { group, name } => self.save_preset(*group, name)?,
            Action::DeletePreset { role, group, name } => {
                self.delete_preset(*role, *group, name)?
            }
            Action::NewPreset { role } => self.new_preset(si, *role)?,
            Action::ModalText => {
                if let SignalValue::Text(text) = value {
                    self.surfaces[si].modal.set_text(text);
                }
            }
            Action::ModalCancel => {
                let visibility = self.config.modal.visibility;
                let surface = &mut self.surfaces[si];
                surface.modal.close(CloseReason::Cancel);
                surface.port.write_bool(visibility, false);
            }
            Action::ModalConfirm => self.confirm_modal(si)?,
        }
        Ok(())
    }

    fn selected_blade(&self, si: usize, ordinal: u16) -> Blade {
        self.surfaces[si]
            .blades
            .get(&ordinal)
            .copied()
            .unwrap_or(Blade::B1)
    }

    // ---- rendering -------------------------------------------------------

    fn render_all(&mut self) -> Result<(), SyncError> {
        for si in 0..self.surfaces.len() {
            self.render_stage_masters(si)?;
            self.render_stage_fixtures(si)?;
            self.render_ptz_master(si)?;
            self.render_ptz_fixtures(si)?;
            self.render_ptz_extended(si)?;
            self.rebuild_presets_on(si, ListRole::StagePresets)?;
            self.rebuild_presets_on(si, ListRole::PtzPresets)?;
            self.bind_overlay_and_modal(si);
            debug!("[SYNC] rendered surface {}", self.surfaces[si].name);
        }
        Ok(())
    }

    fn bind_overlay_and_modal(&mut self, si: usize) {
        let overlay = self.config.overlay;
        let modal = self.config.modal;
        let surface = &mut self.surfaces[si];

        surface
            .table
            .attach(SignalKind::Bool, overlay.close, Action::ClosePtzOverlay);
        surface
            .table
            .attach(SignalKind::Bool, modal.ok, Action::ModalConfirm);
        surface
            .table
            .attach(SignalKind::Bool, modal.cancel, Action::ModalCancel);
        surface
            .table
            .attach(SignalKind::Text, modal.text, Action::ModalText);

        surface.port.write_bool(overlay.visibility, false);
        surface.port.write_bool(modal.visibility, false);
        surface.port.write_string(modal.text, "");
    }

    fn render_stage_masters(&mut self, si: usize) -> Result<(), SyncError> {
        let layout = self.config.layout(ListRole::StageMasters);
        let surface = &mut self.surfaces[si];

        for (i, group) in self.rig.stage_groups().iter().enumerate() {
            let ordinal = (i + 1) as u16;
            let selected = surface.selection.get(ListRole::StageMasters, ordinal);
            write_master_row(
                surface,
                layout,
                ordinal,
                &group.name,
                group.intensity(),
                group.muted(),
                selected,
            )?;
            attach_master_actions(
                &mut surface.table,
                layout,
                ordinal,
                EntityRef::Group(group.id()),
                Action::SelectMaster { ordinal },
            )?;
        }
        surface
            .port
            .write_u16(layout.count_channel, self.rig.stage_groups().len() as u16);
        Ok(())
    }

    fn render_stage_fixtures(&mut self, si: usize) -> Result<(), SyncError> {
        let layout = self.config.layout(ListRole::StageFixtures);
        let surface = &mut self.surfaces[si];

        let mut ordinal = 0u16;
        for (i, group) in self.rig.stage_groups().iter().enumerate() {
            let group_selected = surface.selection.get(ListRole::StageMasters, (i + 1) as u16);
            for fixture in group.fixtures() {
                ordinal += 1;
                write_fixture_row(surface, layout, ordinal, fixture, group_selected)?;
                attach_fixture_actions(&mut surface.table, layout, ordinal, fixture.id())?;
            }
        }
        surface.port.write_u16(layout.count_channel, ordinal);
        Ok(())
    }

    fn render_ptz_master(&mut self, si: usize) -> Result<(), SyncError> {
        let layout = self.config.layout(ListRole::PtzMaster);
        let surface = &mut self.surfaces[si];
        let group = self.rig.ptz_group();

        write_master_row(
            surface,
            layout,
            1,
            &group.name,
            group.intensity(),
            group.muted(),
            false,
        )?;
        // The PTZ master's select opens the detail overlay instead of doing
        // selection bookkeeping.
        attach_master_actions(
            &mut surface.table,
            layout,
            1,
            EntityRef::Group(group.id()),
            Action::OpenPtzOverlay,
        )?;
        surface.port.write_u16(layout.count_channel, 1);
        Ok(())
    }

    fn render_ptz_fixtures(&mut self, si: usize) -> Result<(), SyncError> {
        let layout = self.config.layout(ListRole::PtzFixtures);
        let surface = &mut self.surfaces[si];

        let fixtures = self.rig.ptz_group().fixtures();
        for (i, fixture) in fixtures.iter().enumerate() {
            let ordinal = (i + 1) as u16;
            write_fixture_row(surface, layout, ordinal, fixture, false)?;
            attach_fixture_actions(&mut surface.table, layout, ordinal, fixture.id())?;
        }
        surface
            .port
            .write_u16(layout.count_channel, fixtures.len() as u16);
        Ok(())
    }

    fn render_ptz_extended(&mut self, si: usize) -> Result<(), SyncError> {
        let layout = self.config.layout(ListRole::PtzExtended);
        let surface = &mut self.surfaces[si];

        let count = self.rig.ptz_group().fixtures().len() as u16;
        for (i, fixture) in self.rig.ptz_group().fixtures().iter().enumerate() {
            let ordinal = (i + 1) as u16;
            let fid = fixture.id();
            let target = EntityRef::Fixture(fid);

            surface.port.write_string(
                layout.channel(SignalKind::Text, ordinal, layout::extended::NAME)?,
                &fixture.name,
            );
            for (field, axis) in [
                (layout::extended::PAN, Axis::Pan),
                (layout::extended::TILT, Axis::Tilt),
                (layout::extended::ZOOM, Axis::Zoom),
                (layout::extended::FOCUS, Axis::Focus),
                (layout::extended::IRIS, Axis::Iris),
            ] {
                let channel = layout.channel(SignalKind::U16, ordinal, field)?;
                surface.port.write_u16(channel, self.rig.level(target, axis)?);
                surface
                    .table
                    .attach(SignalKind::U16, channel, Action::SetLevel { target, axis });
            }

            let blade = *surface.blades.entry(ordinal).or_insert(Blade::B1);
            for (idx, candidate) in Blade::ALL.into_iter().enumerate() {
                let channel = layout.channel(
                    SignalKind::Bool,
                    ordinal,
                    layout::extended::BLADE_SELECT[idx],
                )?;
                surface.port.write_bool(channel, candidate == blade);
                surface.table.attach(
                    SignalKind::Bool,
                    channel,
                    Action::SelectBlade {
                        fixture: fid,
                        ordinal,
                        blade: candidate,
                    },
                );
            }
            for (field, part) in [
                (layout::extended::BLADE, BladePart::Position),
                (layout::extended::BLADE_ROTATION, BladePart::Rotation),
            ] {
                let channel = layout.channel(SignalKind::U16, ordinal, field)?;
                surface
                    .port
                    .write_u16(channel, self.rig.blade_level(fid, blade, part)?);
                surface.table.attach(
                    SignalKind::U16,
                    channel,
                    Action::SetBladeLevel {
                        fixture: fid,
                        ordinal,
                        part,
                    },
                );
            }

            for (field, axis, dir) in [
                (layout::extended::ZOOM_PLUS, Axis::Zoom, StepDir::Up),
                (layout::extended::ZOOM_MINUS, Axis::Zoom, StepDir::Down),
                (layout::extended::FOCUS_PLUS, Axis::Focus, StepDir::Up),
                (layout::extended::FOCUS_MINUS, Axis::Focus, StepDir::Down),
                (layout::extended::IRIS_PLUS, Axis::Iris, StepDir::Up),
                (layout::extended::IRIS_MINUS, Axis::Iris, StepDir::Down),
            ] {
                surface.table.attach(
                    SignalKind::Bool,
                    layout.channel(SignalKind::Bool, ordinal, field)?,
                    Action::Step { target, axis, dir },
                );
            }
            for (field, part, dir) in [
                (layout::extended::BLADE_PLUS, BladePart::Position, StepDir::Up),
                (
                    layout::extended::BLADE_MINUS,
                    BladePart::Position,
                    StepDir::Down,
                ),
                (
                    layout::extended::BLADE_ROTATE_PLUS,
                    BladePart::Rotation,
                    StepDir::Up,
                ),
                (
                    layout::extended::BLADE_ROTATE_MINUS,
                    BladePart::Rotation,
                    StepDir::Down,
                ),
            ] {
                surface.table.attach(
                    SignalKind::Bool,
                    layout.channel(SignalKind::Bool, ordinal, field)?,
                    Action::StepBlade {
                        fixture: fid,
                        ordinal,
                        part,
                        dir,
                    },
                );
            }
        }
        surface.port.write_u16(layout.count_channel, count);
        Ok(())
    }

    // ---- selection -------------------------------------------------------

    /// Single-select a stage master on the originating surface: every master
    /// row's selected flag and channel update, and every fixture row mirrors
    /// its group's flag. Selection is surface-local, other surfaces are
    /// untouched.
    fn select_stage_master(&mut self, si: usize, ordinal: u16) -> Result<(), SyncError> {
        let masters = self.config.layout(ListRole::StageMasters);
        let fixtures = self.config.layout(ListRole::StageFixtures);
        let surface = &mut self.surfaces[si];

        let mut fixture_ordinal = 0u16;
        for (i, group) in self.rig.stage_groups().iter().enumerate() {
            let master_ordinal = (i + 1) as u16;
            let selected = master_ordinal == ordinal;
            surface
                .selection
                .set(ListRole::StageMasters, master_ordinal, selected);
            surface.port.write_bool(
                masters.channel(SignalKind::Bool, master_ordinal, layout::master::SELECTED)?,
                selected,
            );
            for _ in group.fixtures() {
                fixture_ordinal += 1;
                surface.port.write_bool(
                    fixtures.channel(SignalKind::Bool, fixture_ordinal, layout::fixture::SELECTED)?,
                    selected,
                );
            }
        }
        Ok(())
    }

    /// Switch one extended row's shared blade channels to another blade:
    /// re-light the indicators and refresh the shared position and rotation
    /// values from the newly selected blade.
    fn select_blade(
        &mut self,
        si: usize,
        fixture: FixtureId,
        ordinal: u16,
        blade: Blade,
    ) -> Result<(), SyncError> {
        let layout = self.config.layout(ListRole::PtzExtended);
        let position = self.rig.blade_level(fixture, blade, BladePart::Position)?;
        let rotation = self.rig.blade_level(fixture, blade, BladePart::Rotation)?;

        let surface = &mut self.surfaces[si];
        surface.blades.insert(ordinal, blade);
        for (idx, candidate) in Blade::ALL.into_iter().enumerate() {
            surface.port.write_bool(
                layout.channel(SignalKind::Bool, ordinal, layout::extended::BLADE_SELECT[idx])?,
                candidate == blade,
            );
        }
        surface.port.write_u16(
            layout.channel(SignalKind::U16, ordinal, layout::extended::BLADE)?,
            position,
        );
        surface.port.write_u16(
            layout.channel(SignalKind::U16, ordinal, layout::extended::BLADE_ROTATION)?,
            rotation,
        );
        Ok(())
    }

    // ---- presets ---------------------------------------------------------

    fn load_preset(&mut self, group: GroupId, name: &str) -> Result<(), SyncError> {
        let (group_name, members) = {
            let group = self.rig.group(group).ok_or(RigError::UnknownGroup(group))?;
            let members: Vec<(String, FixtureId)> = group
                .fixtures()
                .iter()
                .map(|f| (f.name.clone(), f.id()))
                .collect();
            (group.name.clone(), members)
        };

        let levels = match self.store.load(name, &group_name) {
            Ok(levels) => levels,
            Err(err) => {
                warn!(
                    "[SYNC] loading preset {:?} for {:?} failed: {:#}",
                    name, group_name, err
                );
                return Ok(());
            }
        };

        // Apply through the rig so the change journal fans the stored
        // values out like any other mutation.
        for level in levels {
            match members.iter().find(|(n, _)| *n == level.fixture_name) {
                Some((_, id)) => {
                    let target = EntityRef::Fixture(*id);
                    self.rig.set_level(target, Axis::Intensity, level.intensity)?;
                    self.rig.set_muted(target, level.muted)?;
                }
                None => warn!(
                    "[SYNC] preset {:?} names unknown fixture {:?}, skipping",
                    name, level.fixture_name
                ),
            }
        }
        info!("[SYNC] loaded preset {:?} for {:?}", name, group_name);
        Ok(())
    }

    /// Save-in-place: the name set is unchanged so no rebuild is needed.
    fn save_preset(&mut self, group: GroupId, name: &str) -> Result<(), SyncError> {
        let (group_name, snapshot) = self.snapshot(group)?;
        match self.store.save(name, &group_name, &snapshot) {
            Ok(()) => info!("[SYNC] saved preset {:?} for {:?}", name, group_name),
            Err(err) => warn!(
                "[SYNC] saving preset {:?} for {:?} failed: {:#}",
                name, group_name, err
            ),
        }
        Ok(())
    }

    fn delete_preset(
        &mut self,
        role: ListRole,
        group: GroupId,
        name: &str,
    ) -> Result<(), SyncError> {
        let group_name = self
            .rig
            .group(group)
            .ok_or(RigError::UnknownGroup(group))?
            .name
            .clone();
        if let Err(err) = self.store.delete(name, &group_name) {
            warn!(
                "[SYNC] deleting preset {:?} for {:?} failed, keeping previous render: {:#}",
                name, group_name, err
            );
            return Ok(());
        }
        info!("[SYNC] deleted preset {:?} for {:?}", name, group_name);
        // Every later row's ordinal shifted, so the list re-renders in full,
        // on every surface.
        self.rebuild_presets(role)
    }

    fn new_preset(&mut self, si: usize, role: ListRole) -> Result<(), SyncError> {
        let group = match role {
            ListRole::PtzPresets => Some(self.rig.ptz_group().id()),
            _ => self.surfaces[si]
                .selection
                .selected(ListRole::StageMasters)
                .and_then(|ordinal| self.stage_order.get(ordinal as usize - 1).copied()),
        };
        let Some(group) = group else {
            debug!("[SYNC] new-preset pressed with no master selected");
            return Ok(());
        };

        let modal = self.config.modal;
        let surface = &mut self.surfaces[si];
        match surface.modal.open("", NameRequest { role, group }) {
            Ok(()) => {
                surface.port.write_string(modal.text, "");
                surface.port.write_bool(modal.visibility, true);
            }
            Err(AlreadyOpen) => {
                warn!("[SYNC] name entry already open on {}", surface.name);
            }
        }
        Ok(())
    }

    fn confirm_modal(&mut self, si: usize) -> Result<(), SyncError> {
        let modal = self.config.modal;
        let completion = {
            let surface = &mut self.surfaces[si];
            let completion = surface.modal.close(CloseReason::Confirm);
            surface.port.write_bool(modal.visibility, false);
            completion
        };
        let Some((request, _, text)) = completion else {
            return Ok(());
        };
        if text.is_empty() {
            debug!("[SYNC] empty preset name, nothing saved");
            return Ok(());
        }

        let (group_name, snapshot) = self.snapshot(request.group)?;
        if let Err(err) = self.store.save(&text, &group_name, &snapshot) {
            warn!(
                "[SYNC] saving preset {:?} for {:?} failed: {:#}",
                text, group_name, err
            );
            return Ok(());
        }
        info!("[SYNC] created preset {:?} for {:?}", text, group_name);
        self.rebuild_presets(request.role)
    }

    fn snapshot(&self, group: GroupId) -> Result<(String, Vec<PresetLevel>), SyncError> {
        let group = self.rig.group(group).ok_or(RigError::UnknownGroup(group))?;
        let levels = group
            .fixtures()
            .iter()
            .map(|f| PresetLevel {
                fixture_name: f.name.clone(),
                intensity: f.intensity(),
                muted: f.muted(),
            })
            .collect();
        Ok((group.name.clone(), levels))
    }

    fn rebuild_presets(&mut self, role: ListRole) -> Result<(), SyncError> {
        for si in 0..self.surfaces.len() {
            self.rebuild_presets_on(si, role)?;
        }
        Ok(())
    }

    /// Re-render one preset list from the store: one row per stored name in
    /// group-then-insertion order, then the "New"/"Preset" sentinel. A store
    /// failure abandons the rebuild and leaves the previous render in place.
    fn rebuild_presets_on(&mut self, si: usize, role: ListRole) -> Result<(), SyncError> {
        let groups: Vec<(GroupId, String)> = match role {
            ListRole::PtzPresets => {
                let group = self.rig.ptz_group();
                vec![(group.id(), group.name.clone())]
            }
            _ => self
                .rig
                .stage_groups()
                .iter()
                .map(|g| (g.id(), g.name.clone()))
                .collect(),
        };
        let mut rows: Vec<(GroupId, String, String)> = Vec::new();
        for (gid, group_name) in groups {
            match self.store.list(&group_name) {
                Ok(names) => {
                    rows.extend(names.into_iter().map(|n| (gid, group_name.clone(), n)));
                }
                Err(err) => {
                    warn!(
                        "[SYNC] listing presets for {:?} failed, keeping previous render: {:#}",
                        group_name, err
                    );
                    return Ok(());
                }
            }
        }

        let layout = self.config.layout(role);
        let surface = &mut self.surfaces[si];
        let count = (rows.len() + 1) as u16;

        for (i, (group, group_name, name)) in rows.iter().enumerate() {
            let ordinal = (i + 1) as u16;
            write_preset_row(surface, layout, ordinal, group_name, name, true)?;
            attach_preset_actions(&mut surface.table, layout, ordinal, role, *group, name)?;
        }

        // Sentinel row: save/delete disabled, select collects a new name.
        write_preset_row(surface, layout, count, "New", "Preset", false)?;
        surface.table.attach(
            SignalKind::Bool,
            layout.channel(SignalKind::Bool, count, layout::preset::SELECTED)?,
            Action::NewPreset { role },
        );
        surface.table.detach(
            SignalKind::Bool,
            layout.channel(SignalKind::Bool, count, layout::preset::SAVE)?,
        );
        surface.table.detach(
            SignalKind::Bool,
            layout.channel(SignalKind::Bool, count, layout::preset::DELETE)?,
        );

        // Unbind trailing rows from a previous, longer render; the surface
        // blanks them from the count write.
        let previous = surface.preset_rows.insert(role, count).unwrap_or(0);
        for ordinal in (count + 1)..=previous {
            for field in [
                layout::preset::SELECTED,
                layout::preset::SAVE,
                layout::preset::DELETE,
            ] {
                surface.table.detach(
                    SignalKind::Bool,
                    layout.channel(SignalKind::Bool, ordinal, field)?,
                );
            }
        }

        surface.port.write_u16(layout.count_channel, count);
        Ok(())
    }

    // ---- fan-out ---------------------------------------------------------

    /// Drain the rig's change journal into channel writes on every surface.
    fn fan_out(&mut self) -> Result<(), SyncError> {
        for change in self.rig.take_changes() {
            self.apply_change(&change)?;
        }
        Ok(())
    }

    fn apply_change(&mut self, change: &FieldChange) -> Result<(), SyncError> {
        match change.entity {
            EntityRef::Group(id) => {
                let (role, ordinal) = if id == self.rig.ptz_group().id() {
                    (ListRole::PtzMaster, 1)
                } else {
                    let ordinal =
                        *self
                            .master_ordinals
                            .get(&id)
                            .ok_or(SyncError::OrdinalLookupMiss {
                                role: ListRole::StageMasters,
                                entity: change.entity,
                            })?;
                    (ListRole::StageMasters, ordinal)
                };
                let layout = self.config.layout(role);
                match (change.field, change.new) {
                    (Field::Intensity, FieldValue::U16(level)) => {
                        let channel =
                            layout.channel(SignalKind::U16, ordinal, layout::master::INTENSITY)?;
                        for surface in &mut self.surfaces {
                            surface.port.write_u16(channel, level);
                        }
                    }
                    (Field::Muted, FieldValue::Bool(muted)) => {
                        let channel =
                            layout.channel(SignalKind::Bool, ordinal, layout::master::TOGGLE)?;
                        for surface in &mut self.surfaces {
                            // The toggle displays lit == unmuted.
                            surface.port.write_bool(channel, !muted);
                        }
                    }
                    _ => {}
                }
            }
            EntityRef::Fixture(id) => {
                if let Some(&ordinal) = self.fixture_ordinals.get(&id) {
                    self.apply_fixture_change(ListRole::StageFixtures, ordinal, change)?;
                } else if let Some(&ordinal) = self.ptz_ordinals.get(&id) {
                    self.apply_fixture_change(ListRole::PtzFixtures, ordinal, change)?;
                    self.apply_extended_change(ordinal, change)?;
                } else {
                    return Err(SyncError::OrdinalLookupMiss {
                        role: ListRole::StageFixtures,
                        entity: change.entity,
                    });
                }
            }
        }
        Ok(())
    }

    fn apply_fixture_change(
        &mut self,
        role: ListRole,
        ordinal: u16,
        change: &FieldChange,
    ) -> Result<(), SyncError> {
        enum Write {
            Level(u32, u16),
            Flag(u32, bool),
        }
        let layout = self.config.layout(role);
        let write = match (change.field, change.new) {
            (Field::Intensity, FieldValue::U16(level)) => {
                Write::Level(layout::fixture::INTENSITY, level)
            }
            (Field::EffectiveIntensity, FieldValue::U16(level)) => {
                Write::Level(layout::fixture::EFFECTIVE_INTENSITY, level)
            }
            (Field::Muted, FieldValue::Bool(muted)) => {
                Write::Flag(layout::fixture::TOGGLE, !muted)
            }
            (Field::EffectiveMute, FieldValue::Bool(muted)) => {
                Write::Flag(layout::fixture::EFFECTIVE_ON, !muted)
            }
            _ => return Ok(()),
        };
        match write {
            Write::Level(field, level) => {
                let channel = layout.channel(SignalKind::U16, ordinal, field)?;
                for surface in &mut self.surfaces {
                    surface.port.write_u16(channel, level);
                }
            }
            Write::Flag(field, flag) => {
                let channel = layout.channel(SignalKind::Bool, ordinal, field)?;
                for surface in &mut self.surfaces {
                    surface.port.write_bool(channel, flag);
                }
            }
        }
        Ok(())
    }

    /// Axis changes mirror to the extended list. Blade changes mirror only
    /// to surfaces whose selector for that row currently shows that blade.
    fn apply_extended_change(
        &mut self,
        ordinal: u16,
        change: &FieldChange,
    ) -> Result<(), SyncError> {
        let FieldValue::U16(level) = change.new else {
            return Ok(());
        };
        let (field, gate) = match change.field {
            Field::Pan => (layout::extended::PAN, None),
            Field::Tilt => (layout::extended::TILT, None),
            Field::Zoom => (layout::extended::ZOOM, None),
            Field::Focus => (layout::extended::FOCUS, None),
            Field::Iris => (layout::extended::IRIS, None),
            Field::BladePos(blade) => (layout::extended::BLADE, Some(blade)),
            Field::BladeRot(blade) => (layout::extended::BLADE_ROTATION, Some(blade)),
            // Intensity and mute belong to the fixtures list.
            _ => return Ok(()),
        };
        let layout = self.config.layout(ListRole::PtzExtended);
        let channel = layout.channel(SignalKind::U16, ordinal, field)?;
        for surface in &mut self.surfaces {
            if let Some(blade) = gate {
                if surface.blades.get(&ordinal).copied() != Some(blade) {
                    continue;
                }
            }
            surface.port.write_u16(channel, level);
        }
        Ok(())
    }
}

fn write_master_row(
    surface: &mut Surface,
    layout: &ListLayout,
    ordinal: u16,
    name: &str,
    intensity: u16,
    muted: bool,
    selected: bool,
) -> Result<(), SyncError> {
    surface.port.write_string(
        layout.channel(SignalKind::Text, ordinal, layout::master::NAME)?,
        name,
    );
    surface.port.write_u16(
        layout.channel(SignalKind::U16, ordinal, layout::master::INTENSITY)?,
        intensity,
    );
    surface.port.write_bool(
        layout.channel(SignalKind::Bool, ordinal, layout::master::TOGGLE)?,
        !muted,
    );
    surface.port.write_bool(
        layout.channel(SignalKind::Bool, ordinal, layout::master::SELECTED)?,
        selected,
    );
    Ok(())
}

fn attach_master_actions(
    table: &mut ActionTable,
    layout: &ListLayout,
    ordinal: u16,
    target: EntityRef,
    select: Action,
) -> Result<(), SyncError> {
    table.attach(
        SignalKind::Bool,
        layout.channel(SignalKind::Bool, ordinal, layout::master::SELECTED)?,
        select,
    );
    table.attach(
        SignalKind::Bool,
        layout.channel(SignalKind::Bool, ordinal, layout::master::TOGGLE)?,
        Action::ToggleMute { target },
    );
    table.attach(
        SignalKind::Bool,
        layout.channel(SignalKind::Bool, ordinal, layout::master::RAISE)?,
        Action::Step {
            target,
            axis: Axis::Intensity,
            dir: StepDir::Up,
        },
    );
    table.attach(
        SignalKind::Bool,
        layout.channel(SignalKind::Bool, ordinal, layout::master::LOWER)?,
        Action::Step {
            target,
            axis: Axis::Intensity,
            dir: StepDir::Down,
        },
    );
    table.attach(
        SignalKind::U16,
        layout.channel(SignalKind::U16, ordinal, layout::master::INTENSITY)?,
        Action::SetLevel {
            target,
            axis: Axis::Intensity,
        },
    );
    Ok(())
}

fn write_fixture_row(
    surface: &mut Surface,
    layout: &ListLayout,
    ordinal: u16,
    fixture: &Fixture,
    selected: bool,
) -> Result<(), SyncError> {
    surface.port.write_string(
        layout.channel(SignalKind::Text, ordinal, layout::fixture::NAME)?,
        &fixture.name,
    );
    surface.port.write_u16(
        layout.channel(SignalKind::U16, ordinal, layout::fixture::INTENSITY)?,
        fixture.intensity(),
    );
    surface.port.write_u16(
        layout.channel(SignalKind::U16, ordinal, layout::fixture::EFFECTIVE_INTENSITY)?,
        fixture.effective_intensity(),
    );
    surface.port.write_bool(
        layout.channel(SignalKind::Bool, ordinal, layout::fixture::TOGGLE)?,
        !fixture.muted(),
    );
    surface.port.write_bool(
        layout.channel(SignalKind::Bool, ordinal, layout::fixture::EFFECTIVE_ON)?,
        !fixture.effective_mute(),
    );
    surface.port.write_bool(
        layout.channel(SignalKind::Bool, ordinal, layout::fixture::SELECTED)?,
        selected,
    );
    Ok(())
}

fn attach_fixture_actions(
    table: &mut ActionTable,
    layout: &ListLayout,
    ordinal: u16,
    fixture: FixtureId,
) -> Result<(), SyncError> {
    let target = EntityRef::Fixture(fixture);
    table.attach(
        SignalKind::Bool,
        layout.channel(SignalKind::Bool, ordinal, layout::fixture::TOGGLE)?,
        Action::ToggleMute { target },
    );
    table.attach(
        SignalKind::Bool,
        layout.channel(SignalKind::Bool, ordinal, layout::fixture::RAISE)?,
        Action::Step {
            target,
            axis: Axis::Intensity,
            dir: StepDir::Up,
        },
    );
    table.attach(
        SignalKind::Bool,
        layout.channel(SignalKind::Bool, ordinal, layout::fixture::LOWER)?,
        Action::Step {
            target,
            axis: Axis::Intensity,
            dir: StepDir::Down,
        },
    );
    table.attach(
        SignalKind::U16,
        layout.channel(SignalKind::U16, ordinal, layout::fixture::INTENSITY)?,
        Action::SetLevel {
            target,
            axis: Axis::Intensity,
        },
    );
    Ok(())
}

fn write_preset_row(
    surface: &mut Surface,
    layout: &ListLayout,
    ordinal: u16,
    master_name: &str,
    name: &str,
    enabled: bool,
) -> Result<(), SyncError> {
    surface.port.write_string(
        layout.channel(SignalKind::Text, ordinal, layout::preset::MASTER_NAME)?,
        master_name,
    );
    surface.port.write_string(
        layout.channel(SignalKind::Text, ordinal, layout::preset::NAME)?,
        name,
    );
    surface.port.write_bool(
        layout.channel(SignalKind::Bool, ordinal, layout::preset::SAVE_DELETE_ENABLED)?,
        enabled,
    );
    surface.port.write_bool(
        layout.channel(SignalKind::Bool, ordinal, layout::preset::SELECTED)?,
        false,
    );
    Ok(())
}

fn attach_preset_actions(
    table: &mut ActionTable,
    layout: &ListLayout,
    ordinal: u16,
    role: ListRole,
    group: GroupId,
    name: &str,
) -> Result<(), SyncError> {
    table.attach(
        SignalKind::Bool,
        layout.channel(SignalKind::Bool, ordinal, layout::preset::SELECTED)?,
        Action::LoadPreset {
            group,
            name: name.to_string(),
        },
    );
    table.attach(
        SignalKind::Bool,
        layout.channel(SignalKind::Bool, ordinal, layout::preset::SAVE)?,
        Action::SavePreset {
            group,
            name: name.to_string(),
        },
    );
    table.attach(
        SignalKind::Bool,
        layout.channel(SignalKind::Bool, ordinal, layout::preset::DELETE)?,
        Action::DeletePreset {
            role,
            group,
            name: name.to_string(),
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::layout::Channel;
    use crate::transport::PortWrite;

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<PortWrite>>>);

    impl Recorder {
        fn clear(&self) {
            self.0.borrow_mut().clear();
        }

        fn writes(&self) -> Vec<PortWrite> {
            self.0.borrow().clone()
        }

        fn last_bool(&self, channel: Channel) -> Option<bool> {
            self.0.borrow().iter().rev().find_map(|w| match w {
                PortWrite::Bool(c, v) if *c == channel => Some(*v),
                _ => None,
            })
        }

        fn last_u16(&self, channel: Channel) -> Option<u16> {
            self.0.borrow().iter().rev().find_map(|w| match w {
                PortWrite::U16(c, v) if *c == channel => Some(*v),
                _ => None,
            })
        }

        fn last_text(&self, channel: Channel) -> Option<String> {
            self.0.borrow().iter().rev().find_map(|w| match w {
                PortWrite::Text(c, v) if *c == channel => Some(v.clone()),
                _ => None,
            })
        }
    }

    impl SurfacePort for Recorder {
        fn write_bool(&mut self, channel: Channel, value: bool) {
            self.0.borrow_mut().push(PortWrite::Bool(channel, value));
        }

        fn write_u16(&mut self, channel: Channel, value: u16) {
            self.0.borrow_mut().push(PortWrite::U16(channel, value));
        }

        fn write_string(&mut self, channel: Channel, value: &str) {
            self.0
                .borrow_mut()
                .push(PortWrite::Text(channel, value.to_string()));
        }
    }

    /// Demo venue, two recording surfaces "booth" and "stage-left".
    fn engine() -> (SyncEngine, Recorder, Recorder) {
        let config = VenueConfig::demo();
        config.validate().unwrap();
        let rig = config.build_rig().unwrap();
        let store = PresetStore::open_in_memory().unwrap();
        let booth = Recorder::default();
        let left = Recorder::default();
        let engine = SyncEngine::new(
            config,
            rig,
            store,
            vec![Box::new(booth.clone()), Box::new(left.clone())],
        )
        .unwrap();
        (engine, booth, left)
    }

    fn press(engine: &mut SyncEngine, surface: &str, channel: Channel) {
        for value in [SignalValue::Bool(true), SignalValue::Bool(false)] {
            engine
                .dispatch(surface, SurfaceEvent { channel, value })
                .unwrap();
        }
    }

    fn set(engine: &mut SyncEngine, surface: &str, channel: Channel, level: u16) {
        engine
            .dispatch(
                surface,
                SurfaceEvent {
                    channel,
                    value: SignalValue::U16(level),
                },
            )
            .unwrap();
    }

    // Demo venue channels used below (base + (ordinal-1)*stride + field):
    // stage masters at 1000/10, stage fixtures at 1100/10, PTZ master at
    // 1200/10, PTZ extended at 1400 with bool stride 30 and u16 stride 20,
    // stage presets at 1600/10 with count channel 1790.

    #[test]
    fn initial_render_covers_every_row() {
        let (_engine, booth, left) = engine();
        assert_eq!(booth.last_text(1001), Some("Podium".into()));
        assert_eq!(booth.last_text(1011), Some("Stage".into()));
        assert_eq!(booth.last_u16(1090), Some(2), "master count");
        assert_eq!(booth.last_text(1101), Some("Podium Wash".into()));
        assert_eq!(booth.last_u16(1190), Some(4), "fixture count");
        assert_eq!(left.last_text(1201), Some("PTZ".into()));
        assert_eq!(left.last_u16(1790), Some(1), "empty list renders sentinel only");
        assert_eq!(left.last_text(1601), Some("New".into()));
        assert_eq!(left.last_text(1602), Some("Preset".into()));
        assert_eq!(left.last_bool(107), Some(false), "overlay starts hidden");
        assert_eq!(left.last_bool(120), Some(false), "modal starts hidden");
    }

    #[test]
    fn direct_set_fans_out_to_every_surface() {
        let (mut engine, booth, left) = engine();
        booth.clear();
        left.clear();

        // Podium Wash intensity slider: fixture ordinal 1, u16 field 1.
        set(&mut engine, "booth", 1101, 32768);

        assert_eq!(booth.last_u16(1101), Some(32768));
        assert_eq!(left.last_u16(1101), Some(32768), "second surface mirrors");
        assert_eq!(left.last_u16(1111), None, "Podium Spot untouched");
    }

    #[test]
    fn mute_toggled_on_one_surface_mirrors_on_the_other() {
        let (mut engine, booth, left) = engine();
        booth.clear();
        left.clear();

        // Podium master toggle: bool field 6, ordinal 1.
        press(&mut engine, "booth", 1006);

        assert_eq!(left.last_bool(1006), Some(false), "lit means unmuted");
        // Both member rows report effective mute on both surfaces.
        assert_eq!(booth.last_bool(1108), Some(false));
        assert_eq!(left.last_bool(1118), Some(false));

        press(&mut engine, "stage-left", 1006);
        assert_eq!(booth.last_bool(1006), Some(true));
    }

    #[test]
    fn bool_release_has_no_effect() {
        let (mut engine, booth, _left) = engine();
        booth.clear();
        engine
            .dispatch(
                "booth",
                SurfaceEvent {
                    channel: 1006,
                    value: SignalValue::Bool(false),
                },
            )
            .unwrap();
        assert!(booth.writes().is_empty(), "release edge writes nothing");
    }

    #[test]
    fn raise_steps_and_lower_clamps_at_zero() {
        let (mut engine, booth, left) = engine();
        booth.clear();
        left.clear();

        // Podium master raise: bool field 3, ordinal 1.
        press(&mut engine, "booth", 1003);
        assert_eq!(left.last_u16(1001), Some(crate::model::LEVEL_STEP));

        press(&mut engine, "booth", 1005);
        press(&mut engine, "booth", 1005); // lowering at zero stays at zero
        assert_eq!(left.last_u16(1001), Some(0));
    }

    #[test]
    fn selection_is_surface_local_and_single() {
        let (mut engine, booth, left) = engine();
        booth.clear();
        left.clear();

        press(&mut engine, "booth", 1001); // select Podium
        press(&mut engine, "booth", 1011); // then Stage

        assert_eq!(booth.last_bool(1001), Some(false), "Podium deselected");
        assert_eq!(booth.last_bool(1011), Some(true));
        // Fixture rows mirror their group's flag; Stage owns rows 3 and 4.
        assert_eq!(booth.last_bool(1121), Some(true));
        assert_eq!(booth.last_bool(1101), Some(false));
        assert!(left.writes().is_empty(), "selection never leaves the surface");
    }

    #[test]
    fn ptz_master_select_opens_the_overlay_locally() {
        let (mut engine, booth, left) = engine();
        booth.clear();
        left.clear();

        press(&mut engine, "booth", 1201);
        assert_eq!(booth.last_bool(107), Some(true));
        assert!(left.writes().is_empty());

        press(&mut engine, "booth", 701);
        assert_eq!(booth.last_bool(107), Some(false));
    }

    #[test]
    fn blade_selector_switches_the_shared_channels() {
        let (mut engine, booth, left) = engine();

        // Set blade 1 position on extended row 1 (shared u16 field 8).
        set(&mut engine, "booth", 1408, 500);
        assert_eq!(booth.last_u16(1408), Some(500));
        assert_eq!(left.last_u16(1408), Some(500), "both rows show blade 1");

        // Switch booth's row to blade 2: indicators flip and the shared
        // channels refresh from blade 2 (still zero).
        press(&mut engine, "booth", 1424);
        assert_eq!(booth.last_bool(1423), Some(false));
        assert_eq!(booth.last_bool(1424), Some(true));
        assert_eq!(booth.last_u16(1408), Some(0));

        booth.clear();
        left.clear();

        // Blade 2 moves: only booth, whose selector shows blade 2, mirrors.
        set(&mut engine, "booth", 1408, 777);
        assert_eq!(booth.last_u16(1408), Some(777));
        assert_eq!(left.last_u16(1408), None, "stage-left still shows blade 1");
    }

    #[test]
    fn preset_rebuild_is_idempotent() {
        let (mut engine, booth, _left) = engine();
        for name in ["Warm", "Cool"] {
            engine.store.save(name, "Podium", &[]).unwrap();
        }

        engine.rebuild_presets(ListRole::StagePresets).unwrap();
        booth.clear();
        engine.rebuild_presets(ListRole::StagePresets).unwrap();
        let first = booth.writes();
        booth.clear();
        engine.rebuild_presets(ListRole::StagePresets).unwrap();
        assert_eq!(booth.writes(), first, "no store mutation, identical render");
        assert_eq!(booth.last_u16(1790), Some(3), "two rows plus sentinel");
    }

    #[test]
    fn deleting_a_preset_shifts_later_rows_up() {
        let (mut engine, booth, left) = engine();
        for name in ["a", "b", "p", "c"] {
            engine.store.save(name, "Podium", &[]).unwrap();
        }
        engine.rebuild_presets(ListRole::StagePresets).unwrap();
        assert_eq!(booth.last_u16(1790), Some(5));

        // Row 3 ("p") delete button: bool field 3.
        press(&mut engine, "booth", 1623);

        for (recorder, label) in [(&booth, "booth"), (&left, "stage-left")] {
            assert_eq!(recorder.last_text(1602), Some("a".into()), "{label}");
            assert_eq!(recorder.last_text(1612), Some("b".into()), "{label}");
            assert_eq!(recorder.last_text(1622), Some("c".into()), "{label}");
            assert_eq!(recorder.last_text(1631), Some("New".into()), "{label}");
            assert_eq!(recorder.last_u16(1790), Some(4), "{label}");
        }

        // The list shrank, so the old row 5 select must be unbound.
        booth.clear();
        press(&mut engine, "booth", 1641);
        assert!(booth.writes().is_empty(), "row 5 unbound after shrink");
    }

    #[test]
    fn sentinel_flow_saves_a_named_preset_once() {
        let (mut engine, booth, left) = engine();

        press(&mut engine, "booth", 1001); // select Podium master
        press(&mut engine, "booth", 1601); // sentinel row of the empty list
        assert_eq!(booth.last_bool(120), Some(true), "modal opened");

        engine
            .dispatch(
                "booth",
                SurfaceEvent {
                    channel: 2001,
                    value: SignalValue::Text("Sunset".into()),
                },
            )
            .unwrap();
        press(&mut engine, "booth", 2001); // OK

        assert_eq!(booth.last_bool(120), Some(false), "modal closed");
        assert_eq!(engine.store.list("Podium").unwrap(), ["Sunset"]);
        for recorder in [&booth, &left] {
            assert_eq!(recorder.last_text(1601), Some("Podium".into()));
            assert_eq!(recorder.last_text(1602), Some("Sunset".into()));
            assert_eq!(recorder.last_text(1611), Some("New".into()));
            assert_eq!(recorder.last_u16(1790), Some(2));
        }

        // Confirming again without a session is a stray press: no-op.
        press(&mut engine, "booth", 2001);
        assert_eq!(engine.store.list("Podium").unwrap(), ["Sunset"]);
    }

    #[test]
    fn sentinel_without_a_selected_master_is_a_noop() {
        let (mut engine, booth, _left) = engine();
        booth.clear();
        press(&mut engine, "booth", 1601);
        assert_eq!(booth.last_bool(120), None, "modal never opened");
    }

    #[test]
    fn cancel_discards_the_pending_name() {
        let (mut engine, booth, _left) = engine();
        press(&mut engine, "booth", 1001);
        press(&mut engine, "booth", 1601);
        engine
            .dispatch(
                "booth",
                SurfaceEvent {
                    channel: 2001,
                    value: SignalValue::Text("Discarded".into()),
                },
            )
            .unwrap();
        press(&mut engine, "booth", 2002); // Cancel

        assert_eq!(booth.last_bool(120), Some(false));
        assert!(engine.store.list("Podium").unwrap().is_empty());
    }

    #[test]
    fn loading_a_preset_applies_through_the_fanout_path() {
        let (mut engine, booth, left) = engine();
        engine
            .store
            .save(
                "Half",
                "Podium",
                &[
                    PresetLevel {
                        fixture_name: "Podium Wash".into(),
                        intensity: 32768,
                        muted: false,
                    },
                    PresetLevel {
                        fixture_name: "Podium Spot".into(),
                        intensity: 100,
                        muted: true,
                    },
                ],
            )
            .unwrap();
        engine.rebuild_presets(ListRole::StagePresets).unwrap();
        booth.clear();
        left.clear();

        press(&mut engine, "booth", 1601); // row 1 select loads "Half"

        assert_eq!(left.last_u16(1101), Some(32768), "Wash intensity mirrored");
        assert_eq!(left.last_u16(1111), Some(100));
        assert_eq!(left.last_bool(1116), Some(false), "Spot muted, toggle unlit");
    }

    #[test]
    fn unbound_dispatch_is_silently_ignored() {
        let (mut engine, booth, _left) = engine();
        booth.clear();
        engine
            .dispatch(
                "booth",
                SurfaceEvent {
                    channel: 9999,
                    value: SignalValue::Bool(true),
                },
            )
            .unwrap();
        assert!(booth.writes().is_empty());
    }

    #[test]
    fn unknown_surface_is_an_error() {
        let (mut engine, _booth, _left) = engine();
        let err = engine
            .dispatch(
                "foh",
                SurfaceEvent {
                    channel: 1,
                    value: SignalValue::Bool(true),
                },
            )
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownSurface(_)));
    }

    #[test]
    fn selection_cache_keeps_one_row_per_list() {
        let mut cache = SelectionCache::default();
        assert!(!cache.get(ListRole::StageMasters, 1), "defaults to false");

        cache.set(ListRole::StageMasters, 1, true);
        cache.set(ListRole::StageMasters, 1, false);
        cache.set(ListRole::StageMasters, 2, true);

        assert!(cache.get(ListRole::StageMasters, 2));
        assert!(!cache.get(ListRole::StageMasters, 1));
        assert_eq!(cache.selected(ListRole::StageMasters), Some(2));
        assert_eq!(cache.selected(ListRole::StagePresets), None);
    }
}
