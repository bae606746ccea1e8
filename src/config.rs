//! Venue deployment configuration.
//!
//! Channel numbering (window bases, strides, capacities, overlay and modal
//! channels) is deployment data supplied at startup, never computed here.
//! The field offsets inside a row are the row template's semantics and live
//! as constants in [`crate::layout`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::{self, Channel, KindWindow, ListLayout, ListRole};
use crate::model::{Rig, RigBuilder};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    /// Marks the single PTZ group of the venue.
    #[serde(default)]
    pub ptz: bool,
    pub fixtures: Vec<String>,
}

/// PTZ detail overlay channels (bool space).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OverlayConfig {
    pub visibility: Channel,
    pub close: Channel,
}

/// Name-entry modal channels. `text` lives in the text space, the rest in
/// the bool space, so `ok` may share a number with `text`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModalConfig {
    pub visibility: Channel,
    pub text: Channel,
    pub ok: Channel,
    pub cancel: Channel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    pub surfaces: Vec<String>,
    pub groups: Vec<GroupConfig>,
    pub lists: Vec<ListLayout>,
    pub overlay: OverlayConfig,
    pub modal: ModalConfig,
    pub db_path: PathBuf,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no surfaces declared")]
    NoSurfaces,
    #[error("duplicate surface name {0:?}")]
    DuplicateSurface(String),
    #[error("venue must declare exactly one PTZ group, found {0}")]
    PtzGroupCount(usize),
    #[error("duplicate group name {0:?}")]
    DuplicateGroup(String),
    #[error("duplicate fixture name {0:?}")]
    DuplicateFixture(String),
    #[error("group {0:?} has no fixtures")]
    EmptyGroup(String),
    #[error("missing list layout for {0:?}")]
    MissingRole(ListRole),
    #[error("duplicate list layout for {0:?}")]
    DuplicateRole(ListRole),
    #[error("{role:?} capacity {capacity} is smaller than the rig's {required} rows")]
    CapacityTooSmall {
        role: ListRole,
        capacity: u16,
        required: usize,
    },
    #[error(transparent)]
    Layout(#[from] layout::LayoutError),
}

impl VenueConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read venue config {:?}", path))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse venue config {:?}", path))?;
        Ok(config)
    }

    /// Cross-field validation, run before any surface binding so a bad
    /// deployment fails startup loudly instead of truncating silently.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.surfaces.is_empty() {
            return Err(ConfigError::NoSurfaces);
        }
        let mut surface_names = HashSet::new();
        for name in &self.surfaces {
            if !surface_names.insert(name.as_str()) {
                return Err(ConfigError::DuplicateSurface(name.clone()));
            }
        }

        let ptz_count = self.groups.iter().filter(|g| g.ptz).count();
        if ptz_count != 1 {
            return Err(ConfigError::PtzGroupCount(ptz_count));
        }
        let mut group_names = HashSet::new();
        let mut fixture_names = HashSet::new();
        for group in &self.groups {
            if !group_names.insert(group.name.as_str()) {
                return Err(ConfigError::DuplicateGroup(group.name.clone()));
            }
            if group.fixtures.is_empty() {
                return Err(ConfigError::EmptyGroup(group.name.clone()));
            }
            for fixture in &group.fixtures {
                if !fixture_names.insert(fixture.as_str()) {
                    return Err(ConfigError::DuplicateFixture(fixture.clone()));
                }
            }
        }

        for role in ListRole::ALL {
            let count = self.lists.iter().filter(|l| l.role == role).count();
            match count {
                0 => return Err(ConfigError::MissingRole(role)),
                1 => {}
                _ => return Err(ConfigError::DuplicateRole(role)),
            }
        }
        for list in &self.lists {
            list.validate()?;
        }
        layout::validate_disjoint(&self.lists)?;

        // Fixed collections must fit their declared windows up front. The
        // preset lists grow at runtime and are checked on rebuild.
        let stage_groups = self.groups.iter().filter(|g| !g.ptz).count();
        let stage_fixtures: usize = self
            .groups
            .iter()
            .filter(|g| !g.ptz)
            .map(|g| g.fixtures.len())
            .sum();
        let ptz_fixtures = self
            .groups
            .iter()
            .find(|g| g.ptz)
            .map(|g| g.fixtures.len())
            .unwrap_or(0);
        for (role, required) in [
            (ListRole::StageMasters, stage_groups),
            (ListRole::StageFixtures, stage_fixtures),
            (ListRole::PtzMaster, 1),
            (ListRole::PtzFixtures, ptz_fixtures),
            (ListRole::PtzExtended, ptz_fixtures),
        ] {
            let list = self.layout(role);
            if (list.capacity as usize) < required {
                return Err(ConfigError::CapacityTooSmall {
                    role,
                    capacity: list.capacity,
                    required,
                });
            }
        }
        Ok(())
    }

    /// Layout of a role. Only valid after `validate` has passed.
    pub fn layout(&self, role: ListRole) -> &ListLayout {
        self.lists
            .iter()
            .find(|l| l.role == role)
            .unwrap_or_else(|| panic!("validated config is missing {role:?}"))
    }

    /// Construct the rig in config order; that order freezes every ordinal.
    pub fn build_rig(&self) -> Result<Rig> {
        let mut builder = RigBuilder::new();
        for group in &self.groups {
            let fixtures = group.fixtures.iter().map(String::as_str);
            if group.ptz {
                builder.ptz_group(&group.name, fixtures);
            } else {
                builder.stage_group(&group.name, fixtures);
            }
        }
        Ok(builder.build()?)
    }

    /// Built-in two-surface venue used by tests and `--dump-config`.
    /// Overlay and modal channel numbers follow the deployed panel project;
    /// list windows are packed at 1000+ so the per-kind spaces stay disjoint.
    pub fn demo() -> Self {
        fn list(
            role: ListRole,
            capacity: u16,
            count_channel: Channel,
            base: Channel,
            bool_stride: u32,
            level_stride: u32,
        ) -> ListLayout {
            ListLayout {
                role,
                capacity,
                count_channel,
                bool_window: KindWindow {
                    base,
                    stride: bool_stride,
                },
                u16_window: KindWindow {
                    base,
                    stride: level_stride,
                },
                text_window: KindWindow {
                    base,
                    stride: level_stride,
                },
            }
        }

        VenueConfig {
            surfaces: vec!["booth".to_string(), "stage-left".to_string()],
            groups: vec![
                GroupConfig {
                    name: "Podium".to_string(),
                    ptz: false,
                    fixtures: vec!["Podium Wash".to_string(), "Podium Spot".to_string()],
                },
                GroupConfig {
                    name: "Stage".to_string(),
                    ptz: false,
                    fixtures: vec!["Stage Left".to_string(), "Stage Right".to_string()],
                },
                GroupConfig {
                    name: "PTZ".to_string(),
                    ptz: true,
                    fixtures: vec!["PTZ 1".to_string(), "PTZ 2".to_string()],
                },
            ],
            lists: vec![
                list(ListRole::StageMasters, 4, 1090, 1000, 10, 10),
                list(ListRole::StageFixtures, 8, 1190, 1100, 10, 10),
                list(ListRole::PtzMaster, 1, 1290, 1200, 10, 10),
                list(ListRole::PtzFixtures, 4, 1390, 1300, 10, 10),
                list(ListRole::PtzExtended, 4, 1590, 1400, 30, 20),
                list(ListRole::StagePresets, 16, 1790, 1600, 10, 10),
                list(ListRole::PtzPresets, 16, 1990, 1800, 10, 10),
            ],
            overlay: OverlayConfig {
                visibility: 107,
                close: 701,
            },
            modal: ModalConfig {
                visibility: 120,
                text: 2001,
                ok: 2001,
                cancel: 2002,
            },
            db_path: PathBuf::from("stagesync-presets.db"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_venue_is_valid() {
        VenueConfig::demo().validate().expect("demo venue validates");
    }

    #[test]
    fn demo_venue_survives_a_json_round_trip() {
        let demo = VenueConfig::demo();
        let json = serde_json::to_string_pretty(&demo).unwrap();
        let back: VenueConfig = serde_json::from_str(&json).unwrap();
        back.validate().unwrap();
        assert_eq!(back.surfaces, demo.surfaces);
        assert_eq!(back.lists.len(), demo.lists.len());
    }

    #[test]
    fn two_ptz_groups_are_rejected() {
        let mut config = VenueConfig::demo();
        config.groups[0].ptz = true;
        assert_eq!(config.validate(), Err(ConfigError::PtzGroupCount(2)));
    }

    #[test]
    fn undersized_window_is_rejected() {
        let mut config = VenueConfig::demo();
        let masters = config
            .lists
            .iter_mut()
            .find(|l| l.role == ListRole::StageMasters)
            .unwrap();
        masters.capacity = 1; // rig has two stage groups
        assert_eq!(
            config.validate(),
            Err(ConfigError::CapacityTooSmall {
                role: ListRole::StageMasters,
                capacity: 1,
                required: 2,
            })
        );
    }

    #[test]
    fn missing_role_is_rejected() {
        let mut config = VenueConfig::demo();
        config.lists.retain(|l| l.role != ListRole::PtzPresets);
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingRole(ListRole::PtzPresets))
        );
    }

    #[test]
    fn duplicate_fixture_names_are_rejected() {
        let mut config = VenueConfig::demo();
        config.groups[1].fixtures[0] = "Podium Wash".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateFixture(_))
        ));
    }

    #[test]
    fn rig_build_follows_config_order() {
        let rig = VenueConfig::demo().build_rig().unwrap();
        let names: Vec<_> = rig.stage_groups().iter().map(|g| g.name.clone()).collect();
        assert_eq!(names, ["Podium", "Stage"]);
        assert_eq!(rig.ptz_group().name, "PTZ");
        assert_eq!(rig.ptz_group().fixtures().len(), 2);
    }
}
