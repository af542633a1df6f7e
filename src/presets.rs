//! Scenario presets.
//!
//! A preset is just a burst of ordinary player commands applied on the next
//! tick, so loading one goes through exactly the same path as hand
//! painting. Geometry scales with the grid so every tier gets a sensible
//! layout.

use glam::UVec3;

use crate::command::Command;
use crate::voxel::VoxelType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Central protocell cluster ringed by nutrient pockets.
    PetriDish,
    /// Opposed heat and cold poles with life seeded between them.
    Gradient,
    /// Walled enclosure with energy sources in the corners.
    Arena,
}

impl Preset {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "petri" | "petri_dish" => Some(Self::PetriDish),
            "gradient" => Some(Self::Gradient),
            "arena" => Some(Self::Arena),
            _ => None,
        }
    }

    /// Build the command burst for this preset on a `grid_size`³ grid.
    pub fn commands(self, grid_size: u32) -> Vec<Command> {
        let c = grid_size / 2;
        let center = UVec3::splat(c);
        match self {
            Preset::PetriDish => {
                let mut cmds = vec![Command::seed_protocells(center, 2, 400)];
                // Nutrient pockets on the six faces of the cluster.
                let r = grid_size / 8;
                for offset in [
                    UVec3::new(c + r, c, c),
                    UVec3::new(c - r, c, c),
                    UVec3::new(c, c + r, c),
                    UVec3::new(c, c - r, c),
                    UVec3::new(c, c, c + r),
                    UVec3::new(c, c, c - r),
                ] {
                    cmds.push(Command::place_voxel(offset, 1, VoxelType::Nutrient));
                }
                cmds
            }
            Preset::Gradient => {
                let lo = grid_size / 8;
                let hi = grid_size - 1 - lo;
                vec![
                    Command::place_voxel(UVec3::new(lo, c, c), 1, VoxelType::HeatSource),
                    Command::place_voxel(UVec3::new(hi, c, c), 1, VoxelType::ColdSource),
                    Command::place_voxel(UVec3::new(c, c, c), 2, VoxelType::Nutrient),
                    Command::seed_protocells(center, 3, 300),
                ]
            }
            Preset::Arena => {
                let lo = grid_size / 4;
                let hi = grid_size - 1 - lo;
                let mut cmds = Vec::new();
                // Corner energy sources inside the enclosure.
                for &x in &[lo + 2, hi - 2] {
                    for &y in &[lo + 2, hi - 2] {
                        for &z in &[lo + 2, hi - 2] {
                            cmds.push(Command::place_voxel(
                                UVec3::new(x, y, z),
                                0,
                                VoxelType::EnergySource,
                            ));
                        }
                    }
                }
                // Wall posts along the enclosure edges. Sparse posts keep the
                // burst well under the per-tick command cap.
                let step = ((hi - lo) / 4).max(1);
                let mut w = lo;
                while w <= hi {
                    cmds.push(Command::place_voxel(UVec3::new(w, lo, lo), 0, VoxelType::Wall));
                    cmds.push(Command::place_voxel(UVec3::new(w, hi, hi), 0, VoxelType::Wall));
                    cmds.push(Command::place_voxel(UVec3::new(lo, w, hi), 0, VoxelType::Wall));
                    cmds.push(Command::place_voxel(UVec3::new(hi, w, lo), 0, VoxelType::Wall));
                    w += step;
                }
                cmds.push(Command::seed_protocells(center, 2, 350));
                cmds
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandType, MAX_COMMANDS};

    #[test]
    fn test_all_presets_fit_one_tick() {
        for preset in [Preset::PetriDish, Preset::Gradient, Preset::Arena] {
            for grid in [64, 96, 128, 256] {
                let cmds = preset.commands(grid);
                assert!(!cmds.is_empty());
                assert!(
                    cmds.len() <= MAX_COMMANDS,
                    "{preset:?} at {grid} needs {} commands",
                    cmds.len()
                );
            }
        }
    }

    #[test]
    fn test_preset_commands_stay_in_bounds() {
        for preset in [Preset::PetriDish, Preset::Gradient, Preset::Arena] {
            for cmd in preset.commands(64) {
                let c = cmd.center();
                assert!(c.x < 64 && c.y < 64 && c.z < 64, "{preset:?} out of bounds");
            }
        }
    }

    #[test]
    fn test_petri_dish_seeds_life() {
        let cmds = Preset::PetriDish.commands(128);
        assert!(cmds
            .iter()
            .any(|c| c.command_type == CommandType::SeedProtocells as u32));
    }

    #[test]
    fn test_gradient_has_both_poles() {
        let cmds = Preset::Gradient.commands(128);
        let heats = cmds
            .iter()
            .filter(|c| c.param0 == VoxelType::HeatSource as u32)
            .count();
        let colds = cmds
            .iter()
            .filter(|c| c.param0 == VoxelType::ColdSource as u32)
            .count();
        assert_eq!(heats, 1);
        assert_eq!(colds, 1);
    }

    #[test]
    fn test_preset_name_lookup() {
        assert_eq!(Preset::from_name("petri"), Some(Preset::PetriDish));
        assert_eq!(Preset::from_name("arena"), Some(Preset::Arena));
        assert_eq!(Preset::from_name("nope"), None);
    }
}
