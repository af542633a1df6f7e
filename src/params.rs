//! Runtime simulation parameters.
//!
//! Every field is a live tunable: the record is serialized to an 80-byte
//! uniform block and re-uploaded at the start of each tick, so a change
//! takes effect on the next tick. Fields are f32 across the board for
//! uniform-buffer compatibility; integral values (grid size, tick count,
//! brick counts) ride as whole-number floats.
//!
//! Out-of-range writes are clamped, never rejected: the clamps are
//! correctness bounds (diffusion stability, probability ranges), not
//! validation errors.

/// Number of f32 fields in the serialized uniform block.
pub const PARAM_FIELDS: usize = 20;

/// Highest stable diffusion rate for the 6-neighbor stencil.
pub const DIFFUSION_RATE_MAX: f32 = 0.25;

/// Flat parameter record, uploaded as one aligned uniform block.
/// The field order here is the serialization order and the WGSL struct
/// order; all three must change together.
#[derive(Debug, Clone)]
pub struct SimParams {
    pub grid_size: f32,
    pub tick_count: f32,
    pub dt: f32,
    pub nutrient_spawn_rate: f32,
    pub waste_decay_ticks: f32,
    pub nutrient_recycle_rate: f32,
    pub movement_energy_cost: f32,
    pub base_ambient_temp: f32,
    pub metabolic_cost_base: f32,
    pub replication_energy_min: f32,
    pub energy_from_nutrient: f32,
    pub energy_from_source: f32,
    pub diffusion_rate: f32,
    pub temp_sensitivity: f32,
    pub predation_energy_fraction: f32,
    pub max_energy: f32,
    /// 0 = material view, 1 = temperature overlay. Consumed by the
    /// renderer; the engine only stores and uploads it.
    pub overlay_mode: f32,
    pub sparse_mode: f32,
    pub brick_grid_dim: f32,
    pub max_bricks: f32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            grid_size: 128.0,
            tick_count: 0.0,
            dt: 0.016,
            nutrient_spawn_rate: 0.001,
            waste_decay_ticks: 100.0,
            nutrient_recycle_rate: 0.5,
            movement_energy_cost: 5.0,
            base_ambient_temp: 0.5,
            metabolic_cost_base: 2.0,
            replication_energy_min: 200.0,
            energy_from_nutrient: 50.0,
            energy_from_source: 10.0,
            diffusion_rate: 0.1,
            temp_sensitivity: 1.0,
            predation_energy_fraction: 0.5,
            max_energy: 1000.0,
            overlay_mode: 0.0,
            sparse_mode: 0.0,
            brick_grid_dim: 0.0,
            max_bricks: 0.0,
        }
    }
}

impl SimParams {
    fn as_fields(&self) -> [f32; PARAM_FIELDS] {
        [
            self.grid_size,
            self.tick_count,
            self.dt,
            self.nutrient_spawn_rate,
            self.waste_decay_ticks,
            self.nutrient_recycle_rate,
            self.movement_energy_cost,
            self.base_ambient_temp,
            self.metabolic_cost_base,
            self.replication_energy_min,
            self.energy_from_nutrient,
            self.energy_from_source,
            self.diffusion_rate,
            self.temp_sensitivity,
            self.predation_energy_fraction,
            self.max_energy,
            self.overlay_mode,
            self.sparse_mode,
            self.brick_grid_dim,
            self.max_bricks,
        ]
    }

    /// Serialize to the uniform byte layout: 20 little-endian f32, 80 bytes,
    /// already a multiple of the 16-byte uniform alignment.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PARAM_FIELDS * 4);
        for f in self.as_fields() {
            bytes.extend_from_slice(&f.to_le_bytes());
        }
        bytes
    }

    /// Set a field by name with silent clamping. Unknown names are ignored
    /// and reported `false`. `grid_size`, `tick_count`, and the sparse
    /// topology fields are engine-owned and not settable from outside.
    pub fn set(&mut self, name: &str, value: f32) -> bool {
        match name {
            "dt" => self.dt = value.clamp(0.001, 1.0),
            "nutrient_spawn_rate" => self.nutrient_spawn_rate = value.clamp(0.0, 1.0),
            "waste_decay_ticks" => self.waste_decay_ticks = value.clamp(1.0, 65535.0),
            "nutrient_recycle_rate" => self.nutrient_recycle_rate = value.clamp(0.0, 1.0),
            "movement_energy_cost" => self.movement_energy_cost = value.max(0.0),
            "base_ambient_temp" => self.base_ambient_temp = value.clamp(0.0, 1.0),
            "metabolic_cost_base" => self.metabolic_cost_base = value.max(0.0),
            "replication_energy_min" => self.replication_energy_min = value.max(0.0),
            "energy_from_nutrient" => self.energy_from_nutrient = value.max(0.0),
            "energy_from_source" => self.energy_from_source = value.max(0.0),
            "diffusion_rate" => self.diffusion_rate = value.clamp(0.0, DIFFUSION_RATE_MAX),
            "temp_sensitivity" => self.temp_sensitivity = value.clamp(0.0, 2.0),
            "predation_energy_fraction" => {
                self.predation_energy_fraction = value.clamp(0.0, 1.0)
            }
            "max_energy" => self.max_energy = value.clamp(1.0, 65535.0),
            "overlay_mode" => self.overlay_mode = if value != 0.0 { 1.0 } else { 0.0 },
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_size_is_uniform_aligned() {
        let bytes = SimParams::default().to_bytes();
        assert_eq!(bytes.len(), PARAM_FIELDS * 4);
        assert_eq!(bytes.len() % 16, 0);
    }

    #[test]
    fn test_serialization_is_stable() {
        let p = SimParams::default();
        assert_eq!(p.to_bytes(), p.to_bytes());
    }

    #[test]
    fn test_field_order_first_and_last() {
        let p = SimParams {
            grid_size: 64.0,
            max_bricks: 3200.0,
            ..Default::default()
        };
        let bytes = p.to_bytes();
        let first = f32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let last = f32::from_le_bytes(bytes[76..80].try_into().unwrap());
        assert_eq!(first, 64.0);
        assert_eq!(last, 3200.0);
    }

    #[test]
    fn test_set_clamps_diffusion_rate() {
        let mut p = SimParams::default();
        assert!(p.set("diffusion_rate", 0.9));
        assert_eq!(p.diffusion_rate, DIFFUSION_RATE_MAX);
        assert!(p.set("diffusion_rate", -1.0));
        assert_eq!(p.diffusion_rate, 0.0);
    }

    #[test]
    fn test_set_clamps_probabilities() {
        let mut p = SimParams::default();
        p.set("nutrient_spawn_rate", 7.0);
        p.set("predation_energy_fraction", -0.5);
        assert_eq!(p.nutrient_spawn_rate, 1.0);
        assert_eq!(p.predation_energy_fraction, 0.0);
    }

    #[test]
    fn test_set_rejects_engine_owned_fields() {
        let mut p = SimParams::default();
        assert!(!p.set("grid_size", 32.0));
        assert!(!p.set("tick_count", 9.0));
        assert!(!p.set("no_such_param", 1.0));
        assert_eq!(p.grid_size, 128.0);
    }
}
