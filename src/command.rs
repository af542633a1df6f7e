//! Player commands.
//!
//! Commands are the only path by which the outside world mutates the grid.
//! The wire format is stable: a 4-byte count word (padded to 16 bytes),
//! then up to [`MAX_COMMANDS`] fixed 64-byte records. The command buffer is
//! rewritten in full before every tick, so a dropped frame never replays a
//! stale brush stroke.

use bytemuck::{Pod, Zeroable};
use glam::UVec3;

/// Maximum commands applied in one tick.
pub const MAX_COMMANDS: usize = 64;

/// u32 words per command record.
pub const COMMAND_WORDS: usize = 16;

/// Size in bytes of the encoded command buffer: count word + 3 pad words +
/// 64 records of 16 words.
pub const COMMAND_BUFFER_BYTES: usize = (4 + MAX_COMMANDS * COMMAND_WORDS) * 4;

/// Command opcodes. Unknown opcodes are no-ops on the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CommandType {
    Noop = 0,
    /// `param0` = voxel type to place.
    PlaceVoxel = 1,
    RemoveVoxel = 2,
    /// `param0` = initial energy for seeded protocells.
    SeedProtocells = 3,
    /// `param0` = toxin strength threshold (0–255).
    ApplyToxin = 4,
}

/// One fixed 64-byte command record.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Command {
    pub command_type: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
    /// Chebyshev radius of the cubic brush.
    pub radius: u32,
    pub param0: u32,
    pub param1: u32,
    _padding: [u32; 9],
}

impl Command {
    pub fn new(
        command_type: CommandType,
        center: UVec3,
        radius: u32,
        param0: u32,
        param1: u32,
    ) -> Self {
        Self {
            command_type: command_type as u32,
            x: center.x,
            y: center.y,
            z: center.z,
            radius,
            param0,
            param1,
            _padding: [0; 9],
        }
    }

    pub fn place_voxel(center: UVec3, radius: u32, voxel_type: crate::VoxelType) -> Self {
        Self::new(CommandType::PlaceVoxel, center, radius, voxel_type as u32, 0)
    }

    pub fn remove_voxel(center: UVec3, radius: u32) -> Self {
        Self::new(CommandType::RemoveVoxel, center, radius, 0, 0)
    }

    pub fn seed_protocells(center: UVec3, radius: u32, energy: u16) -> Self {
        Self::new(CommandType::SeedProtocells, center, radius, energy as u32, 0)
    }

    pub fn apply_toxin(center: UVec3, radius: u32, strength: u8) -> Self {
        Self::new(CommandType::ApplyToxin, center, radius, strength as u32, 0)
    }

    pub fn center(&self) -> UVec3 {
        UVec3::new(self.x, self.y, self.z)
    }
}

/// Encode a command slice into the full GPU buffer image. Commands beyond
/// [`MAX_COMMANDS`] are dropped; callers that care batch across ticks.
pub fn encode_command_buffer(commands: &[Command]) -> Vec<u8> {
    let count = commands.len().min(MAX_COMMANDS);
    let mut words = vec![0u32; COMMAND_BUFFER_BYTES / 4];
    words[0] = count as u32;
    // words 1..4 stay zero: header padding keeps records 16-byte aligned.
    for (i, cmd) in commands[..count].iter().enumerate() {
        let base = 4 + i * COMMAND_WORDS;
        let record: &[u32; COMMAND_WORDS] = bytemuck::cast_ref(cmd);
        words[base..base + COMMAND_WORDS].copy_from_slice(record);
    }
    bytemuck::cast_slice(&words).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VoxelType;

    #[test]
    fn test_record_is_64_bytes() {
        assert_eq!(std::mem::size_of::<Command>(), 64);
    }

    #[test]
    fn test_record_word_layout() {
        let cmd = Command::new(CommandType::PlaceVoxel, UVec3::new(10, 20, 30), 2, 1, 5);
        let words: &[u32; COMMAND_WORDS] = bytemuck::cast_ref(&cmd);
        assert_eq!(words[0], CommandType::PlaceVoxel as u32);
        assert_eq!(words[1..5], [10, 20, 30, 2]);
        assert_eq!(words[5], 1);
        assert_eq!(words[6], 5);
        assert!(words[7..].iter().all(|&w| w == 0));
    }

    #[test]
    fn test_buffer_prefix_carries_count() {
        let cmds = [
            Command::remove_voxel(UVec3::ZERO, 1),
            Command::seed_protocells(UVec3::new(4, 4, 4), 0, 300),
        ];
        let bytes = encode_command_buffer(&cmds);
        assert_eq!(bytes.len(), COMMAND_BUFFER_BYTES);
        let words: &[u32] = bytemuck::cast_slice(&bytes);
        assert_eq!(words[0], 2);
        // First record starts at word 4.
        assert_eq!(words[4], CommandType::RemoveVoxel as u32);
        assert_eq!(words[4 + COMMAND_WORDS], CommandType::SeedProtocells as u32);
        assert_eq!(words[4 + COMMAND_WORDS + 5], 300);
    }

    #[test]
    fn test_buffer_truncates_past_max() {
        let cmds = vec![Command::remove_voxel(UVec3::ZERO, 0); MAX_COMMANDS + 10];
        let bytes = encode_command_buffer(&cmds);
        let words: &[u32] = bytemuck::cast_slice(&bytes);
        assert_eq!(words[0], MAX_COMMANDS as u32);
    }

    #[test]
    fn test_empty_buffer_has_zero_count() {
        let bytes = encode_command_buffer(&[]);
        let words: &[u32] = bytemuck::cast_slice(&bytes);
        assert_eq!(words[0], 0);
    }

    #[test]
    fn test_place_voxel_carries_type() {
        let cmd = Command::place_voxel(UVec3::new(1, 2, 3), 4, VoxelType::EnergySource);
        assert_eq!(cmd.param0, VoxelType::EnergySource as u32);
        assert_eq!(cmd.radius, 4);
    }
}
