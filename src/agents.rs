//! Agent storage and (re)initialization.
//!
//! Agents live in a single storage buffer of fixed capacity so bind groups
//! survive live agent-count changes; only the first `num_agents` entries are
//! ever processed or rewritten.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use rand::Rng;

use crate::params::MAX_AGENTS;

/// One simulation agent.
///
/// `direction` is not normalized; its magnitude implicitly scales the
/// per-frame step.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Agent {
    pub position: Vec2,
    pub direction: Vec2,
}

/// Fixed-capacity GPU buffer of agents.
pub struct AgentStore {
    buffer: wgpu::Buffer,
    capacity: u32,
}

impl AgentStore {
    /// Allocate the agent buffer at full capacity, zero-initialized.
    pub fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Agent Buffer"),
            size: MAX_AGENTS as u64 * std::mem::size_of::<Agent>() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            capacity: MAX_AGENTS,
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Buffer capacity in agents, fixed at construction.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Rewrite the first `num_agents` entries with fresh random agents.
    ///
    /// Entries past the active count keep their previous contents. Panics if
    /// `num_agents` exceeds the buffer capacity; that is a programmer error,
    /// not a runtime condition.
    pub fn reinitialize(
        &self,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        num_agents: u32,
        start_radius: f32,
    ) {
        checked_count(num_agents, self.capacity);
        let agents = spawn_agents(width, height, num_agents, start_radius);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&agents));
    }

    /// Upload explicit agent data into the buffer prefix.
    pub fn set_agents(&self, queue: &wgpu::Queue, agents: &[Agent]) {
        checked_count(agents.len() as u32, self.capacity);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(agents));
    }
}

fn checked_count(num_agents: u32, capacity: u32) -> u32 {
    assert!(
        num_agents <= capacity,
        "agent count {num_agents} exceeds buffer capacity {capacity}"
    );
    num_agents
}

/// Generate `num_agents` agents placed within `start_radius` of the field
/// center, with direction components uniform in [-1, 1].
pub fn spawn_agents(width: u32, height: u32, num_agents: u32, start_radius: f32) -> Vec<Agent> {
    let mut rng = rand::thread_rng();
    let center = Vec2::new(width as f32 / 2.0, height as f32 / 2.0);

    (0..num_agents)
        .map(|_| {
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let dist = if start_radius > 0.0 {
                rng.gen_range(0.0..start_radius)
            } else {
                0.0
            };
            Agent {
                position: center + Vec2::new(angle.cos(), angle.sin()) * dist,
                direction: Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_count() {
        assert_eq!(spawn_agents(800, 600, 500, 100.0).len(), 500);
        assert!(spawn_agents(800, 600, 0, 100.0).is_empty());
    }

    #[test]
    fn test_spawn_within_start_radius() {
        let center = Vec2::new(400.0, 300.0);
        for agent in spawn_agents(800, 600, 2_000, 100.0) {
            assert!(agent.position.distance(center) <= 100.0);
        }
    }

    #[test]
    fn test_spawn_zero_radius_lands_on_center() {
        let center = Vec2::new(32.0, 32.0);
        for agent in spawn_agents(64, 64, 16, 0.0) {
            assert_eq!(agent.position, center);
        }
    }

    #[test]
    fn test_spawn_direction_components_bounded() {
        for agent in spawn_agents(800, 600, 2_000, 100.0) {
            assert!(agent.direction.x >= -1.0 && agent.direction.x <= 1.0);
            assert!(agent.direction.y >= -1.0 && agent.direction.y <= 1.0);
        }
    }

    #[test]
    fn test_checked_count_within_capacity() {
        assert_eq!(checked_count(MAX_AGENTS, MAX_AGENTS), MAX_AGENTS);
    }

    #[test]
    #[should_panic(expected = "exceeds buffer capacity")]
    fn test_checked_count_over_capacity_panics() {
        checked_count(MAX_AGENTS + 1, MAX_AGENTS);
    }

    #[test]
    fn test_agent_gpu_layout() {
        assert_eq!(std::mem::size_of::<Agent>(), 16);
    }
}
