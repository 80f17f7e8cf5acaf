// Pairwise flocking forces: separation for overlapping agents, cohesion
// and alignment for nearby swarm mates.
//
// Weight curves are sampled into lookup tables when the motion system is
// built so the pair loop never calls powf. Neighbours are culled with
// sparse cell buckets rebuilt every tick.

use std::collections::HashMap;

use bevy_ecs::entity::Entity;
use glam::{IVec2, Vec2};

// ============================================================================
// LOOKUP TABLES
// ============================================================================

#[derive(Debug, Clone)]
pub struct FlockingLuts {
    /// Indexed by overlap fraction x = 1 - d / (ra + rb) in [0, 1].
    separation: Vec<f32>,
    /// Indexed by normalised gap y in [0, 1] between touching and the
    /// attraction limit.
    cohesion: Vec<f32>,
}

impl FlockingLuts {
    pub fn new(resolution: usize, separation_weight: f32, cohesion_weight: f32) -> Self {
        let resolution = resolution.max(2);
        let sample = |i: usize| i as f32 / (resolution - 1) as f32;
        let separation = (0..resolution)
            .map(|i| {
                let x = sample(i);
                separation_weight * ((1.0 + x).powi(4) - 1.0) / 15.0
            })
            .collect();
        let cohesion = (0..resolution)
            .map(|i| {
                let y = sample(i);
                cohesion_weight * (1.0 - y).powi(3) * y
            })
            .collect();
        Self { separation, cohesion }
    }

    #[inline]
    fn lookup(table: &[f32], t: f32) -> f32 {
        let i = (t.clamp(0.0, 1.0) * (table.len() - 1) as f32).round() as usize;
        table[i.min(table.len() - 1)]
    }

    pub fn separation_weight(&self, overlap: f32) -> f32 {
        Self::lookup(&self.separation, overlap)
    }

    pub fn cohesion_weight(&self, gap: f32) -> f32 {
        Self::lookup(&self.cohesion, gap)
    }
}

// ============================================================================
// NEIGHBOUR BUCKETS
// ============================================================================

/// Agents bucketed by the square cell they stand in. Only occupied cells are
/// stored, so memory follows the agent count rather than how far apart the
/// agents are.
pub struct AgentBuckets {
    cell: f32,
    buckets: HashMap<IVec2, Vec<usize>>,
}

impl AgentBuckets {
    pub fn build(positions: impl Iterator<Item = Vec2>, cell: f32) -> Self {
        let cell = cell.max(1.0);
        let mut buckets: HashMap<IVec2, Vec<usize>> = HashMap::new();
        for (index, position) in positions.enumerate() {
            buckets.entry(Self::key(position, cell)).or_default().push(index);
        }
        Self { cell, buckets }
    }

    fn key(position: Vec2, cell: f32) -> IVec2 {
        (position / cell).floor().as_ivec2()
    }

    pub fn occupied_cells(&self) -> usize {
        self.buckets.len()
    }

    /// Indices greater than `index` whose cell lies within `reach` of
    /// `position`'s cell, ascending. Callers still filter by distance.
    pub fn later_neighbours(&self, index: usize, position: Vec2, reach: f32, out: &mut Vec<usize>) {
        out.clear();
        let span = (reach / self.cell).ceil() as i32;
        let center = Self::key(position, self.cell);
        for dy in -span..=span {
            for dx in -span..=span {
                if let Some(bucket) = self.buckets.get(&(center + IVec2::new(dx, dy))) {
                    out.extend(bucket.iter().copied().filter(|&j| j > index));
                }
            }
        }
        out.sort_unstable();
    }
}

// ============================================================================
// PAIR FORCES
// ============================================================================

/// Read-only per-agent data collected before the pair pass.
#[derive(Debug, Clone, Copy)]
pub struct FlockAgent {
    pub position: Vec2,
    pub radius: f32,
    pub swarm: Option<Entity>,
    /// Aggregate direction from the previous tick, for alignment.
    pub last_direction: Vec2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PairForces {
    pub separation: Vec2,
    pub separation_weight: f32,
    pub cohesion: Vec2,
    pub cohesion_weight: f32,
    /// Sum of swarm mates' last directions; zero when nobody is near.
    pub alignment: Vec2,
}

/// Fallback push for two agents at the same spot, fixed per pair so the
/// result does not depend on float noise.
fn coincident_direction(i: usize, j: usize) -> Vec2 {
    const GOLDEN_ANGLE: f32 = 2.399_963;
    Vec2::from_angle((i * 31 + j) as f32 * GOLDEN_ANGLE)
}

/// Computes every pair once (i < j) and applies equal and opposite
/// contributions to both agents.
pub fn compute_pair_forces(agents: &[FlockAgent], luts: &FlockingLuts, attraction_multiple: f32) -> Vec<PairForces> {
    let mut out = vec![PairForces::default(); agents.len()];
    if agents.len() < 2 {
        return out;
    }

    let max_radius = agents.iter().map(|a| a.radius).fold(0.0f32, f32::max);
    let reach = 2.0 * max_radius * attraction_multiple.max(1.0);
    let buckets = AgentBuckets::build(agents.iter().map(|a| a.position), reach);

    let mut neighbours = Vec::new();
    for i in 0..agents.len() {
        let a = agents[i];
        buckets.later_neighbours(i, a.position, reach, &mut neighbours);

        for &j in &neighbours {
            let b = agents[j];
            let delta = a.position - b.position;
            let dist = delta.length();
            let radius_sum = a.radius + b.radius;

            if dist < radius_sum {
                let dir = if dist > 1e-4 { delta / dist } else { coincident_direction(i, j) };
                let w = luts.separation_weight(1.0 - dist / radius_sum.max(f32::EPSILON));
                out[i].separation += dir * w;
                out[i].separation_weight += w;
                out[j].separation -= dir * w;
                out[j].separation_weight += w;
                continue;
            }

            let same_swarm = a.swarm.is_some() && a.swarm == b.swarm;
            let limit = radius_sum * attraction_multiple;
            if !same_swarm || dist >= limit || limit <= radius_sum {
                continue;
            }
            let gap = (dist - radius_sum) / (limit - radius_sum);
            let w = luts.cohesion_weight(gap);
            let dir = -delta / dist;
            out[i].cohesion += dir * w;
            out[i].cohesion_weight += w;
            out[j].cohesion -= dir * w;
            out[j].cohesion_weight += w;
            out[i].alignment += b.last_direction;
            out[j].alignment += a.last_direction;
        }
    }
    out
}
