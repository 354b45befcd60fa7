//! Force-directed spring relaxation.
//!
//! Each iteration accumulates three forces per node:
//!
//! ```text
//! spring     k * (len - rest)            along each edge
//! repulsion  c / d² - (c / d²)_rest      between every node pair, d² >= 1
//! torque     -err * ka * len / 2         tangential, per neighbour-pair angle
//! ```
//!
//! Repulsion is taken relative to its value at the rest layout, so a layout
//! at rest is an equilibrium and only compression away from it is resisted.
//!
//! and moves nodes by `force * damping`, capped at `max_step_factor * damping`.
//! Damping decays linearly over the iteration budget. Energy is
//! `Σ ½ k (len - rest)²`; the loop converges once the variance of the last
//! `convergence_window` energies drops below `convergence_variance`.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::rest::RestState;
use super::state::RefinementState;
use crate::core::Point2D;
use crate::core::math::{angle_diff, variance};
use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};

/// Configuration for [`SpringRefiner`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinerConfig {
    /// Iteration cap.
    /// Default: 150
    pub max_iterations: usize,

    /// Spring constant k.
    /// Default: 0.15
    pub spring_constant: f32,

    /// Repulsion constant c in c / d².
    /// Default: 100.0
    pub repulsion_constant: f32,

    /// Apply neighbour-pair angle torque.
    /// Default: true
    pub use_angle_constraints: bool,

    /// Angle torque strength ka.
    /// Default: 0.05
    pub angle_strength: f32,

    /// Damping at the first iteration, decayed linearly to zero.
    /// Default: 0.85
    pub initial_damping: f32,

    /// Floor for the decayed damping.
    /// Default: 0.05
    pub min_damping: f32,

    /// Per-step displacement cap as a multiple of damping.
    /// Default: 5.0
    pub max_step_factor: f32,

    /// Number of recent energies checked for convergence.
    /// Default: 10
    pub convergence_window: usize,

    /// Energy variance below which the loop converges.
    /// Default: 0.001
    pub convergence_variance: f32,

    /// Relative length error counted as "within tolerance" in metrics.
    /// Default: 0.1
    pub length_tolerance: f32,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 150,
            spring_constant: 0.15,
            repulsion_constant: 100.0,
            use_angle_constraints: true,
            angle_strength: 0.05,
            initial_damping: 0.85,
            min_damping: 0.05,
            max_step_factor: 5.0,
            convergence_window: 10,
            convergence_variance: 0.001,
            length_tolerance: 0.1,
        }
    }
}

impl RefinerConfig {
    /// Create config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set iteration cap
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    /// Builder: enable or disable angle torque
    pub fn with_angle_constraints(mut self, enabled: bool) -> Self {
        self.use_angle_constraints = enabled;
        self
    }
}

/// Quality metrics of a relaxation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RefinementMetrics {
    /// 1 - mean relative edge-length error, in [0, 1]
    pub consistency: f32,
    /// Fraction of edges within `length_tolerance` of rest length
    pub edges_within_tolerance: f32,
    /// (initial - final) / initial energy; 0 when the start is at rest.
    /// Negative when repulsion raised the energy.
    pub energy_decrease: f32,
    /// Energy before the first iteration
    pub initial_energy: f32,
    /// Energy after the last iteration
    pub final_energy: f32,
    /// Largest node displacement from the start (pixels)
    pub max_displacement: f32,
}

/// Output of [`SpringRefiner::refine`].
#[derive(Clone, Debug)]
pub struct RefinementResult {
    /// Copy of the input graph at the refined positions
    pub graph: Graph,
    /// Refined positions by node id
    pub positions: BTreeMap<NodeId, Point2D>,
    /// Energy after each iteration
    pub energy_history: Vec<f32>,
    /// Terminal state
    pub state: RefinementState,
    /// Quality metrics
    pub metrics: RefinementMetrics,
}

struct Spring {
    a: usize,
    b: usize,
    rest: f32,
}

struct AngleTerm {
    center: usize,
    first: usize,
    second: usize,
    rest: f32,
}

/// In-progress relaxation over dense index arrays.
struct Relaxation<'a> {
    config: &'a RefinerConfig,
    positions: Vec<Point2D>,
    springs: Vec<Spring>,
    angles: Vec<AngleTerm>,
    /// Repulsion per node at the rest layout
    repulsion_baseline: Vec<Point2D>,
    recent: VecDeque<f32>,
    history: Vec<f32>,
    state: RefinementState,
}

impl<'a> Relaxation<'a> {
    fn new(config: &'a RefinerConfig, graph: &Graph, rest: &RestState) -> Self {
        let ids = graph.node_ids();
        let index: BTreeMap<NodeId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let positions = graph.position_list();

        let springs = graph
            .edges()
            .filter_map(|e| {
                Some(Spring {
                    a: *index.get(&e.source)?,
                    b: *index.get(&e.target)?,
                    rest: rest.length(e.source, e.target).unwrap_or(e.length),
                })
            })
            .collect();

        let angles = if config.use_angle_constraints {
            rest.angles
                .iter()
                .filter_map(|c| {
                    Some(AngleTerm {
                        center: *index.get(&c.center)?,
                        first: *index.get(&c.first)?,
                        second: *index.get(&c.second)?,
                        rest: c.angle,
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        let rest_layout: Vec<Point2D> = ids
            .iter()
            .zip(&positions)
            .map(|(id, p)| rest.positions.get(id).copied().unwrap_or(*p))
            .collect();
        let repulsion_baseline = repulsion(&rest_layout, config.repulsion_constant);

        Self {
            config,
            positions,
            springs,
            angles,
            repulsion_baseline,
            recent: VecDeque::with_capacity(config.convergence_window + 1),
            history: Vec::new(),
            state: RefinementState::default(),
        }
    }

    fn energy(&self) -> f32 {
        self.springs
            .iter()
            .map(|s| {
                let stretch = self.positions[s.a].distance(&self.positions[s.b]) - s.rest;
                0.5 * self.config.spring_constant * stretch * stretch
            })
            .sum()
    }

    fn forces(&self) -> Vec<Point2D> {
        let n = self.positions.len();
        let mut forces = vec![Point2D::ZERO; n];
        let k = self.config.spring_constant;

        for s in &self.springs {
            let d = self.positions[s.b] - self.positions[s.a];
            let len = d.length().max(1e-6);
            let f = d * (k * (len - s.rest) / len);
            forces[s.a] = forces[s.a] + f;
            forces[s.b] = forces[s.b] - f;
        }

        let pushed = repulsion(&self.positions, self.config.repulsion_constant);
        for ((force, now), base) in forces.iter_mut().zip(&pushed).zip(&self.repulsion_baseline) {
            *force = *force + (*now - *base);
        }

        for term in &self.angles {
            let c = self.positions[term.center];
            let current = angle_diff(
                c.angle_to(&self.positions[term.first]),
                c.angle_to(&self.positions[term.second]),
            );
            let correction = -angle_diff(term.rest, current) * self.config.angle_strength;
            for (node, sign) in [(term.second, 1.0f32), (term.first, -1.0f32)] {
                let d = self.positions[node] - c;
                let len = d.length().max(1e-6);
                let tangent = d.perpendicular() * (1.0 / len);
                forces[node] = forces[node] + tangent * (sign * correction * len * 0.5);
            }
        }

        forces
    }

    /// Advance one iteration and return the new state.
    fn step(&mut self) -> RefinementState {
        if self.state.is_terminal() {
            return self.state;
        }
        let iteration = self.state.iterations() + 1;
        let max = self.config.max_iterations.max(1) as f32;
        let damping = (self.config.initial_damping * (1.0 - (iteration - 1) as f32 / max))
            .max(self.config.min_damping);
        let cap = self.config.max_step_factor * damping;

        let forces = self.forces();
        for (p, f) in self.positions.iter_mut().zip(&forces) {
            let mut step = *f * damping;
            let len = step.length();
            if len > cap {
                step = step * (cap / len);
            }
            *p = *p + step;
        }

        let energy = self.energy();
        self.history.push(energy);
        self.recent.push_back(energy);
        if self.recent.len() > self.config.convergence_window {
            self.recent.pop_front();
        }

        let window_full = self.recent.len() >= self.config.convergence_window.max(1);
        let settled = window_full && {
            let window: Vec<f32> = self.recent.iter().copied().collect();
            variance(&window) < self.config.convergence_variance
        };

        self.state = if settled {
            RefinementState::Converged {
                iterations: iteration,
            }
        } else if iteration >= self.config.max_iterations {
            RefinementState::IterationLimitReached {
                iterations: iteration,
            }
        } else {
            RefinementState::Relaxing { iteration }
        };
        self.state
    }
}

/// All-pairs `c / d²` repulsion on each node, with d² floored at 1.
fn repulsion(positions: &[Point2D], constant: f32) -> Vec<Point2D> {
    let n = positions.len();
    let mut forces = vec![Point2D::ZERO; n];
    for i in 0..n {
        for j in i + 1..n {
            let d = positions[i] - positions[j];
            let d2 = d.dot(&d).max(1.0);
            let f = d * (constant / d2 / d2.sqrt());
            forces[i] = forces[i] + f;
            forces[j] = forces[j] - f;
        }
    }
    forces
}

/// Spring-model layout refiner.
#[derive(Clone, Debug, Default)]
pub struct SpringRefiner {
    config: RefinerConfig,
}

impl SpringRefiner {
    /// Create a refiner
    pub fn new(config: RefinerConfig) -> Self {
        Self { config }
    }

    /// Current config
    pub fn config(&self) -> &RefinerConfig {
        &self.config
    }

    /// Relax `graph` towards `rest`.
    ///
    /// Returns `Error::Internal` if any position becomes non-finite.
    pub fn refine(&self, graph: &Graph, rest: &RestState) -> Result<RefinementResult> {
        let mut relaxation = Relaxation::new(&self.config, graph, rest);
        let initial = relaxation.positions.clone();
        let initial_energy = relaxation.energy();

        let state = if graph.node_count() == 0 || self.config.max_iterations == 0 {
            RefinementState::Converged { iterations: 0 }
        } else {
            loop {
                let state = relaxation.step();
                if state.is_terminal() {
                    break state;
                }
            }
        };

        if relaxation.positions.iter().any(|p| !p.is_finite()) {
            return Err(Error::non_finite("refined position"));
        }

        let final_energy = relaxation.energy();
        let metrics = self.metrics(&relaxation, &initial, initial_energy, final_energy);

        let mut refined = graph.clone();
        let positions: BTreeMap<NodeId, Point2D> = graph
            .node_ids()
            .into_iter()
            .zip(relaxation.positions.iter().copied())
            .collect();
        for (id, p) in &positions {
            refined.set_node_position(*id, *p);
        }
        refined.recompute_normalized_lengths();

        log::debug!(
            "[SpringRefiner] {} after {} iterations, energy {:.4} -> {:.4}, consistency {:.3}",
            state.name(),
            state.iterations(),
            initial_energy,
            final_energy,
            metrics.consistency
        );

        Ok(RefinementResult {
            graph: refined,
            positions,
            energy_history: relaxation.history,
            state,
            metrics,
        })
    }

    fn metrics(
        &self,
        relaxation: &Relaxation<'_>,
        initial: &[Point2D],
        initial_energy: f32,
        final_energy: f32,
    ) -> RefinementMetrics {
        let errors: Vec<f32> = relaxation
            .springs
            .iter()
            .filter(|s| s.rest > f32::EPSILON)
            .map(|s| {
                let len = relaxation.positions[s.a].distance(&relaxation.positions[s.b]);
                (len - s.rest).abs() / s.rest
            })
            .collect();

        let (consistency, edges_within_tolerance) = if errors.is_empty() {
            (1.0, 1.0)
        } else {
            let mean_error = errors.iter().sum::<f32>() / errors.len() as f32;
            let within = errors
                .iter()
                .filter(|e| **e <= self.config.length_tolerance)
                .count();
            (
                (1.0 - mean_error).clamp(0.0, 1.0),
                within as f32 / errors.len() as f32,
            )
        };

        let energy_decrease = if initial_energy > 1e-9 {
            (initial_energy - final_energy) / initial_energy
        } else {
            0.0
        };

        let max_displacement = initial
            .iter()
            .zip(&relaxation.positions)
            .map(|(a, b)| a.distance(b))
            .fold(0.0f32, f32::max);

        RefinementMetrics {
            consistency,
            edges_within_tolerance,
            energy_decrease,
            initial_energy,
            final_energy,
            max_displacement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TreadPoint;
    use crate::graph::GraphBuilder;

    fn square_grid(n: usize, spacing: f32) -> Graph {
        let pts: Vec<TreadPoint> = (0..n * n)
            .map(|i| TreadPoint::new((i % n) as f32 * spacing, (i / n) as f32 * spacing, 1.0))
            .collect();
        GraphBuilder::default().build(&pts)
    }

    #[test]
    fn test_rest_graph_is_stable() {
        let g = square_grid(4, 100.0);
        let rest = RestState::from_graph(&g);
        let r = SpringRefiner::default().refine(&g, &rest).unwrap();

        assert!(r.state.is_converged());
        assert!(r.state.iterations() <= 20);
        assert!(r.metrics.final_energy < 0.05);
        assert!(r.metrics.max_displacement < 1.0);
        assert!(r.metrics.consistency > 0.99);
        assert_eq!(r.energy_history.len(), r.state.iterations());
    }

    #[test]
    fn test_irregular_rest_layout_is_equilibrium() {
        // Uneven spacing: raw all-pairs repulsion would not cancel here.
        let pts: Vec<TreadPoint> = (0..30)
            .map(|i| {
                let (c, r) = ((i % 5) as f32, (i / 5) as f32);
                let w = ((i * 7919) % 17) as f32 / 17.0 - 0.5;
                TreadPoint::new(c * 35.0 + w * 14.0, r * 35.0 - w * 9.0, 0.9)
            })
            .collect();
        let g = GraphBuilder::default().build(&pts);
        let rest = RestState::from_graph(&g);
        let r = SpringRefiner::default().refine(&g, &rest).unwrap();

        assert_eq!(
            r.state,
            RefinementState::Converged {
                iterations: RefinerConfig::default().convergence_window
            }
        );
        assert!(r.metrics.final_energy < 1e-4);
        assert!(r.metrics.max_displacement < 0.1);
    }

    #[test]
    fn test_perturbed_node_relaxes() {
        let g = square_grid(4, 100.0);
        let rest = RestState::from_graph(&g);
        let mut moved = g.clone();
        moved.set_node_position(5, Point2D::new(115.0, 100.0));

        let r = SpringRefiner::default().refine(&moved, &rest).unwrap();
        assert!(r.metrics.initial_energy > 1.0);
        assert!(r.metrics.final_energy < r.metrics.initial_energy);
        assert!(r.metrics.energy_decrease > 0.5);
    }

    #[test]
    fn test_iteration_cap() {
        let g = square_grid(3, 100.0);
        let rest = RestState::from_graph(&g);
        let mut moved = g.clone();
        moved.set_node_position(4, Point2D::new(160.0, 160.0));
        let cfg = RefinerConfig::new().with_max_iterations(3);
        let r = SpringRefiner::new(cfg).refine(&moved, &rest).unwrap();
        assert_eq!(r.state, RefinementState::IterationLimitReached { iterations: 3 });
    }

    #[test]
    fn test_empty_graph() {
        let g = Graph::new("empty");
        let r = SpringRefiner::default()
            .refine(&g, &RestState::default())
            .unwrap();
        assert_eq!(r.state, RefinementState::Converged { iterations: 0 });
        assert!(r.positions.is_empty());
    }
}
