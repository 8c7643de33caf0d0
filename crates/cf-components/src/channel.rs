//! Trapezoidal canal sections and uniform (normal) flow.
//!
//! Manning's equation for a trapezoid with bottom width `b` and side slope `m`
//! (horizontal per vertical):
//!
//! ```text
//! Q(y) = (1/n) · A(y) · R(y)^(2/3) · √S
//! A = b·y + m·y²,  P = b + 2y·√(1+m²),  R = A/P
//! ```

use crate::common::{check_finite, check_non_negative, check_positive, EPSILON_FLOW};
use crate::error::{ComponentError, ComponentResult};
use cf_core::units::constants::G_MPS2;
use cf_core::units::{m, mps, Length, Velocity, VolumeRate};
use serde::{Deserialize, Serialize};

/// Tunables for the normal-depth iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalDepthConfig {
    /// Converged when |Q(y) - Q_target| is below this (m³/s).
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Initial guess as a fraction of the design depth.
    pub initial_fraction: f64,
    /// Weight on the Newton estimate when blending with the previous depth.
    pub relaxation: f64,
    /// Lower clamp on the depth iterate (m).
    pub min_depth: f64,
    /// Below this |dQ/dy| the step falls back to a multiplicative nudge.
    pub derivative_floor: f64,
    /// Multiplicative nudge size (0.1 => ×1.1 / ×0.9).
    pub nudge: f64,
}

impl Default for NormalDepthConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-3,
            max_iterations: 50,
            initial_fraction: 0.7,
            relaxation: 0.7,
            min_depth: 0.01,
            derivative_floor: 1e-10,
            nudge: 0.1,
        }
    }
}

impl NormalDepthConfig {
    pub fn with_tolerance(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
            ..Self::default()
        }
    }
}

/// Result of a converged normal-depth solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalDepth {
    pub depth: Length,
    /// Number of depth updates performed.
    pub iterations: usize,
    /// |Q(depth) - Q_target| at the returned depth (m³/s).
    pub residual: f64,
}

/// Physical properties of one canal reach (immutable reference data).
#[derive(Debug, Clone, PartialEq)]
pub struct CanalSection {
    /// Upstream node identifier
    pub upstream: String,
    /// Downstream node identifier
    pub downstream: String,
    pub length: Length,
    pub bottom_width: Length,
    /// Side slope, horizontal per vertical.
    pub side_slope: f64,
    /// Manning's n.
    pub roughness: f64,
    pub bed_slope: f64,
    pub max_depth: Length,
}

impl CanalSection {
    /// Display label `upstream->downstream`.
    pub fn label(&self) -> String {
        format!("{}->{}", self.upstream, self.downstream)
    }

    pub fn validate(&self) -> ComponentResult<()> {
        let ctx = |e: ComponentError| match e {
            ComponentError::Configuration { what } => {
                ComponentError::config(format!("canal '{}': {what}", self.label()))
            }
            other => other,
        };
        check_positive(self.length.value, "length").map_err(ctx)?;
        check_non_negative(self.bottom_width.value, "bottom width").map_err(ctx)?;
        check_non_negative(self.side_slope, "side slope").map_err(ctx)?;
        check_positive(self.roughness, "roughness").map_err(ctx)?;
        check_positive(self.bed_slope, "bed slope").map_err(ctx)?;
        check_positive(self.max_depth.value, "max depth").map_err(ctx)?;
        if self.bottom_width.value == 0.0 && self.side_slope == 0.0 {
            return Err(ctx(ComponentError::config("section has no flow area")));
        }
        Ok(())
    }

    /// Flow area at depth `y` (m²).
    pub fn area(&self, y: f64) -> f64 {
        let y = y.max(0.0);
        self.bottom_width.value * y + self.side_slope * y * y
    }

    /// Wetted perimeter at depth `y` (m).
    pub fn wetted_perimeter(&self, y: f64) -> f64 {
        let y = y.max(0.0);
        self.bottom_width.value + 2.0 * y * self.side_factor()
    }

    pub fn hydraulic_radius(&self, y: f64) -> f64 {
        let p = self.wetted_perimeter(y);
        if p <= 0.0 { 0.0 } else { self.area(y) / p }
    }

    /// Free-surface width at depth `y` (m).
    pub fn top_width(&self, y: f64) -> f64 {
        self.bottom_width.value + 2.0 * self.side_slope * y.max(0.0)
    }

    /// Manning conveyance `(1/n)·A·R^(2/3)` at depth `y`.
    pub fn conveyance(&self, y: f64) -> f64 {
        let a = self.area(y);
        if a <= 0.0 {
            return 0.0;
        }
        a * self.hydraulic_radius(y).powf(2.0 / 3.0) / self.roughness
    }

    /// Uniform-flow discharge at depth `y` on the bed slope (m³/s).
    pub fn uniform_discharge(&self, y: f64) -> f64 {
        self.conveyance(y) * self.bed_slope.sqrt()
    }

    /// Discharge at depth `y` under an arbitrary friction slope (m³/s).
    pub fn surface_slope_flow(&self, y: f64, slope: f64) -> f64 {
        if slope <= 0.0 {
            return 0.0;
        }
        self.conveyance(y) * slope.sqrt()
    }

    /// Analytic dQ/dy of `uniform_discharge`.
    pub fn discharge_derivative(&self, y: f64) -> f64 {
        let a = self.area(y);
        let p = self.wetted_perimeter(y);
        if a <= 0.0 || p <= 0.0 {
            return 0.0;
        }
        let t = self.top_width(y);
        let dp = 2.0 * self.side_factor();
        let k = self.bed_slope.sqrt() / self.roughness;
        k * (a / p).powf(2.0 / 3.0) * ((5.0 / 3.0) * t - (2.0 / 3.0) * (a / p) * dp)
    }

    /// Froude number of `flow` at depth `y`; 0 when dry.
    pub fn froude_number(&self, flow: f64, y: f64) -> f64 {
        let a = self.area(y);
        let t = self.top_width(y);
        if a <= 0.0 || t <= 0.0 {
            return 0.0;
        }
        let v = flow / a;
        v / (G_MPS2 * a / t).sqrt()
    }

    /// Depth of uniform flow carrying `flow`.
    ///
    /// Relaxed Newton iteration from `initial_fraction × max_depth`, clamped to
    /// `[min_depth, max_depth]` every step. Fails with `NonConvergence` carrying
    /// the best iterate if the cap is reached (e.g. flow above section capacity).
    pub fn normal_depth(
        &self,
        flow: VolumeRate,
        config: &NormalDepthConfig,
    ) -> ComponentResult<NormalDepth> {
        self.validate()?;
        let target = check_non_negative(flow.value, "flow rate")?;
        if target <= EPSILON_FLOW {
            return Ok(NormalDepth {
                depth: m(0.0),
                iterations: 0,
                residual: 0.0,
            });
        }

        let hi = self.max_depth.value;
        let lo = config.min_depth.min(hi);
        let mut y = (hi * config.initial_fraction).clamp(lo, hi);
        let mut best = (y, f64::INFINITY);

        for iteration in 0..=config.max_iterations {
            let error = self.uniform_discharge(y) - target;
            check_finite(error, "normal depth residual")?;
            if error.abs() < best.1 {
                best = (y, error.abs());
            }
            if error.abs() < config.tolerance {
                return Ok(NormalDepth {
                    depth: m(y),
                    iterations: iteration,
                    residual: error.abs(),
                });
            }
            if iteration == config.max_iterations {
                break;
            }

            let slope = self.discharge_derivative(y);
            let next = if slope.abs() < config.derivative_floor {
                if error < 0.0 {
                    y * (1.0 + config.nudge)
                } else {
                    y * (1.0 - config.nudge)
                }
            } else {
                let newton = y - error / slope;
                (1.0 - config.relaxation) * y + config.relaxation * newton
            };
            y = next.clamp(lo, hi);
        }

        Err(ComponentError::NonConvergence {
            what: "normal depth",
            best_estimate: best.0,
            residual: best.1,
            iterations: config.max_iterations,
        })
    }

    /// Mean velocity `Q / A` at a known depth; 0 when the area is 0.
    pub fn velocity_at(&self, flow: f64, depth: f64) -> Velocity {
        let a = self.area(depth);
        if a <= 0.0 { mps(0.0) } else { mps(flow / a) }
    }

    /// Mean velocity of uniform flow carrying `flow`.
    pub fn velocity(
        &self,
        flow: VolumeRate,
        config: &NormalDepthConfig,
    ) -> ComponentResult<Velocity> {
        let nd = self.normal_depth(flow, config)?;
        Ok(self.velocity_at(flow.value, nd.depth.value))
    }

    /// Uniform-flow capacity at design depth (m³/s).
    pub fn capacity(&self) -> f64 {
        self.uniform_discharge(self.max_depth.value)
    }

    fn side_factor(&self) -> f64 {
        (1.0 + self.side_slope * self.side_slope).sqrt()
    }
}
