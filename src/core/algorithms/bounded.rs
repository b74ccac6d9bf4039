//! Iteration ceilings for fixed-point loops.
//!
//! The walk, edge legalization, constraint recovery, Delaunay restoration and
//! flood fill all loop until some condition holds. None of them should loop
//! forever on numerically unlucky input, so each runs through [`bounded`],
//! which stops after a configured number of steps and reports the exhaustion
//! instead of hanging.

use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use thiserror::Error;

/// A loop ran out of iterations before reaching its exit condition.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize)]
#[error("{label} exceeded its ceiling of {limit} iterations")]
pub struct IterationLimitExceeded {
    /// Name of the loop.
    pub label: &'static str,
    /// Number of iterations allowed.
    pub limit: usize,
}

/// Iteration ceilings for every bounded loop of the triangulation pipeline.
///
/// ```rust
/// use glyphmesh::core::algorithms::bounded::IterationLimits;
///
/// let limits = IterationLimits::default().with_flood_fill_faces(10);
/// assert_eq!(limits.flood_fill_faces, 10);
/// assert_eq!(limits.walk_steps, 1_000_000);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationLimits {
    /// Faces a single point-location walk may visit.
    pub walk_steps: usize,
    /// Edge checks while legalizing around one inserted point.
    pub legalization_flips: usize,
    /// Queue iterations while recovering one constraint edge.
    pub constraint_flips: usize,
    /// Full passes while restoring the Delaunay property after one constraint.
    pub delaunay_passes: usize,
    /// Faces the superfluous-triangle flood fill may visit.
    pub flood_fill_faces: usize,
}

impl IterationLimits {
    /// Default ceilings.
    pub const DEFAULT: Self = Self {
        walk_steps: 1_000_000,
        legalization_flips: 100_000,
        constraint_flips: 100_000,
        delaunay_passes: 100_000,
        flood_fill_faces: 100_000,
    };

    /// Sets [`Self::walk_steps`].
    #[must_use]
    pub const fn with_walk_steps(mut self, limit: usize) -> Self {
        self.walk_steps = limit;
        self
    }

    /// Sets [`Self::legalization_flips`].
    #[must_use]
    pub const fn with_legalization_flips(mut self, limit: usize) -> Self {
        self.legalization_flips = limit;
        self
    }

    /// Sets [`Self::constraint_flips`].
    #[must_use]
    pub const fn with_constraint_flips(mut self, limit: usize) -> Self {
        self.constraint_flips = limit;
        self
    }

    /// Sets [`Self::delaunay_passes`].
    #[must_use]
    pub const fn with_delaunay_passes(mut self, limit: usize) -> Self {
        self.delaunay_passes = limit;
        self
    }

    /// Sets [`Self::flood_fill_faces`].
    #[must_use]
    pub const fn with_flood_fill_faces(mut self, limit: usize) -> Self {
        self.flood_fill_faces = limit;
        self
    }
}

impl Default for IterationLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Outcome of a [`bounded`] loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bounded<T> {
    /// The step function broke out of the loop with a value.
    Completed {
        /// Value passed to `ControlFlow::Break`.
        value: T,
        /// Number of steps taken, including the breaking one.
        iterations: usize,
    },
    /// The ceiling was hit; whatever state the step function mutated is the
    /// best result reached.
    Exhausted(IterationLimitExceeded),
}

impl<T> Bounded<T> {
    /// Returns `true` if the loop hit its ceiling.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }

    /// The exhaustion record, if any.
    #[must_use]
    pub const fn exhaustion(&self) -> Option<IterationLimitExceeded> {
        match self {
            Self::Completed { .. } => None,
            Self::Exhausted(exceeded) => Some(*exceeded),
        }
    }

    /// Converts into a `Result`, treating exhaustion as an error.
    ///
    /// # Errors
    ///
    /// Returns the [`IterationLimitExceeded`] record when the loop was exhausted.
    pub fn into_result(self) -> Result<T, IterationLimitExceeded> {
        match self {
            Self::Completed { value, .. } => Ok(value),
            Self::Exhausted(exceeded) => Err(exceeded),
        }
    }
}

/// Runs `step` until it returns `ControlFlow::Break` or `limit` steps have run.
///
/// `step` receives the zero-based iteration number. Errors returned by `step`
/// abort the loop immediately and are propagated. Hitting the ceiling is not an
/// error: it is logged with `tracing::warn!` and reported as
/// [`Bounded::Exhausted`].
///
/// # Errors
///
/// Propagates the first error returned by `step`.
///
/// # Examples
///
/// ```rust
/// use glyphmesh::core::algorithms::bounded::{bounded, Bounded};
/// use std::convert::Infallible;
/// use std::ops::ControlFlow;
///
/// let mut n = 27_u64;
/// let outcome = bounded("collatz", 1_000, |_| {
///     if n == 1 {
///         return Ok::<_, Infallible>(ControlFlow::Break(()));
///     }
///     n = if n % 2 == 0 { n / 2 } else { 3 * n + 1 };
///     Ok(ControlFlow::Continue(()))
/// })
/// .unwrap();
/// assert!(matches!(outcome, Bounded::Completed { iterations: 112, .. }));
/// ```
pub fn bounded<T, E, F>(label: &'static str, limit: usize, mut step: F) -> Result<Bounded<T>, E>
where
    F: FnMut(usize) -> Result<ControlFlow<T>, E>,
{
    for iteration in 0..limit {
        if let ControlFlow::Break(value) = step(iteration)? {
            return Ok(Bounded::Completed {
                value,
                iterations: iteration + 1,
            });
        }
    }
    let exceeded = IterationLimitExceeded { label, limit };
    tracing::warn!("{exceeded}; aborting with the partial result");
    Ok(Bounded::Exhausted(exceeded))
}
