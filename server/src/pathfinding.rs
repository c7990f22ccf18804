//! "Find a path" collaborator.
//!
//! Operations only depend on [`PathFinder`]; the search strategy behind it is
//! replaceable. [`GreedyPathFinder`] is a small best-first walker that is
//! good enough for open terrain and short chases.

use crate::world::World;
use shared::{Direction, Location};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("no path from {from} to {to}")]
    NoPath { from: Location, to: Location },
    #[error("{to} is more than {max_steps} steps away")]
    TooFar { to: Location, max_steps: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathConstraints {
    pub max_steps: usize,
    /// Stop on any tile adjacent to the destination instead of on it.
    pub stop_adjacent: bool,
}

impl Default for PathConstraints {
    fn default() -> Self {
        Self {
            max_steps: 64,
            stop_adjacent: false,
        }
    }
}

pub trait PathFinder: Send + Sync {
    fn find_path(
        &self,
        world: &World,
        from: Location,
        to: Location,
        constraints: PathConstraints,
    ) -> Result<Vec<Direction>, PathError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GreedyPathFinder;

impl GreedyPathFinder {
    fn chebyshev(a: &Location, b: &Location) -> i32 {
        (a.x - b.x).abs().max((a.y - b.y).abs())
    }

    fn arrived(current: &Location, to: &Location, constraints: &PathConstraints) -> bool {
        if constraints.stop_adjacent {
            current.is_adjacent_to(to)
        } else {
            current == to
        }
    }
}

impl PathFinder for GreedyPathFinder {
    fn find_path(
        &self,
        world: &World,
        from: Location,
        to: Location,
        constraints: PathConstraints,
    ) -> Result<Vec<Direction>, PathError> {
        if from.z != to.z {
            return Err(PathError::NoPath { from, to });
        }
        if Self::chebyshev(&from, &to) as usize > constraints.max_steps {
            return Err(PathError::TooFar {
                to,
                max_steps: constraints.max_steps,
            });
        }

        let mut path = Vec::new();
        let mut current = from;
        let mut visited = vec![from];

        while !Self::arrived(&current, &to, &constraints) {
            if path.len() >= constraints.max_steps {
                return Err(PathError::TooFar {
                    to,
                    max_steps: constraints.max_steps,
                });
            }

            // Prefer straight steps over diagonals at equal distance.
            let next = Direction::ALL
                .iter()
                .map(|direction| (*direction, current.step(*direction)))
                .filter(|(_, location)| !visited.contains(location))
                .filter(|(_, location)| {
                    world.is_free(location) || (!constraints.stop_adjacent && *location == to)
                })
                .min_by_key(|(direction, location)| {
                    (Self::chebyshev(location, &to), direction.is_diagonal())
                });

            match next {
                Some((direction, location))
                    if Self::chebyshev(&location, &to) <= Self::chebyshev(&current, &to) =>
                {
                    path.push(direction);
                    visited.push(location);
                    current = location;
                }
                _ => return Err(PathError::NoPath { from, to }),
            }
        }

        Ok(path)
    }
}
