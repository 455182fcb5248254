//! Cube ownership: an arena of cubes addressed by handles.

use super::npv_cube::NpvCube;
use crate::error::CubeError;

/// Non-owning index of a cube in a [`CubeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CubeHandle(pub usize);

/// Owns cubes; decorators refer to them by [`CubeHandle`].
#[derive(Debug, Default)]
pub struct CubeArena {
    cubes: Vec<Box<dyn NpvCube + Send + Sync>>,
}

impl CubeArena {
    /// Empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves a cube into the arena.
    pub fn insert<C: NpvCube + Send + Sync + 'static>(&mut self, cube: C) -> CubeHandle {
        self.cubes.push(Box::new(cube));
        CubeHandle(self.cubes.len() - 1)
    }

    /// Number of cubes.
    pub fn len(&self) -> usize {
        self.cubes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.cubes.is_empty()
    }

    /// Cube behind a handle.
    pub fn get(&self, handle: CubeHandle) -> Result<&(dyn NpvCube + Send + Sync), CubeError> {
        self.cubes
            .get(handle.0)
            .map(|c| c.as_ref())
            .ok_or(CubeError::InvalidHandle(handle.0))
    }

    /// Mutable cube behind a handle.
    pub fn get_mut(&mut self, handle: CubeHandle) -> Result<&mut (dyn NpvCube + Send + Sync), CubeError> {
        match self.cubes.get_mut(handle.0) {
            Some(c) => Ok(c.as_mut()),
            None => Err(CubeError::InvalidHandle(handle.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube::InMemoryCube;
    use xrisk_core::types::Date;

    #[test]
    fn test_handles() {
        let asof = Date::from_ymd(2025, 1, 2).unwrap();
        let mut arena = CubeArena::new();
        let h = arena.insert(InMemoryCube::new(asof, vec!["A".into()], vec![], 1, 1).unwrap());
        arena.get_mut(h).unwrap().set_t0(2.0, 0, 0).unwrap();
        assert_eq!(arena.get(h).unwrap().get_t0(0, 0).unwrap(), 2.0);
        assert_eq!(arena.get(CubeHandle(5)).unwrap_err(), CubeError::InvalidHandle(5));
        assert_eq!(arena.len(), 1);
    }
}
