//! Cube decorators over arena-owned cubes.
//!
//! Decorators hold [`CubeHandle`]s and read or write through the
//! [`CubeArena`] passed to each call. [`JointNpvSensiCube::bind`] and
//! [`OverlayNpvCube::bind`] pair a decorator with its arena to obtain a
//! full [`NpvCube`].

use std::collections::{BTreeMap, HashMap};

use xrisk_core::types::Date;

use super::arena::{CubeArena, CubeHandle};
use super::npv_cube::{check_index, NpvCube};
use crate::error::CubeError;

/// Several cubes with equal dates, samples and depth seen as one.
///
/// Ids are the concatenation of the sub-cubes' ids, or an explicit list of
/// the same total length. Global id `i` maps to the sub-cube whose
/// cumulative id range contains it; the mapping is tabulated per id.
#[derive(Debug, Clone, PartialEq)]
pub struct JointNpvSensiCube {
    locations: Vec<(CubeHandle, usize)>,
    ids: Vec<String>,
    index: HashMap<String, usize>,
    asof: Date,
    dates: Vec<Date>,
    samples: usize,
    depth: usize,
}

impl JointNpvSensiCube {
    /// Joins the cubes behind `handles`.
    ///
    /// # Errors
    /// - `CubeError::ShapeMismatch` if the sub-cubes differ in as-of,
    ///   dates, samples or depth, or the explicit ids have the wrong length
    /// - `CubeError::DuplicateId` if an id repeats
    pub fn new(arena: &CubeArena, handles: Vec<CubeHandle>, ids: Option<Vec<String>>) -> Result<Self, CubeError> {
        let first = handles
            .first()
            .ok_or_else(|| CubeError::ShapeMismatch("joint cube needs at least one cube".into()))?;
        let head = arena.get(*first)?;
        let (asof, dates, samples, depth) = (head.asof(), head.dates().to_vec(), head.samples(), head.depth());

        let mut locations = Vec::new();
        let mut concatenated = Vec::new();
        for h in &handles {
            let c = arena.get(*h)?;
            if c.asof() != asof || c.dates() != dates.as_slice() || c.samples() != samples || c.depth() != depth {
                return Err(CubeError::ShapeMismatch(format!(
                    "cube {} differs from cube {} in asof, dates, samples or depth",
                    h.0, first.0
                )));
            }
            concatenated.extend(c.ids().iter().cloned());
            locations.extend((0..c.num_ids()).map(|local| (*h, local)));
        }
        let ids = match ids {
            Some(ids) if ids.len() != concatenated.len() => {
                return Err(CubeError::ShapeMismatch(format!(
                    "{} explicit ids for {} sub-cube ids",
                    ids.len(),
                    concatenated.len()
                )))
            }
            Some(ids) => ids,
            None => concatenated,
        };
        let mut index = HashMap::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            if index.insert(id.clone(), i).is_some() {
                return Err(CubeError::DuplicateId(id.clone()));
            }
        }
        Ok(Self {
            locations,
            ids,
            index,
            asof,
            dates,
            samples,
            depth,
        })
    }

    /// Number of ids over all sub-cubes.
    pub fn num_ids(&self) -> usize {
        self.ids.len()
    }

    /// Sub-cube and local id of global id `index`.
    pub fn cube_and_id(&self, index: usize) -> Result<(CubeHandle, usize), CubeError> {
        check_index("id", index, self.locations.len())?;
        Ok(self.locations[index])
    }

    /// Index of an id.
    pub fn index_of(&self, id: &str) -> Result<usize, CubeError> {
        self.index.get(id).copied().ok_or_else(|| CubeError::UnknownId {
            id: id.to_string(),
            num_ids: self.ids.len(),
        })
    }

    /// T0 value read through the arena.
    pub fn get_t0(&self, arena: &CubeArena, id: usize, depth: usize) -> Result<f64, CubeError> {
        let (h, local) = self.cube_and_id(id)?;
        arena.get(h)?.get_t0(local, depth)
    }

    /// Value read through the arena.
    pub fn get(&self, arena: &CubeArena, id: usize, date: usize, sample: usize, depth: usize) -> Result<f64, CubeError> {
        let (h, local) = self.cube_and_id(id)?;
        arena.get(h)?.get(local, date, sample, depth)
    }

    /// T0 value written through the arena.
    pub fn set_t0(&self, arena: &mut CubeArena, value: f64, id: usize, depth: usize) -> Result<(), CubeError> {
        let (h, local) = self.cube_and_id(id)?;
        arena.get_mut(h)?.set_t0(value, local, depth)
    }

    /// Value written through the arena.
    pub fn set(
        &self,
        arena: &mut CubeArena,
        value: f64,
        id: usize,
        date: usize,
        sample: usize,
        depth: usize,
    ) -> Result<(), CubeError> {
        let (h, local) = self.cube_and_id(id)?;
        arena.get_mut(h)?.set(value, local, date, sample, depth)
    }

    /// Pairs the decorator with its arena.
    pub fn bind<'a>(&'a self, arena: &'a mut CubeArena) -> BoundJointCube<'a> {
        BoundJointCube { joint: self, arena }
    }
}

/// [`JointNpvSensiCube`] bound to its arena.
#[derive(Debug)]
pub struct BoundJointCube<'a> {
    joint: &'a JointNpvSensiCube,
    arena: &'a mut CubeArena,
}

impl NpvCube for BoundJointCube<'_> {
    fn num_ids(&self) -> usize {
        self.joint.ids.len()
    }

    fn num_dates(&self) -> usize {
        self.joint.dates.len()
    }

    fn samples(&self) -> usize {
        self.joint.samples
    }

    fn depth(&self) -> usize {
        self.joint.depth
    }

    fn asof(&self) -> Date {
        self.joint.asof
    }

    fn dates(&self) -> &[Date] {
        &self.joint.dates
    }

    fn ids(&self) -> &[String] {
        &self.joint.ids
    }

    fn index_of(&self, id: &str) -> Result<usize, CubeError> {
        self.joint.index_of(id)
    }

    fn get_t0(&self, id: usize, depth: usize) -> Result<f64, CubeError> {
        self.joint.get_t0(self.arena, id, depth)
    }

    fn set_t0(&mut self, value: f64, id: usize, depth: usize) -> Result<(), CubeError> {
        self.joint.set_t0(self.arena, value, id, depth)
    }

    fn get(&self, id: usize, date: usize, sample: usize, depth: usize) -> Result<f64, CubeError> {
        self.joint.get(self.arena, id, date, sample, depth)
    }

    fn set(&mut self, value: f64, id: usize, date: usize, sample: usize, depth: usize) -> Result<(), CubeError> {
        self.joint.set(self.arena, value, id, date, sample, depth)
    }

    fn remove(&mut self, id: usize) -> Result<(), CubeError> {
        let (h, local) = self.joint.cube_and_id(id)?;
        self.arena.get_mut(h)?.remove(local)
    }

    fn remove_sample(&mut self, id: usize, sample: usize) -> Result<(), CubeError> {
        let (h, local) = self.joint.cube_and_id(id)?;
        self.arena.get_mut(h)?.remove_sample(local, sample)
    }
}

/// Replaces the T0 NPVs of a cube with pricing NPVs and shifts the
/// depth-0 path values by the same correction.
///
/// For an id with pricing NPV `p` the correction is
/// `p - underlying.get_t0(id, 0)`. Depths above 0 pass through.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayNpvCube {
    handle: CubeHandle,
    pricing_npvs: BTreeMap<String, f64>,
}

impl OverlayNpvCube {
    /// Overlays `pricing_npvs` on the cube behind `handle`.
    ///
    /// # Errors
    /// `CubeError::UnknownId` if a pricing NPV names an id the cube lacks.
    pub fn new(arena: &CubeArena, handle: CubeHandle, pricing_npvs: BTreeMap<String, f64>) -> Result<Self, CubeError> {
        let cube = arena.get(handle)?;
        for id in pricing_npvs.keys() {
            cube.index_of(id)?;
        }
        Ok(Self { handle, pricing_npvs })
    }

    /// Underlying cube handle.
    pub fn handle(&self) -> CubeHandle {
        self.handle
    }

    fn pricing_npv(&self, cube: &dyn NpvCube, id: usize) -> Result<f64, CubeError> {
        check_index("id", id, cube.num_ids())?;
        let name = &cube.ids()[id];
        self.pricing_npvs.get(name).copied().ok_or_else(|| CubeError::UnknownId {
            id: name.clone(),
            num_ids: cube.num_ids(),
        })
    }

    fn t0_of(&self, cube: &dyn NpvCube, id: usize, depth: usize) -> Result<f64, CubeError> {
        if depth == 0 {
            check_index("depth", depth, cube.depth())?;
            self.pricing_npv(cube, id)
        } else {
            cube.get_t0(id, depth)
        }
    }

    fn value_of(&self, cube: &dyn NpvCube, id: usize, date: usize, sample: usize, depth: usize) -> Result<f64, CubeError> {
        let v = cube.get(id, date, sample, depth)?;
        if depth == 0 {
            Ok(v + self.pricing_npv(cube, id)? - cube.get_t0(id, 0)?)
        } else {
            Ok(v)
        }
    }

    /// Pricing NPV minus the underlying T0 NPV.
    pub fn correction(&self, arena: &CubeArena, id: usize) -> Result<f64, CubeError> {
        let cube = arena.get(self.handle)?;
        Ok(self.pricing_npv(cube, id)? - cube.get_t0(id, 0)?)
    }

    /// T0 value: the pricing NPV at depth 0.
    pub fn get_t0(&self, arena: &CubeArena, id: usize, depth: usize) -> Result<f64, CubeError> {
        self.t0_of(arena.get(self.handle)?, id, depth)
    }

    /// Path value: corrected at depth 0.
    pub fn get(&self, arena: &CubeArena, id: usize, date: usize, sample: usize, depth: usize) -> Result<f64, CubeError> {
        self.value_of(arena.get(self.handle)?, id, date, sample, depth)
    }

    /// Pairs the decorator with the cube it overlays.
    pub fn bind<'a>(&'a self, arena: &'a mut CubeArena) -> Result<BoundOverlayCube<'a>, CubeError> {
        Ok(BoundOverlayCube {
            overlay: self,
            cube: arena.get_mut(self.handle)?,
        })
    }
}

/// [`OverlayNpvCube`] bound to its underlying cube.
///
/// Writes go to the underlying cube unchanged.
#[derive(Debug)]
pub struct BoundOverlayCube<'a> {
    overlay: &'a OverlayNpvCube,
    cube: &'a mut (dyn NpvCube + Send + Sync),
}

impl NpvCube for BoundOverlayCube<'_> {
    fn num_ids(&self) -> usize {
        self.cube.num_ids()
    }

    fn num_dates(&self) -> usize {
        self.cube.num_dates()
    }

    fn samples(&self) -> usize {
        self.cube.samples()
    }

    fn depth(&self) -> usize {
        self.cube.depth()
    }

    fn asof(&self) -> Date {
        self.cube.asof()
    }

    fn dates(&self) -> &[Date] {
        self.cube.dates()
    }

    fn ids(&self) -> &[String] {
        self.cube.ids()
    }

    fn index_of(&self, id: &str) -> Result<usize, CubeError> {
        self.cube.index_of(id)
    }

    fn get_t0(&self, id: usize, depth: usize) -> Result<f64, CubeError> {
        self.overlay.t0_of(&*self.cube, id, depth)
    }

    fn set_t0(&mut self, value: f64, id: usize, depth: usize) -> Result<(), CubeError> {
        self.cube.set_t0(value, id, depth)
    }

    fn get(&self, id: usize, date: usize, sample: usize, depth: usize) -> Result<f64, CubeError> {
        self.overlay.value_of(&*self.cube, id, date, sample, depth)
    }

    fn set(&mut self, value: f64, id: usize, date: usize, sample: usize, depth: usize) -> Result<(), CubeError> {
        self.cube.set(value, id, date, sample, depth)
    }

    fn remove(&mut self, id: usize) -> Result<(), CubeError> {
        self.cube.remove(id)
    }

    fn remove_sample(&mut self, id: usize, sample: usize) -> Result<(), CubeError> {
        self.cube.remove_sample(id, sample)
    }
}
