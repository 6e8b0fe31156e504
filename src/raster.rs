//! Grid values with an explicit nodata sentinel.
//!
//! Every operation is elementwise and pure: it returns a new raster and never broadcasts
//! implicitly. A cell that is undefined in any operand is undefined in the result.
//!
//! Rasters computed by an operation mark undefined cells with NaN, whatever sentinel their
//! operands carry, so a result that happens to equal an input's sentinel stays defined.
use crate::error::{Result, invalid};
use ndarray::{Array2, Zip};

/// The sentinel used by constructors that do not take one explicitly.
pub const DEFAULT_NODATA: f64 = -3.402_823_466_385_288_6e38;

/// Sentinel of computed rasters. NaN never compares equal to a computed value.
pub(crate) const UNDEFINED: f64 = f64::NAN;

/// A 2D grid of `f64` cell values, where `nodata` marks an undefined cell.
///
/// Two rasters are equal when they agree on shape, on which cells are defined and on the
/// defined values; their sentinels may differ.
#[derive(Debug, Clone)]
pub struct Raster {
    values: Array2<f64>,
    nodata: f64,
}

impl Raster {
    pub fn new(values: Array2<f64>, nodata: f64) -> Self {
        Raster { values, nodata }
    }

    /// Wraps `values` using [`DEFAULT_NODATA`].
    pub fn from_array(values: Array2<f64>) -> Self {
        Raster::new(values, DEFAULT_NODATA)
    }

    /// Builds a raster from row-major cell values.
    pub fn from_shape_vec(shape: (usize, usize), cells: Vec<f64>, nodata: f64) -> Result<Self> {
        match Array2::from_shape_vec(shape, cells) {
            Ok(values) => Ok(Raster::new(values, nodata)),
            Err(e) => invalid(format!("cannot build {}x{} raster: {e}", shape.0, shape.1)),
        }
    }

    /// Every cell set to `value`.
    pub fn filled(shape: (usize, usize), value: f64) -> Self {
        Raster::from_array(Array2::from_elem(shape, value))
    }

    pub fn zeros(shape: (usize, usize)) -> Self {
        Raster::filled(shape, 0.0)
    }

    /// Every cell undefined.
    pub fn undefined(shape: (usize, usize)) -> Self {
        Raster::filled(shape, DEFAULT_NODATA)
    }

    /// A uniform scalar spread over `shape`; a missing scalar gives an undefined raster.
    pub fn broadcast(shape: (usize, usize), value: Option<f64>) -> Self {
        match value {
            Some(v) => Raster::filled(shape, v),
            None => Raster::undefined(shape),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn nodata(&self) -> f64 {
        self.nodata
    }

    /// Raw cell values, undefined cells holding the sentinel.
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    #[inline]
    pub fn is_nodata(&self, value: f64) -> bool {
        value == self.nodata || value.is_nan()
    }

    /// The value at `(row, col)`, or `None` when undefined or outside the grid.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values
            .get((row, col))
            .copied()
            .filter(|v| !self.is_nodata(*v))
    }

    pub fn is_defined(&self, row: usize, col: usize) -> bool {
        self.get(row, col).is_some()
    }

    /// Sets a cell; `None` makes it undefined.
    pub fn set(&mut self, row: usize, col: usize, value: Option<f64>) -> Result<()> {
        let nodata = self.nodata;
        match self.values.get_mut((row, col)) {
            Some(cell) => {
                *cell = value.unwrap_or(nodata);
                Ok(())
            }
            None => invalid(format!("cell ({row}, {col}) is outside the raster")),
        }
    }

    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|v| !self.is_nodata(**v)).count()
    }

    /// Sum over defined cells.
    pub fn sum(&self) -> f64 {
        self.values.iter().filter(|v| !self.is_nodata(**v)).sum()
    }

    /// Applies `f` to every defined cell.
    pub fn map<F>(&self, f: F) -> Raster
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        let values = Zip::from(&self.values)
            .par_map_collect(|&v| if self.is_nodata(v) { UNDEFINED } else { f(v) });
        Raster::new(values, UNDEFINED)
    }

    /// Combines two rasters of equal shape cell by cell.
    pub fn zip_with<F>(&self, other: &Raster, f: F) -> Result<Raster>
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        self.check_shape(other.shape())?;
        let values = Zip::from(&self.values).and(&other.values).par_map_collect(|&a, &b| {
            if self.is_nodata(a) || other.is_nodata(b) {
                UNDEFINED
            } else {
                f(a, b)
            }
        });
        Ok(Raster::new(values, UNDEFINED))
    }

    pub fn add(&self, other: &Raster) -> Result<Raster> {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Raster) -> Result<Raster> {
        self.zip_with(other, |a, b| a - b)
    }

    pub fn mul(&self, other: &Raster) -> Result<Raster> {
        self.zip_with(other, |a, b| a * b)
    }

    /// Cellwise minimum.
    pub fn min(&self, other: &Raster) -> Result<Raster> {
        self.zip_with(other, f64::min)
    }

    pub fn add_scalar(&self, s: f64) -> Raster {
        self.map(move |v| v + s)
    }

    pub fn sub_scalar(&self, s: f64) -> Raster {
        self.map(move |v| v - s)
    }

    pub fn mul_scalar(&self, s: f64) -> Raster {
        self.map(move |v| v * s)
    }

    /// `s - cell` for every defined cell.
    pub fn rsub_scalar(&self, s: f64) -> Raster {
        self.map(move |v| s - v)
    }

    /// Per-cell `cell < threshold`; undefined cells stay undefined.
    pub fn lt(&self, threshold: f64) -> Mask {
        self.compare(|v| v < threshold)
    }

    /// Per-cell `cell > threshold`; undefined cells stay undefined.
    pub fn gt(&self, threshold: f64) -> Mask {
        self.compare(|v| v > threshold)
    }

    fn compare<F>(&self, f: F) -> Mask
    where
        F: Fn(f64) -> bool,
    {
        let cells = self
            .values
            .mapv(|v| if self.is_nodata(v) { None } else { Some(f(v)) });
        Mask { cells }
    }

    pub(crate) fn check_shape(&self, shape: (usize, usize)) -> Result<()> {
        if self.shape() != shape {
            let (r, c) = self.shape();
            return invalid(format!(
                "raster shape mismatch: {r}x{c} against {}x{}",
                shape.0, shape.1
            ));
        }
        Ok(())
    }
}

impl PartialEq for Raster {
    fn eq(&self, other: &Raster) -> bool {
        self.shape() == other.shape()
            && Zip::from(&self.values).and(&other.values).all(|&a, &b| {
                match (self.is_nodata(a), other.is_nodata(b)) {
                    (true, true) => true,
                    (false, false) => a == b,
                    _ => false,
                }
            })
    }
}

/// Per-cell booleans; `None` marks an undefined cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    cells: Array2<Option<bool>>,
}

impl Mask {
    pub fn new(cells: Array2<Option<bool>>) -> Self {
        Mask { cells }
    }

    /// A fully defined mask.
    pub fn from_bools(cells: &Array2<bool>) -> Self {
        Mask { cells: cells.mapv(Some) }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.cells.dim()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<bool> {
        self.cells.get((row, col)).copied().flatten()
    }

    /// Logical negation, keeping undefined cells undefined.
    pub fn not(&self) -> Mask {
        Mask {
            cells: self.cells.mapv(|m| m.map(|b| !b)),
        }
    }

    /// Coordinates of every cell where the mask holds, in row-major order.
    pub fn true_cells(&self) -> Vec<(usize, usize)> {
        self.cells
            .indexed_iter()
            .filter(|(_, m)| **m == Some(true))
            .map(|(ix, _)| ix)
            .collect()
    }

    /// `on_true` where the mask holds, `on_false` where it does not; undefined where the mask
    /// or the chosen operand is undefined.
    pub fn select(&self, on_true: &Raster, on_false: &Raster) -> Result<Raster> {
        on_true.check_shape(self.shape())?;
        on_false.check_shape(self.shape())?;
        let values = Zip::from(&self.cells)
            .and(&on_true.values)
            .and(&on_false.values)
            .par_map_collect(|&m, &t, &f| match m {
                Some(true) if !on_true.is_nodata(t) => t,
                Some(false) if !on_false.is_nodata(f) => f,
                _ => UNDEFINED,
            });
        Ok(Raster::new(values, UNDEFINED))
    }

    /// Like [`Mask::select`] with a scalar for the false branch.
    pub fn select_or(&self, on_true: &Raster, otherwise: f64) -> Result<Raster> {
        let on_false = Raster::new(Array2::from_elem(self.shape(), otherwise), UNDEFINED);
        self.select(on_true, &on_false)
    }
}
