//! D8 drainage networks derived from a DEM.
//!
//! Construction follows the whitebox approach of priority-flood depression filling: the DEM is
//! flooded inward from its margins, so every cell ends up with a non-ascending path to an
//! outlet. Steepest descent on the filled surface gives each cell its downstream neighbour;
//! cells on flats (including filled depressions) drain back along the flood front.
use crate::error::{NetworkConstructionError, PitMetric, Result};
use crate::raster::{Raster, UNDEFINED};
use log::debug;
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

/// pcraster style local drain direction code for an outlet (pit).
pub const LDD_PIT: u8 = 5;
/// Local drain direction code for cells outside the network.
pub const LDD_NODATA: u8 = 255;

const DX: [isize; 8] = [1, 1, 1, 0, -1, -1, -1, 0];
const DY: [isize; 8] = [-1, 0, 1, 1, 1, 0, -1, -1];

/// Limits on which depressions get filled during network construction.
///
/// A depression is resolved only when all four of its measures are within their thresholds;
/// `None` means unbounded. Areas count cells, the volume is in elevation units times cells.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PitFillPolicy {
    pub outflow_depth: Option<f64>,
    pub core_area: Option<f64>,
    pub core_volume: Option<f64>,
    pub catchment_area: Option<f64>,
}

impl PitFillPolicy {
    /// Fills every depression regardless of size.
    pub fn unbounded() -> Self {
        PitFillPolicy::default()
    }

    pub fn bounded(outflow_depth: f64, core_area: f64, core_volume: f64, catchment_area: f64) -> Self {
        PitFillPolicy {
            outflow_depth: Some(outflow_depth),
            core_area: Some(core_area),
            core_volume: Some(core_volume),
            catchment_area: Some(catchment_area),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        [self.outflow_depth, self.core_area, self.core_volume, self.catchment_area]
            .iter()
            .all(|t| t.is_none_or(f64::is_infinite))
    }

    fn exceeded(&self, d: &Depression) -> Option<(PitMetric, f64, f64)> {
        let checks = [
            (PitMetric::OutflowDepth, d.depth, self.outflow_depth),
            (PitMetric::CoreArea, d.area as f64, self.core_area),
            (PitMetric::CoreVolume, d.volume, self.core_volume),
            (PitMetric::CatchmentArea, d.catchment as f64, self.catchment_area),
        ];
        checks
            .into_iter()
            .find_map(|(metric, value, limit)| match limit {
                Some(t) if value > t => Some((metric, value, t)),
                _ => None,
            })
    }
}

/// Where a cell sends its water.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Outside,
    Outlet,
    Downstream(usize),
}

#[derive(PartialEq, Debug)]
struct FloodCell {
    index: usize,
    priority: f64,
    seq: usize,
}

impl Eq for FloodCell {}

impl PartialOrd for FloodCell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloodCell {
    // reversed so BinaryHeap pops the lowest, oldest cell first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug)]
struct Depression {
    deepest: usize,
    depth: f64,
    area: usize,
    volume: f64,
    catchment: usize,
}

/// A single-direction flow graph over the defined cells of a DEM.
#[derive(Debug, Clone, PartialEq)]
pub struct DrainageNetwork {
    shape: (usize, usize),
    links: Vec<Link>,
    order: Vec<usize>,
}

impl DrainageNetwork {
    /// Derives the network from `elevation`, filling depressions as allowed by `policy`.
    ///
    /// # Errors
    ///
    /// [`NetworkConstructionError::NoData`] when nothing is defined,
    /// [`NetworkConstructionError::UnresolvedPit`] when a depression exceeds the policy.
    ///
    /// # Example
    ///
    /// ```
    /// use ndarray::array;
    /// use snowmelt_calibration::{DrainageNetwork, PitFillPolicy, Raster};
    ///
    /// let dem = Raster::from_array(array![
    ///     [10.0, 12.0, 10.0],
    ///     [12.0,  9.0, 12.0],
    ///     [10.0, 12.0,  8.0],
    /// ]);
    /// let ldd = DrainageNetwork::build(&dem, &PitFillPolicy::unbounded()).unwrap();
    /// assert_eq!(ldd.downstream(1, 1), Some((2, 2)));
    /// ```
    pub fn build(elevation: &Raster, policy: &PitFillPolicy) -> Result<DrainageNetwork> {
        let shape = elevation.shape();
        let (rows, columns) = shape;
        let total = elevation.defined_count();
        if total == 0 {
            return Err(NetworkConstructionError::NoData.into());
        }

        let (filled, parent) = flood(elevation);

        // steepest descent on the filled surface, one row per task
        let links: Vec<Link> = (0..rows)
            .into_par_iter()
            .flat_map_iter(|row| {
                let filled = &filled;
                let parent = &parent;
                (0..columns).map(move |col| {
                    let Some(z) = filled[[row, col]] else {
                        return Link::Outside;
                    };
                    let mut best: Option<(usize, f64)> = None;
                    for n in 0..8 {
                        let Some((rn, cn)) = neighbour(shape, row, col, n) else {
                            continue;
                        };
                        let Some(zn) = filled[[rn, cn]] else {
                            continue;
                        };
                        let drop = z - zn;
                        if drop > 0.0 {
                            let slope = drop / distance(n);
                            if best.is_none_or(|(_, s)| slope > s) {
                                best = Some((rn * columns + cn, slope));
                            }
                        }
                    }
                    match (best, parent[[row, col]]) {
                        (Some((down, _)), _) => Link::Downstream(down),
                        (None, Some(p)) => Link::Downstream(p),
                        (None, None) => Link::Outlet,
                    }
                })
            })
            .collect();

        let order = topological_order(&links);
        if order.len() != total {
            return Err(NetworkConstructionError::Cycle {
                resolved: order.len(),
                total,
            }
            .into());
        }

        let network = DrainageNetwork { shape, links, order };

        let depressions = network.depressions(elevation, &filled);
        if !policy.is_unbounded() {
            for d in &depressions {
                if let Some((metric, value, threshold)) = policy.exceeded(d) {
                    return Err(NetworkConstructionError::UnresolvedPit {
                        row: d.deepest / columns,
                        col: d.deepest % columns,
                        metric,
                        value,
                        threshold,
                    }
                    .into());
                }
            }
        }

        debug!(
            "drainage network over {}x{}: {} cells, {} outlets, {} depressions filled",
            rows,
            columns,
            total,
            network.outlets().len(),
            depressions.len()
        );
        Ok(network)
    }

    /// Sums `source` over each cell and everything upstream of it.
    ///
    /// Cells outside the network are undefined, and an undefined source cell makes itself and
    /// every cell downstream of it undefined.
    pub fn accumulate(&self, source: &Raster) -> Result<Raster> {
        source.check_shape(self.shape)?;
        let columns = self.shape.1;
        Ok(self.route(|i| source.get(i / columns, i % columns)))
    }

    /// Number of contributing cells, including the cell itself.
    pub fn upstream_area(&self) -> Raster {
        self.route(|_| Some(1.0))
    }

    fn route<F>(&self, source: F) -> Raster
    where
        F: Fn(usize) -> Option<f64>,
    {
        let columns = self.shape.1;
        let mut acc: Vec<Option<f64>> = self
            .links
            .iter()
            .enumerate()
            .map(|(i, link)| match link {
                Link::Outside => None,
                _ => source(i),
            })
            .collect();

        // headwaters first, so each cell is final before it is passed on
        for &i in &self.order {
            if let Link::Downstream(down) = self.links[i] {
                acc[down] = match (acc[down], acc[i]) {
                    (Some(a), Some(b)) => Some(a + b),
                    _ => None,
                };
            }
        }

        let values = Array2::from_shape_fn(self.shape, |(r, c)| acc[r * columns + c].unwrap_or(UNDEFINED));
        Raster::new(values, UNDEFINED)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Number of cells in the network.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.link(row, col).is_some_and(|l| l != Link::Outside)
    }

    /// The cell `(row, col)` drains to, `None` for outlets and cells outside the network.
    pub fn downstream(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        match self.link(row, col)? {
            Link::Downstream(d) => Some((d / self.shape.1, d % self.shape.1)),
            _ => None,
        }
    }

    pub fn is_outlet(&self, row: usize, col: usize) -> bool {
        self.link(row, col) == Some(Link::Outlet)
    }

    /// Outlet cells in row-major order.
    pub fn outlets(&self) -> Vec<(usize, usize)> {
        let columns = self.shape.1;
        self.links
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == Link::Outlet)
            .map(|(i, _)| (i / columns, i % columns))
            .collect()
    }

    /// The outlet that `(row, col)` eventually drains to.
    pub fn outlet_of(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        let mut here = (row, col);
        if !self.contains(row, col) {
            return None;
        }
        // acyclic, so this walks at most len() steps
        while let Some(next) = self.downstream(here.0, here.1) {
            here = next;
        }
        Some(here)
    }

    /// Directions as pcraster local drain direction codes (numeric keypad layout, 5 = pit).
    pub fn ldd(&self) -> Array2<u8> {
        let columns = self.shape.1;
        Array2::from_shape_fn(self.shape, |(r, c)| match self.links[r * columns + c] {
            Link::Outside => LDD_NODATA,
            Link::Outlet => LDD_PIT,
            Link::Downstream(d) => {
                let dr = (d / columns) as isize - r as isize;
                let dc = (d % columns) as isize - c as isize;
                // keypad: 7 8 9 / 4 5 6 / 1 2 3, with north up
                (5 - 3 * dr + dc) as u8
            }
        })
    }

    fn link(&self, row: usize, col: usize) -> Option<Link> {
        let (rows, columns) = self.shape;
        (row < rows && col < columns).then(|| self.links[row * columns + col])
    }

    /// Groups raised cells into depressions and measures each one.
    fn depressions(&self, elevation: &Raster, filled: &Array2<Option<f64>>) -> Vec<Depression> {
        let (rows, columns) = self.shape;
        let raise = |i: usize| -> f64 {
            let (r, c) = (i / columns, i % columns);
            match (filled[[r, c]], elevation.get(r, c)) {
                (Some(f), Some(z)) if f > z => f - z,
                _ => 0.0,
            }
        };
        let area = self.upstream_area();
        let mut seen = vec![false; rows * columns];
        let mut found = Vec::new();
        let mut queue = VecDeque::new();

        for start in 0..rows * columns {
            if seen[start] || raise(start) <= 0.0 {
                continue;
            }
            seen[start] = true;
            queue.push_back(start);
            let mut members = Vec::new();
            while let Some(i) = queue.pop_front() {
                members.push(i);
                for n in 0..8 {
                    if let Some((rn, cn)) = neighbour(self.shape, i / columns, i % columns, n) {
                        let j = rn * columns + cn;
                        if !seen[j] && raise(j) > 0.0 {
                            seen[j] = true;
                            queue.push_back(j);
                        }
                    }
                }
            }
            members.sort_unstable();

            let mut d = Depression {
                deepest: members[0],
                depth: 0.0,
                area: members.len(),
                volume: 0.0,
                catchment: 0,
            };
            for &i in &members {
                let h = raise(i);
                d.volume += h;
                if h > d.depth {
                    d.depth = h;
                    d.deepest = i;
                }
                let leaves = match self.links[i] {
                    Link::Downstream(j) => members.binary_search(&j).is_err(),
                    _ => true,
                };
                if leaves {
                    d.catchment += area.get(i / columns, i % columns).unwrap_or(0.0) as usize;
                }
            }
            found.push(d);
        }
        found
    }
}

#[inline]
fn neighbour(shape: (usize, usize), row: usize, col: usize, n: usize) -> Option<(usize, usize)> {
    let rn = row as isize + DY[n];
    let cn = col as isize + DX[n];
    if rn < 0 || cn < 0 || rn as usize >= shape.0 || cn as usize >= shape.1 {
        return None;
    }
    Some((rn as usize, cn as usize))
}

#[inline]
fn distance(n: usize) -> f64 {
    if DX[n] != 0 && DY[n] != 0 {
        std::f64::consts::SQRT_2
    } else {
        1.0
    }
}

/// Priority-flood from the DEM margin. Returns the filled surface and, for every cell that
/// was reached from a neighbour, the flat index of that neighbour.
fn flood(dem: &Raster) -> (Array2<Option<f64>>, Array2<Option<usize>>) {
    let shape = dem.shape();
    let (rows, columns) = shape;
    let mut filled: Array2<Option<f64>> = Array2::from_elem(shape, None);
    let mut parent: Array2<Option<usize>> = Array2::from_elem(shape, None);
    let mut closed = Array2::<u8>::zeros(shape);
    let mut minheap = BinaryHeap::new();
    let mut seq = 0;

    // seed with defined cells on the edge or next to nodata
    for row in 0..rows {
        for col in 0..columns {
            let Some(z) = dem.get(row, col) else {
                continue;
            };
            let on_margin = (0..8).any(|n| match neighbour(shape, row, col, n) {
                Some((rn, cn)) => !dem.is_defined(rn, cn),
                None => true,
            });
            if on_margin {
                closed[[row, col]] = 1;
                filled[[row, col]] = Some(z);
                minheap.push(FloodCell {
                    index: row * columns + col,
                    priority: z,
                    seq,
                });
                seq += 1;
            }
        }
    }

    while let Some(cell) = minheap.pop() {
        let (row, col) = (cell.index / columns, cell.index % columns);
        for n in 0..8 {
            let Some((rn, cn)) = neighbour(shape, row, col, n) else {
                continue;
            };
            if closed[[rn, cn]] == 1 {
                continue;
            }
            let Some(zn) = dem.get(rn, cn) else {
                continue;
            };
            closed[[rn, cn]] = 1;
            let z = zn.max(cell.priority);
            filled[[rn, cn]] = Some(z);
            parent[[rn, cn]] = Some(cell.index);
            minheap.push(FloodCell {
                index: rn * columns + cn,
                priority: z,
                seq,
            });
            seq += 1;
        }
    }
    (filled, parent)
}

/// Kahn ordering from headwaters to outlets; cells on a cycle are left out.
fn topological_order(links: &[Link]) -> Vec<usize> {
    let mut indegree = vec![0usize; links.len()];
    for link in links {
        if let Link::Downstream(d) = link {
            indegree[*d] += 1;
        }
    }
    let mut queue: VecDeque<usize> = links
        .iter()
        .enumerate()
        .filter(|(i, l)| **l != Link::Outside && indegree[*i] == 0)
        .map(|(i, _)| i)
        .collect();
    let mut order = Vec::with_capacity(links.len());
    while let Some(i) = queue.pop_front() {
        order.push(i);
        if let Link::Downstream(d) = links[i] {
            indegree[d] -= 1;
            if indegree[d] == 0 {
                queue.push_back(d);
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_is_detected() {
        let links = vec![Link::Downstream(1), Link::Downstream(0), Link::Outlet];
        assert_eq!(topological_order(&links), vec![2]);
    }

    #[test]
    fn flood_cell_pops_lowest_then_oldest() {
        let mut heap = BinaryHeap::new();
        heap.push(FloodCell { index: 0, priority: 2.0, seq: 0 });
        heap.push(FloodCell { index: 1, priority: 1.0, seq: 1 });
        heap.push(FloodCell { index: 2, priority: 1.0, seq: 2 });
        let popped: Vec<usize> = std::iter::from_fn(|| heap.pop().map(|c| c.index)).collect();
        assert_eq!(popped, vec![1, 2, 0]);
    }

    #[test]
    fn unbounded_policy_detection() {
        assert!(PitFillPolicy::unbounded().is_unbounded());
        assert!(PitFillPolicy::bounded(f64::INFINITY, f64::INFINITY, f64::INFINITY, f64::INFINITY).is_unbounded());
        assert!(!PitFillPolicy::bounded(1.0, f64::INFINITY, f64::INFINITY, f64::INFINITY).is_unbounded());
    }
}
