//! Boolean rasters and the rasterisation primitives the obstacle map is built from.

use serde::{Deserialize, Serialize};

use super::geometry::{Point, Pose};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoolRaster {
    pub rows: usize,
    pub cols: usize,
    data: Vec<bool>,
}

impl BoolRaster {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![false; rows * cols],
        }
    }

    pub fn filled(rows: usize, cols: usize, value: bool) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> bool {
        self.data[row * self.cols + col]
    }

    /// Out-of-range indices read as `outside`.
    #[inline]
    pub fn get_signed(&self, row: i64, col: i64, outside: bool) -> bool {
        if row < 0 || col < 0 || row >= self.rows as i64 || col >= self.cols as i64 {
            outside
        } else {
            self.get(row as usize, col as usize)
        }
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: bool) {
        self.data[row * self.cols + col] = value;
    }

    /// Writes only when the index lies inside the raster.
    #[inline]
    pub fn set_signed(&mut self, row: i64, col: i64, value: bool) {
        if row >= 0 && col >= 0 && row < self.rows as i64 && col < self.cols as i64 {
            self.set(row as usize, col as usize, value);
        }
    }

    pub fn any(&self) -> bool {
        self.data.iter().any(|&v| v)
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn invert(&mut self) {
        for v in &mut self.data {
            *v = !*v;
        }
    }

    pub fn or_assign(&mut self, other: &BoolRaster) {
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a |= *b;
        }
    }

    /// Indices of every `true` cell.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, &v)| v)
            .map(move |(i, _)| (i / self.cols, i % self.cols))
    }
}

/// Marks every cell whose centre lies inside the polygon plus every cell its boundary passes
/// through. Vertices are given as fractional (row, col).
pub fn fill_polygon(raster: &mut BoolRaster, vertices: &[(f64, f64)]) {
    if vertices.is_empty() {
        return;
    }
    for i in 0..vertices.len() {
        let a = vertices[i];
        let b = vertices[(i + 1) % vertices.len()];
        draw_segment(raster, a, b);
    }
    if vertices.len() < 3 {
        return;
    }

    let min_row = vertices.iter().map(|v| v.0).fold(f64::INFINITY, f64::min).ceil();
    let max_row = vertices.iter().map(|v| v.0).fold(f64::NEG_INFINITY, f64::max).floor();
    let first_row = min_row.max(0.0) as i64;
    let last_row = max_row.min(raster.rows as f64 - 1.0) as i64;

    let mut crossings: Vec<f64> = Vec::new();
    for row in first_row..=last_row {
        let r = row as f64;
        crossings.clear();
        for i in 0..vertices.len() {
            let (r0, c0) = vertices[i];
            let (r1, c1) = vertices[(i + 1) % vertices.len()];
            if (r0 > r) != (r1 > r) {
                crossings.push(c0 + (r - r0) * (c1 - c0) / (r1 - r0));
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));
        for pair in crossings.chunks(2) {
            if let [left, right] = pair {
                let from = left.ceil().max(0.0) as i64;
                let to = right.floor().min(raster.cols as f64 - 1.0) as i64;
                for col in from..=to {
                    raster.set_signed(row, col, true);
                }
            }
        }
    }
}

/// Marks the cells a straight segment passes through, sampling at half-cell steps.
fn draw_segment(raster: &mut BoolRaster, a: (f64, f64), b: (f64, f64)) {
    let span = (b.0 - a.0).abs().max((b.1 - a.1).abs());
    let steps = (span * 2.0).ceil().max(1.0) as usize;
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let row = a.0 + t * (b.0 - a.0);
        let col = a.1 + t * (b.1 - a.1);
        raster.set_signed(row.round() as i64, col.round() as i64, true);
    }
}

/// Cell offsets (d_row, d_col) covered by `outline` when the robot sits at a cell centre
/// with heading `yaw`.
pub fn footprint_offsets(outline: &[Point], yaw: f64, pixel_size: f64) -> Vec<(i64, i64)> {
    if outline.is_empty() {
        return vec![(0, 0)];
    }
    let pose = Pose::new(0.0, 0.0, yaw);
    let cells: Vec<(f64, f64)> = outline
        .iter()
        .map(|p| {
            let w = pose.transform(p);
            (w.y / pixel_size, w.x / pixel_size)
        })
        .collect();

    let min_row = cells.iter().map(|c| c.0).fold(f64::INFINITY, f64::min).floor() as i64 - 1;
    let max_row = cells.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max).ceil() as i64 + 1;
    let min_col = cells.iter().map(|c| c.1).fold(f64::INFINITY, f64::min).floor() as i64 - 1;
    let max_col = cells.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max).ceil() as i64 + 1;

    let rows = (max_row - min_row + 1) as usize;
    let cols = (max_col - min_col + 1) as usize;
    let mut local = BoolRaster::new(rows, cols);
    let shifted: Vec<(f64, f64)> = cells
        .iter()
        .map(|(r, c)| (r - min_row as f64, c - min_col as f64))
        .collect();
    fill_polygon(&mut local, &shifted);

    local
        .occupied()
        .map(|(r, c)| (r as i64 + min_row, c as i64 + min_col))
        .collect()
}

/// Euclidean distance, in cells, from every cell to the nearest `true` cell.
/// Returns all-infinite distances when nothing is set.
pub fn distance_transform(raster: &BoolRaster) -> Vec<f64> {
    let (rows, cols) = (raster.rows, raster.cols);
    let mut squared = vec![f64::INFINITY; rows * cols];
    if !raster.any() {
        return squared;
    }

    // Columns first, then rows, on squared distances.
    let mut line = vec![0.0; rows.max(cols)];
    let mut out = vec![0.0; rows.max(cols)];
    for c in 0..cols {
        for r in 0..rows {
            line[r] = if raster.get(r, c) { 0.0 } else { f64::INFINITY };
        }
        lower_envelope(&line[..rows], &mut out[..rows]);
        for r in 0..rows {
            squared[r * cols + c] = out[r];
        }
    }
    for r in 0..rows {
        line[..cols].copy_from_slice(&squared[r * cols..(r + 1) * cols]);
        lower_envelope(&line[..cols], &mut out[..cols]);
        squared[r * cols..(r + 1) * cols].copy_from_slice(&out[..cols]);
    }

    squared.into_iter().map(f64::sqrt).collect()
}

/// One-dimensional squared distance transform (Felzenszwalb & Huttenlocher).
fn lower_envelope(f: &[f64], d: &mut [f64]) {
    let n = f.len();
    let sources: Vec<usize> = (0..n).filter(|&q| f[q].is_finite()).collect();
    if sources.is_empty() {
        d.iter_mut().for_each(|v| *v = f64::INFINITY);
        return;
    }

    let mut v: Vec<usize> = Vec::with_capacity(sources.len());
    let mut z: Vec<f64> = Vec::with_capacity(sources.len() + 1);
    let intersect = |q: usize, p: usize| -> f64 {
        let (qf, pf) = (q as f64, p as f64);
        ((f[q] + qf * qf) - (f[p] + pf * pf)) / (2.0 * qf - 2.0 * pf)
    };

    v.push(sources[0]);
    z.push(f64::NEG_INFINITY);
    z.push(f64::INFINITY);
    for &q in &sources[1..] {
        let mut s = intersect(q, v[v.len() - 1]);
        while s <= z[v.len() - 1] {
            v.pop();
            z.pop();
            if v.is_empty() {
                break;
            }
            s = intersect(q, v[v.len() - 1]);
        }
        if v.is_empty() {
            v.push(q);
            z.clear();
            z.push(f64::NEG_INFINITY);
            z.push(f64::INFINITY);
        } else {
            v.push(q);
            let last = z.len() - 1;
            z[last] = s;
            z.push(f64::INFINITY);
        }
    }

    let mut k = 0;
    for (q, out) in d.iter_mut().enumerate().take(n) {
        while z[k + 1] < q as f64 {
            k += 1;
        }
        let dq = q as f64 - v[k] as f64;
        *out = dq * dq + f[v[k]];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_square_and_single_point() {
        let mut raster = BoolRaster::new(10, 10);
        fill_polygon(&mut raster, &[(2.0, 2.0), (2.0, 5.0), (5.0, 5.0), (5.0, 2.0)]);
        assert_eq!(raster.count(), 16);
        assert!(raster.get(3, 3));
        assert!(!raster.get(6, 6));

        let mut point = BoolRaster::new(10, 10);
        fill_polygon(&mut point, &[(7.2, 1.9)]);
        assert_eq!(point.occupied().collect::<Vec<_>>(), vec![(7, 2)]);
    }

    #[test]
    fn test_distance_transform_matches_brute_force() {
        let mut raster = BoolRaster::new(7, 9);
        raster.set(1, 1, true);
        raster.set(5, 7, true);
        raster.set(3, 4, true);
        let distances = distance_transform(&raster);
        for r in 0..7 {
            for c in 0..9 {
                let expected = raster
                    .occupied()
                    .map(|(or, oc)| ((r as f64 - or as f64).powi(2) + (c as f64 - oc as f64).powi(2)).sqrt())
                    .fold(f64::INFINITY, f64::min);
                assert!((distances[r * 9 + c] - expected).abs() < 1e-9, "cell ({}, {})", r, c);
            }
        }
        assert!(distance_transform(&BoolRaster::new(3, 3)).iter().all(|d| d.is_infinite()));
    }

    #[test]
    fn test_footprint_rotates_with_heading() {
        let outline = vec![
            Point::new(0.0, -0.05),
            Point::new(0.5, -0.05),
            Point::new(0.5, 0.05),
            Point::new(0.0, 0.05),
        ];
        let east = footprint_offsets(&outline, 0.0, 0.1);
        assert!(east.contains(&(0, 5)));
        assert!(!east.contains(&(5, 0)));
        let north = footprint_offsets(&outline, std::f64::consts::FRAC_PI_2, 0.1);
        assert!(north.contains(&(5, 0)));
        assert!(!north.contains(&(0, 5)));
    }
}
