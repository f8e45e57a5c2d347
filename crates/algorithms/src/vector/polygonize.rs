//! Raster regions to polygons
//!
//! Each labeled region becomes one polygon whose rings run along pixel
//! edges. Boundary edges are directed so the region is always on the right
//! when walking them in pixel space (x = column, y = row, y down); outer
//! rings then have positive shoelace area there and holes negative.
//!
//! Where two region pixels meet only at a corner (a saddle vertex), the
//! walk turns to match the labeling rule: under 4-connectivity it hugs the
//! current pixel, under 8-connectivity it crosses to the diagonal one. A
//! ring therefore never joins pixels the labeler kept apart.

use geo::orient::{Direction, Orient};
use geo::{Coord, LineString, Polygon};
use std::collections::HashMap;

use crate::maybe_rayon::*;
use crate::segmentation::LabeledRegions;
use burnscar_core::raster::{Connectivity, GeoTransform};
use burnscar_core::{Error, Result};

/// One polygon per region, in id order
#[derive(Debug, Clone)]
pub struct RegionPolygon {
    /// Region id from the labeled raster (1-based)
    pub id: u32,
    /// Geometry in the raster's native CRS; exterior counter-clockwise,
    /// holes clockwise
    pub polygon: Polygon<f64>,
    /// Pixels covered by the region
    pub pixel_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dir {
    East,
    South,
    West,
    North,
}

impl Dir {
    /// Clockwise on screen
    fn right(self) -> Dir {
        match self {
            Dir::East => Dir::South,
            Dir::South => Dir::West,
            Dir::West => Dir::North,
            Dir::North => Dir::East,
        }
    }

    fn left(self) -> Dir {
        match self {
            Dir::East => Dir::North,
            Dir::North => Dir::West,
            Dir::West => Dir::South,
            Dir::South => Dir::East,
        }
    }

    fn step(self) -> (i64, i64) {
        match self {
            Dir::East => (1, 0),
            Dir::South => (0, 1),
            Dir::West => (-1, 0),
            Dir::North => (0, -1),
        }
    }
}

type Vertex = (i64, i64);

#[derive(Debug, Clone, Copy)]
struct Edge {
    from: Vertex,
    dir: Dir,
}

impl Edge {
    fn to(&self) -> Vertex {
        let (dx, dy) = self.dir.step();
        (self.from.0 + dx, self.from.1 + dy)
    }
}

/// Directed boundary edges of every region, grouped by `id - 1`
fn collect_edges(regions: &LabeledRegions) -> Vec<Vec<Edge>> {
    let labels = regions.labels.data();
    let (rows, cols) = labels.dim();
    let mut edges: Vec<Vec<Edge>> = vec![Vec::new(); regions.count];

    let label_at = |r: isize, c: isize| -> u32 {
        if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
            0
        } else {
            labels[(r as usize, c as usize)]
        }
    };

    for row in 0..rows {
        for col in 0..cols {
            let id = labels[(row, col)];
            if id == 0 {
                continue;
            }
            let (r, c) = (row as isize, col as isize);
            let (x, y) = (col as i64, row as i64);
            let out = &mut edges[id as usize - 1];

            if label_at(r - 1, c) != id {
                out.push(Edge { from: (x, y), dir: Dir::East });
            }
            if label_at(r, c + 1) != id {
                out.push(Edge { from: (x + 1, y), dir: Dir::South });
            }
            if label_at(r + 1, c) != id {
                out.push(Edge { from: (x + 1, y + 1), dir: Dir::West });
            }
            if label_at(r, c - 1) != id {
                out.push(Edge { from: (x, y + 1), dir: Dir::North });
            }
        }
    }
    edges
}

/// Twice the signed shoelace area of a closed ring in pixel space
fn doubled_area(ring: &[Vertex]) -> i64 {
    ring.windows(2)
        .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
        .sum()
}

/// Close every ring formed by one region's edges.
///
/// Returned rings list only corner vertices and repeat the first vertex at
/// the end.
fn trace_rings(edges: &[Edge], connectivity: Connectivity) -> Result<Vec<Vec<Vertex>>> {
    let mut outgoing: HashMap<Vertex, [Option<usize>; 2]> = HashMap::with_capacity(edges.len());
    for (i, e) in edges.iter().enumerate() {
        let slot = outgoing.entry(e.from).or_insert([None, None]);
        if slot[0].is_none() {
            slot[0] = Some(i);
        } else {
            slot[1] = Some(i);
        }
    }

    let next_edge = |current: &Edge| -> Result<usize> {
        let vertex = current.to();
        match outgoing.get(&vertex) {
            Some([Some(only), None]) => Ok(*only),
            Some([Some(a), Some(b)]) => {
                let wanted = if connectivity.joins_diagonals() {
                    current.dir.left()
                } else {
                    current.dir.right()
                };
                [*a, *b]
                    .into_iter()
                    .find(|&i| edges[i].dir == wanted)
                    .ok_or_else(|| Error::Algorithm(format!("no turn available at {:?}", vertex)))
            }
            _ => Err(Error::Algorithm(format!("open boundary at {:?}", vertex))),
        }
    };

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        let mut ring: Vec<Vertex> = Vec::new();
        let mut current = start;
        loop {
            used[current] = true;
            let edge = &edges[current];
            let next = next_edge(edge)?;
            if edges[next].dir != edge.dir {
                ring.push(edge.to());
            }
            if next == start {
                break;
            }
            if used[next] {
                return Err(Error::Algorithm(format!(
                    "boundary revisits edge at {:?}",
                    edges[next].from
                )));
            }
            current = next;
        }
        if let Some(&first) = ring.first() {
            ring.push(first);
        }
        rings.push(ring);
    }
    Ok(rings)
}

fn to_world(ring: &[Vertex], transform: &GeoTransform) -> LineString<f64> {
    ring.iter()
        .map(|&(x, y)| {
            let (wx, wy) = transform.apply(x as f64, y as f64);
            Coord { x: wx, y: wy }
        })
        .collect()
}

/// Build the polygon for one region from its rings
fn region_polygon(id: u32, edges: &[Edge], connectivity: Connectivity, transform: &GeoTransform) -> Result<RegionPolygon> {
    let rings = trace_rings(edges, connectivity)?;

    let mut exterior: Option<Vec<Vertex>> = None;
    let mut holes = Vec::new();
    let mut doubled = 0i64;
    for ring in rings {
        let a = doubled_area(&ring);
        doubled += a;
        if a > 0 {
            if exterior.is_some() {
                return Err(Error::Algorithm(format!("region {} has more than one outer ring", id)));
            }
            exterior = Some(ring);
        } else {
            holes.push(ring);
        }
    }
    let exterior = exterior.ok_or_else(|| Error::Algorithm(format!("region {} has no outer ring", id)))?;

    let polygon = Polygon::new(
        to_world(&exterior, transform),
        holes.iter().map(|h| to_world(h, transform)).collect(),
    )
    .orient(Direction::Default);

    Ok(RegionPolygon {
        id,
        polygon,
        pixel_count: (doubled / 2) as usize,
    })
}

/// Polygonize every region of a labeled raster.
///
/// Returns exactly one polygon per region id, ordered by id. Background
/// (id 0) never produces a polygon; pixels of other regions or background
/// enclosed by a region become holes of its polygon. Coordinates are
/// pixel corners mapped through the raster's transform.
pub fn polygonize(regions: &LabeledRegions) -> Result<Vec<RegionPolygon>> {
    let transform = *regions.labels.transform();
    let connectivity = regions.connectivity;

    collect_edges(regions)
        .into_par_iter()
        .enumerate()
        .map(|(i, edges)| region_polygon(i as u32 + 1, &edges, connectivity, &transform))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::label_regions;
    use approx::assert_relative_eq;
    use burnscar_core::Raster;
    use geo::winding_order::Winding;
    use geo::Area;
    use ndarray::{array, Array2};

    fn regions(data: Array2<u8>, connectivity: Connectivity) -> LabeledRegions {
        let mut mask = Raster::from_array(data);
        mask.set_transform(GeoTransform::new(0.0, 0.0, 1.0, -1.0));
        label_regions(&mask, connectivity).unwrap()
    }

    #[test]
    fn test_single_pixel() {
        let polys = polygonize(&regions(array![[0, 0], [0, 1]], Connectivity::Four)).unwrap();
        assert_eq!(polys.len(), 1);
        let p = &polys[0].polygon;
        assert_eq!(p.exterior().0.len(), 5);
        assert_relative_eq!(p.unsigned_area(), 1.0);
        assert_eq!(polys[0].pixel_count, 1);
        // Pixel (1, 1) spans x in [1, 2], y in [-2, -1]
        let xs: Vec<f64> = p.exterior().coords().map(|c| c.x).collect();
        assert!(xs.iter().all(|&x| x == 1.0 || x == 2.0));
    }

    #[test]
    fn test_ring_with_hole() {
        let r = regions(
            array![
                [1, 1, 1],
                [1, 0, 1],
                [1, 1, 1],
            ],
            Connectivity::Four,
        );
        let polys = polygonize(&r).unwrap();
        assert_eq!(polys.len(), 1);
        let p = &polys[0].polygon;
        assert_eq!(p.interiors().len(), 1);
        assert_relative_eq!(p.unsigned_area(), 8.0);
        assert_eq!(polys[0].pixel_count, 8);
    }

    #[test]
    fn test_island_inside_hole_is_separate_polygon() {
        let r = regions(
            array![
                [1, 1, 1, 1, 1],
                [1, 0, 0, 0, 1],
                [1, 0, 1, 0, 1],
                [1, 0, 0, 0, 1],
                [1, 1, 1, 1, 1],
            ],
            Connectivity::Four,
        );
        let polys = polygonize(&r).unwrap();
        assert_eq!(polys.len(), 2);
        assert_eq!(polys[0].polygon.interiors().len(), 1);
        assert_relative_eq!(polys[0].polygon.unsigned_area(), 16.0);
        assert_relative_eq!(polys[1].polygon.unsigned_area(), 1.0);
    }

    #[test]
    fn test_diagonal_pair_four_connectivity() {
        let polys = polygonize(&regions(array![[1, 0], [0, 1]], Connectivity::Four)).unwrap();
        assert_eq!(polys.len(), 2);
        for p in &polys {
            assert_relative_eq!(p.polygon.unsigned_area(), 1.0);
            assert_eq!(p.polygon.exterior().0.len(), 5);
        }
    }

    #[test]
    fn test_diagonal_pair_eight_connectivity() {
        let polys = polygonize(&regions(array![[1, 0], [0, 1]], Connectivity::Eight)).unwrap();
        assert_eq!(polys.len(), 1);
        let p = &polys[0].polygon;
        assert!(p.interiors().is_empty());
        assert_relative_eq!(p.unsigned_area(), 2.0);
        // Both squares in one ring that touches itself at the shared corner
        assert_eq!(p.exterior().0.len(), 9);
    }

    #[test]
    fn test_pinched_hole_under_each_rule() {
        // Background pixel (1, 1) reaches the outside only through the
        // corner where region pixels (1, 2) and (2, 1) meet diagonally
        let data = array![
            [1, 1, 1, 0],
            [1, 0, 1, 0],
            [1, 1, 0, 0],
        ];

        // 4-connectivity: the hole leaks to the outside through the corner,
        // so there is no interior ring
        let four = polygonize(&regions(data.clone(), Connectivity::Four)).unwrap();
        assert_eq!(four.len(), 1);
        assert!(four[0].polygon.interiors().is_empty());
        assert_relative_eq!(four[0].polygon.unsigned_area(), 7.0);

        // 8-connectivity: the same background pixel is enclosed
        let eight = polygonize(&regions(data, Connectivity::Eight)).unwrap();
        assert_eq!(eight.len(), 1);
        assert_eq!(eight[0].polygon.interiors().len(), 1);
        assert_relative_eq!(eight[0].polygon.unsigned_area(), 7.0);
    }

    #[test]
    fn test_exterior_orientation_and_empty() {
        let polys = polygonize(&regions(array![[1, 1], [1, 0]], Connectivity::Four)).unwrap();
        assert!(polys[0].polygon.exterior().is_ccw());
        assert_relative_eq!(polys[0].polygon.unsigned_area(), 3.0);
        // L shape: 6 corners
        assert_eq!(polys[0].polygon.exterior().0.len(), 7);

        let none = polygonize(&regions(Array2::zeros((3, 3)), Connectivity::Four)).unwrap();
        assert!(none.is_empty());
    }
}
