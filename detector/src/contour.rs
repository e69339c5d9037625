//! External contour extraction on binary masks.
//!
//! Foreground is 8-connected, background 4-connected. Only components that
//! touch the background surrounding the whole image are reported; a blob
//! sitting inside another blob's hole has no external contour of its own.

use std::collections::VecDeque;

use image::GrayImage;
use motion_pipeline_common::frame::MotionRegion;

/// Moore neighbourhood, clockwise with y pointing down, starting east.
const DIRS: [(i64, i64); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];
const WEST: usize = 4;

/// Closed outer boundary of one component, as pixel coordinates in tracing
/// order. The first point is the component's top-left-most pixel and is
/// repeated at the end when the boundary has more than one point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<(u32, u32)>,
}

impl Contour {
    /// Area enclosed by the boundary polygon through the pixel centres.
    /// A filled `w×h` block encloses `(w-1)(h-1)`; lines and single pixels
    /// enclose nothing.
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice: i64 = (0..n)
            .map(|i| {
                let (x0, y0) = self.points[i];
                let (x1, y1) = self.points[(i + 1) % n];
                x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64
            })
            .sum();
        twice.abs() as f64 / 2.0
    }

    pub fn bounding_rect(&self) -> MotionRegion {
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0, 0);
        for &(x, y) in &self.points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        if self.points.is_empty() {
            return MotionRegion::new(0, 0, 0, 0);
        }
        MotionRegion::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }
}

struct Grid<'a> {
    mask: &'a GrayImage,
    width: i64,
    height: i64,
}

impl Grid<'_> {
    fn index(&self, x: i64, y: i64) -> Option<usize> {
        (x >= 0 && y >= 0 && x < self.width && y < self.height)
            .then(|| (y * self.width + x) as usize)
    }

    fn is_foreground(&self, x: i64, y: i64) -> bool {
        self.index(x, y)
            .is_some_and(|_| self.mask.get_pixel(x as u32, y as u32)[0] != 0)
    }
}

/// Trace the external contour of every outer foreground component.
pub fn find_external_contours(mask: &GrayImage) -> Vec<Contour> {
    let grid = Grid {
        mask,
        width: mask.width() as i64,
        height: mask.height() as i64,
    };
    let len = (grid.width * grid.height) as usize;
    if len == 0 {
        return Vec::new();
    }

    let outside = outer_background(&grid);
    let mut visited = vec![false; len];
    let mut contours = Vec::new();
    let mut queue = VecDeque::new();

    for y in 0..grid.height {
        for x in 0..grid.width {
            let idx = (y * grid.width + x) as usize;
            if visited[idx] || !grid.is_foreground(x, y) {
                continue;
            }

            // Label the whole component, noting whether it borders the
            // outer background.
            let mut external = false;
            visited[idx] = true;
            queue.push_back((x, y));
            while let Some((cx, cy)) = queue.pop_front() {
                for (i, &(dx, dy)) in DIRS.iter().enumerate() {
                    let (nx, ny) = (cx + dx, cy + dy);
                    match grid.index(nx, ny) {
                        None => external |= i % 2 == 0,
                        Some(n) if grid.is_foreground(nx, ny) => {
                            if !visited[n] {
                                visited[n] = true;
                                queue.push_back((nx, ny));
                            }
                        }
                        Some(n) => external |= i % 2 == 0 && outside[n],
                    }
                }
            }

            if external {
                contours.push(trace_boundary(&grid, (x, y)));
            }
        }
    }
    contours
}

/// Background pixels 4-connected to the image border.
fn outer_background(grid: &Grid<'_>) -> Vec<bool> {
    let mut outside = vec![false; (grid.width * grid.height) as usize];
    let mut queue = VecDeque::new();

    let border = (0..grid.width)
        .flat_map(|x| [(x, 0), (x, grid.height - 1)])
        .chain((0..grid.height).flat_map(|y| [(0, y), (grid.width - 1, y)]));
    for (x, y) in border {
        if let Some(idx) = grid.index(x, y) {
            if !outside[idx] && !grid.is_foreground(x, y) {
                outside[idx] = true;
                queue.push_back((x, y));
            }
        }
    }

    while let Some((x, y)) = queue.pop_front() {
        for &(dx, dy) in DIRS.iter().step_by(2) {
            let (nx, ny) = (x + dx, y + dy);
            if let Some(n) = grid.index(nx, ny) {
                if !outside[n] && !grid.is_foreground(nx, ny) {
                    outside[n] = true;
                    queue.push_back((nx, ny));
                }
            }
        }
    }
    outside
}

/// Moore-neighbour boundary tracing from a component's top-left-most pixel.
fn trace_boundary(grid: &Grid<'_>, start: (i64, i64)) -> Contour {
    let mut points = vec![(start.0 as u32, start.1 as u32)];
    let mut current = start;
    // Everything west of (and above) the start pixel is background.
    let mut backtrack = WEST;
    let mut first_step: Option<(i64, i64)> = None;
    let max_steps = 4 * (grid.width * grid.height) as usize + 8;

    for _ in 0..max_steps {
        let next = (1..=8).map(|i| (backtrack + i) % 8).find_map(|d| {
            let candidate = (current.0 + DIRS[d].0, current.1 + DIRS[d].1);
            grid.is_foreground(candidate.0, candidate.1)
                .then_some((d, candidate))
        });
        let Some((dir, next)) = next else {
            break; // isolated pixel
        };

        if current == start {
            match first_step {
                None => first_step = Some(next),
                Some(step) if step == next => break,
                Some(_) => {}
            }
        }

        // The last background cell examined, seen from `next`.
        let prev = DIRS[(dir + 7) % 8];
        let probe = (current.0 + prev.0 - next.0, current.1 + prev.1 - next.1);
        backtrack = DIRS.iter().position(|&d| d == probe).unwrap_or(WEST);

        points.push((next.0 as u32, next.1 as u32));
        current = next;
    }

    Contour { points }
}
