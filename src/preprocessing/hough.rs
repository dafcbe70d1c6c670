//! Probabilistic Hough transform
//!
//! Finds straight line segments in a binary edge map. Edge points are visited
//! in a fixed pseudo-random order; each visited point votes in (angle, distance)
//! space, and as soon as one cell reaches the vote threshold the line through
//! that point is walked in both directions to recover the actual segment. Walked
//! points are removed from the edge map so each segment is reported once.

use image::GrayImage;

/// Fixed-point precision used while walking along a line
const SHIFT: u32 = 16;
/// Seed for the point visiting order; fixed so detection is reproducible
const ORDER_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// Line segment endpoints in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSegment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl LineSegment {
    /// Angle of the segment in degrees, `atan2(y2 - y1, x2 - x1)`
    pub fn angle_degrees(&self) -> f32 {
        ((self.y2 - self.y1) as f32)
            .atan2((self.x2 - self.x1) as f32)
            .to_degrees()
    }

    pub fn length(&self) -> f32 {
        (((self.x2 - self.x1).pow(2) + (self.y2 - self.y1).pow(2)) as f32).sqrt()
    }
}

/// Accumulator resolution and acceptance rules
#[derive(Debug, Clone, Copy)]
pub struct HoughParams {
    /// Distance resolution in pixels
    pub rho: f32,
    /// Angle resolution in degrees
    pub theta_degrees: f32,
    /// Minimum votes for a line to be considered
    pub threshold: u32,
    /// Segments shorter than this (along both axes) are dropped
    pub min_line_length: u32,
    /// Largest run of missing edge pixels bridged while walking a line
    pub max_line_gap: u32,
}

/// Deterministic xorshift sequence deciding which edge point is visited next
struct VisitOrder(u64);

impl VisitOrder {
    fn below(&mut self, n: usize) -> usize {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 % n as u64) as usize
    }
}

/// Accumulator over (angle, distance) cells
struct Accumulator {
    votes: Vec<i32>,
    trig: Vec<(f32, f32)>,
    num_rho: usize,
    rho_offset: i32,
}

impl Accumulator {
    fn new(width: i32, height: i32, params: &HoughParams) -> Self {
        let num_angle = (180.0 / params.theta_degrees).round().max(1.0) as usize;
        let num_rho = (((width + height) * 2 + 1) as f32 / params.rho).round() as usize;
        let inv_rho = 1.0 / params.rho;
        let trig = (0..num_angle)
            .map(|n| {
                let theta = (n as f32 * params.theta_degrees).to_radians();
                (theta.cos() * inv_rho, theta.sin() * inv_rho)
            })
            .collect();

        Self {
            votes: vec![0; num_angle * num_rho],
            trig,
            num_rho,
            rho_offset: (num_rho as i32 - 1) / 2,
        }
    }

    fn cell(&self, n: usize, x: i32, y: i32) -> usize {
        let (cos, sin) = self.trig[n];
        let r = (x as f32 * cos + y as f32 * sin).round() as i32 + self.rho_offset;
        n * self.num_rho + r as usize
    }

    /// Add the point's votes and return the strongest angle index with its count
    fn vote(&mut self, x: i32, y: i32) -> (usize, i32) {
        let mut best = (0, i32::MIN);
        for n in 0..self.trig.len() {
            let cell = self.cell(n, x, y);
            self.votes[cell] += 1;
            if self.votes[cell] > best.1 {
                best = (n, self.votes[cell]);
            }
        }
        best
    }

    fn withdraw(&mut self, x: i32, y: i32) {
        for n in 0..self.trig.len() {
            let cell = self.cell(n, x, y);
            self.votes[cell] -= 1;
        }
    }
}

/// Stepping along a line in fixed point, either one pixel per step in x or in y
#[derive(Clone, Copy)]
struct Walk {
    x: i64,
    y: i64,
    dx: i64,
    dy: i64,
    major_x: bool,
}

impl Walk {
    fn from_point(x: i32, y: i32, cos: f32, sin: f32) -> Self {
        // Direction along the line is perpendicular to its normal (cos, sin)
        let (a, b) = (-sin, cos);
        let one = (1i64 << SHIFT) as f32;
        let half = 1i64 << (SHIFT - 1);

        if a.abs() > b.abs() {
            Self {
                x: x as i64,
                y: ((y as i64) << SHIFT) + half,
                dx: if a > 0.0 { 1 } else { -1 },
                dy: (b * one / a.abs()).round() as i64,
                major_x: true,
            }
        } else {
            Self {
                x: ((x as i64) << SHIFT) + half,
                y: y as i64,
                dx: (a * one / b.abs()).round() as i64,
                dy: if b > 0.0 { 1 } else { -1 },
                major_x: false,
            }
        }
    }

    fn reversed(self) -> Self {
        Self {
            dx: -self.dx,
            dy: -self.dy,
            ..self
        }
    }

    fn pixel(&self) -> (i32, i32) {
        if self.major_x {
            (self.x as i32, (self.y >> SHIFT) as i32)
        } else {
            ((self.x >> SHIFT) as i32, self.y as i32)
        }
    }

    fn advance(&mut self) {
        self.x += self.dx;
        self.y += self.dy;
    }
}

/// Detect line segments in an edge map (non-zero pixels are edges)
pub fn detect_segments(edges: &GrayImage, params: &HoughParams) -> Vec<LineSegment> {
    let (width, height) = (edges.width() as i32, edges.height() as i32);
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let threshold = params.threshold as i32;
    let min_length = params.min_line_length as i32;
    let max_gap = params.max_line_gap as i32;

    let mut accumulator = Accumulator::new(width, height, params);
    let mut mask: Vec<bool> = edges.as_raw().iter().map(|&v| v > 0).collect();
    let mut points: Vec<(i32, i32)> = edges
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] > 0)
        .map(|(x, y, _)| (x as i32, y as i32))
        .collect();

    let index = |x: i32, y: i32| (y * width + x) as usize;
    let inside = |(x, y): (i32, i32)| x >= 0 && x < width && y >= 0 && y < height;

    let mut order = VisitOrder(ORDER_SEED);
    let mut segments = Vec::new();
    let mut remaining = points.len();

    while remaining > 0 {
        let pick = order.below(remaining);
        let (px, py) = points[pick];
        points.swap(pick, remaining - 1);
        remaining -= 1;

        // Already consumed by an earlier segment
        if !mask[index(px, py)] {
            continue;
        }

        let (best_angle, votes) = accumulator.vote(px, py);
        if votes < threshold {
            continue;
        }

        let (cos, sin) = accumulator.trig[best_angle];
        let forward = Walk::from_point(px, py, cos, sin);
        let walks = [forward, forward.reversed()];

        // Find how far the line extends each way, bridging short gaps
        let mut ends = [(px, py); 2];
        for (end, start) in ends.iter_mut().zip(walks) {
            let mut walk = start;
            let mut gap = 0;
            loop {
                let p = walk.pixel();
                if !inside(p) {
                    break;
                }
                if mask[index(p.0, p.1)] {
                    gap = 0;
                    *end = p;
                } else {
                    gap += 1;
                    if gap > max_gap {
                        break;
                    }
                }
                walk.advance();
            }
        }

        let long_enough = (ends[1].0 - ends[0].0).abs() >= min_length
            || (ends[1].1 - ends[0].1).abs() >= min_length;

        // Consume the walked points; a kept segment also gives its votes back
        for (end, start) in ends.iter().zip(walks) {
            let mut walk = start;
            loop {
                let p = walk.pixel();
                if !inside(p) {
                    break;
                }
                let i = index(p.0, p.1);
                if mask[i] {
                    if long_enough {
                        accumulator.withdraw(p.0, p.1);
                    }
                    mask[i] = false;
                }
                if p == *end {
                    break;
                }
                walk.advance();
            }
        }

        if long_enough {
            segments.push(LineSegment {
                x1: ends[0].0,
                y1: ends[0].1,
                x2: ends[1].0,
                y2: ends[1].1,
            });
        }
    }

    segments
}
