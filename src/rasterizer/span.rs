//! Scanline span building
//!
//! Finds the top of the vertex loop, works out which way round the loop is
//! the left side, walks both sides with an `EdgeWalker` and pairs the
//! results row by row into clipped spans.
//!
//! Fill convention: the top row is never drawn, flat or pointed, nor is the
//! bottom row, and right edges are walked one pixel in. A polygon of height
//! `h` yields at most `h - 1` rows.
//!
//! One span per scanline: loops must be y-monotone (every row crosses the
//! outline at most twice). A notch in a concave loop that is not y-monotone
//! gets filled in.

use tracing::warn;

use super::edge::EdgeWalker;
use super::types::{Channels, EdgeSample, RasterError, Span, SpanList, Vertex4, Window};

/// Direction of travel around a vertex loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Next index around a loop of `len` vertices
pub fn index_forward(i: usize, len: usize) -> usize {
    (i + 1) % len
}

/// Previous index around a loop of `len` vertices
pub fn index_backward(i: usize, len: usize) -> usize {
    (i + len - 1) % len
}

pub fn index_move(i: usize, dir: Direction, len: usize) -> usize {
    match dir {
        Direction::Forward => index_forward(i, len),
        Direction::Backward => index_backward(i, len),
    }
}

impl SpanList {
    /// Scan-convert the loop `indices` (into `vertices`) into spans clipped
    /// to `window`. `x_offset`/`y_offset` translate the polygon.
    ///
    /// Degenerate input (empty loop, zero height, bad index, everything
    /// clipped) gives an empty list. Only allocation failure is an error.
    pub fn build(
        vertices: &[Vertex4],
        indices: &[usize],
        window: &Window,
        x_offset: i32,
        y_offset: i32,
        channels: Channels,
    ) -> Result<SpanList, RasterError> {
        let n = indices.len();
        if n == 0 {
            return Ok(SpanList::default());
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= vertices.len()) {
            warn!(index = bad, vertices = vertices.len(), "polygon references a missing vertex");
            return Ok(SpanList::default());
        }

        let v = |i: usize| &vertices[indices[i]];
        let x = |i: usize| v(i).x.to_int();
        let y = |i: usize| v(i).y.to_int();

        // Top and bottom vertices
        let mut min_l = 0;
        let mut max_index = 0;
        let mut min_y = y(0);
        let mut max_y = min_y;
        for i in 1..n {
            if y(i) < min_y {
                min_y = y(i);
                min_l = i;
            } else if y(i) > max_y {
                max_y = y(i);
                max_index = i;
            }
        }
        if min_y == max_y {
            return Ok(SpanList::default());
        }

        // Bracket the run of vertices sharing the top row
        let mut min_r = min_l;
        while y(min_r) == min_y {
            min_r = index_forward(min_r, n);
        }
        min_r = index_backward(min_r, n);
        while y(min_l) == min_y {
            min_l = index_backward(min_l, n);
        }
        min_l = index_forward(min_l, n);

        let mut left_dir = Direction::Backward;
        let top_is_flat = x(min_l) != x(min_r);
        if top_is_flat {
            if x(min_l) > x(min_r) {
                left_dir = Direction::Forward;
                std::mem::swap(&mut min_l, &mut min_r);
            }
        } else {
            // Sign of the cross product of the two edges leaving the apex
            let next = index_forward(min_r, n);
            let prev = index_backward(min_l, n);
            let dxn = (x(next) - x(min_l)) as i64;
            let dyn_ = (y(next) - y(min_l)) as i64;
            let dxp = (x(prev) - x(min_l)) as i64;
            let dyp = (y(prev) - y(min_l)) as i64;
            if dxn * dyp - dyn_ * dxp < 0 {
                left_dir = Direction::Forward;
                std::mem::swap(&mut min_l, &mut min_r);
            }
        }

        let length = max_y - min_y - 1;
        if length <= 0 {
            return Ok(SpanList::default());
        }
        let length = length as usize;
        let y_start = y_offset + min_y + 1;

        let walk = |start: usize, dir: Direction, x_bias: i32, out: &mut Vec<EdgeSample>| {
            let mut prev = start;
            let mut current = start;
            // The top row belongs to whatever sits above
            let mut skip_first = true;
            loop {
                current = index_move(current, dir, n);
                let edge = EdgeWalker::new(v(prev), v(current), x_bias, skip_first, channels);
                for sample in edge {
                    if out.len() == length {
                        break;
                    }
                    out.push(sample);
                }
                prev = current;
                skip_first = false;
                if current == max_index {
                    break;
                }
            }
        };

        let mut left = Vec::new();
        left.try_reserve_exact(length)?;
        let mut right = Vec::new();
        right.try_reserve_exact(length)?;
        walk(min_l, left_dir, x_offset, &mut left);
        walk(min_r, left_dir.reverse(), x_offset - 1, &mut right);

        let mut list = SpanList { y_start, spans: Vec::new() };
        list.spans.try_reserve_exact(length)?;

        for (l, r) in left.iter().zip(right.iter()) {
            // Chains of a non-monotone loop can drift apart
            if l.y != r.y {
                continue;
            }
            let row = l.y + y_offset;
            if row < window.y0 || row > window.y1 {
                continue;
            }

            let (mut l, mut r) = (*l, *r);
            // Right edges sit one pixel in, so this is an empty run
            if l.x == r.x + 1 {
                continue;
            }
            if l.x > r.x {
                std::mem::swap(&mut l, &mut r);
            }

            let x_start = l.x.max(window.x0);
            let x_end = r.x.min(window.x1);
            if x_start > x_end {
                continue;
            }
            l.y = row;
            r.y = row;
            list.spans.push(Span { y: row, x_start, x_end, left: l, right: r });
        }

        if let Some(first) = list.spans.first() {
            list.y_start = first.y;
        }
        Ok(list)
    }
}
