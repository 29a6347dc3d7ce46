//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - merit-order steps: `-` (offer price) and `|` (jump to the next offer)
//! - optional clearing point: `X`

use crate::clearing::{ClearingPoint, MeritOrderCurve};

/// Render the step curve of price against cumulative volume.
pub fn render_merit_order(
    curve: &MeritOrderCurve,
    clearing: Option<ClearingPoint>,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let x_max = curve.total_volume();
    let (x_min, x_max) = if x_max > 0.0 { (0.0, x_max) } else { (0.0, 1.0) };
    let (y_min, y_max) = price_range(curve).unwrap_or_else(|| {
        let p = curve.min_price();
        (p - 1.0, p + 1.0)
    });
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];
    let map = |x: f64, y: f64| {
        (
            map_x(x, x_min, x_max, width),
            map_y(y, y_min, y_max, height),
        )
    };

    let mut prev_volume = 0.0;
    let mut prev_cell: Option<(usize, usize)> = None;
    for step in curve.steps() {
        let start = map(prev_volume, step.price);
        let end = map(step.cumulative_volume, step.price);
        match prev_cell {
            Some(p) => draw_line(&mut grid, p.0, p.1, start.0, start.1, '|'),
            None => grid[start.1][start.0] = '-',
        }
        draw_line(&mut grid, start.0, start.1, end.0, end.1, '-');
        prev_cell = Some(end);
        prev_volume = step.cumulative_volume;
    }

    if let Some(point) = clearing {
        let (x, y) = map(point.demand, point.price);
        grid[y][x] = 'X';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Merit order {} | volume=[{x_min:.1}, {x_max:.1}] MW | price=[{y_min:.2}, {y_max:.2}] $/MWh\n",
        curve.interval_start().format("%Y-%m-%d %H:%M"),
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    if let Some(point) = clearing {
        out.push_str(&format!(
            "X = clearing point ({} MW at {} $/MWh)\n",
            point.demand, point.price
        ));
    }

    out
}

fn price_range(curve: &MeritOrderCurve) -> Option<(f64, f64)> {
    let (min_y, max_y) = (curve.min_price(), curve.max_price());
    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham-ish). Only fills empty cells.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
