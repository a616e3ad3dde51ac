use crate::model::{Axis, State};
use crate::pipeline::Artifacts;
use crate::render::{canvas_to_cells, draw_text, CellBuffer, Pixel, PixelCanvas};
use crossterm::style::Color;

// matplotlib's default cycle, first two entries
pub(crate) const C0: Pixel = Pixel::rgb(0x1f, 0x77, 0xb4);
pub(crate) const C1: Pixel = Pixel::rgb(0xff, 0x7f, 0x0e);
const AXIS: Pixel = Pixel::rgb(110, 110, 110);

const LORENZ_TITLE: &str = "Lorenz Attractor";
const LOGISTIC_TITLE: &str = "Logistic Map Output Influenced by Lorenz Attractor";
const LEGEND: &str = "Logistic Map Sequence";

/// Pixel rectangle on the braille canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Viewport {
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) w: i32,
    pub(crate) h: i32,
}

impl Viewport {
    fn from_cells(x: u16, y: u16, w: u16, h: u16) -> Self {
        Self {
            x: x as i32 * 2,
            y: y as i32 * 4,
            w: w as i32 * 2,
            h: h as i32 * 4,
        }
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, (px, py): (i32, i32)) -> bool {
        px >= self.x && px < self.x + self.w && py >= self.y && py < self.y + self.h
    }
}

/// Fixed orthographic camera, angles in degrees.
#[derive(Clone, Copy, Debug)]
pub(crate) struct View {
    pub(crate) azim: f64,
    pub(crate) elev: f64,
}

impl Default for View {
    fn default() -> Self {
        Self {
            azim: -60.0,
            elev: 30.0,
        }
    }
}

impl View {
    /// Screen coordinates (right, up) of a point in data space.
    pub(crate) fn project(&self, p: &State) -> (f64, f64) {
        let (sa, ca) = self.azim.to_radians().sin_cos();
        let (se, ce) = self.elev.to_radians().sin_cos();
        let right = -p[0] * sa + p[1] * ca;
        let up = -se * (p[0] * ca + p[1] * sa) + ce * p[2];
        (right, up)
    }
}

fn bounds(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return None;
    }
    if hi - lo < 1e-12 * hi.abs().max(1.0) {
        return Some((lo - 0.5, hi + 0.5));
    }
    Some((lo, hi))
}

/// Affine map from data bounds into a viewport, y pointing up.
struct Fit {
    x_min: f64,
    y_min: f64,
    sx: f64,
    sy: f64,
    ox: f64,
    oy: f64,
}

impl Fit {
    fn new(xb: (f64, f64), yb: (f64, f64), vp: Viewport, keep_aspect: bool) -> Self {
        let span_w = (vp.w - 1).max(0) as f64;
        let span_h = (vp.h - 1).max(0) as f64;
        let mut sx = span_w / (xb.1 - xb.0);
        let mut sy = span_h / (yb.1 - yb.0);
        if keep_aspect {
            let s = sx.min(sy);
            sx = s;
            sy = s;
        }
        let pad_x = (span_w - sx * (xb.1 - xb.0)) / 2.0;
        let pad_y = (span_h - sy * (yb.1 - yb.0)) / 2.0;
        Self {
            x_min: xb.0,
            y_min: yb.0,
            sx,
            sy,
            ox: vp.x as f64 + pad_x,
            oy: (vp.y + vp.h - 1) as f64 - pad_y,
        }
    }

    fn to_px(&self, x: f64, y: f64) -> (i32, i32) {
        let px = self.ox + (x - self.x_min) * self.sx;
        let py = self.oy - (y - self.y_min) * self.sy;
        (px.round() as i32, py.round() as i32)
    }
}

fn polyline(
    canvas: &mut PixelCanvas,
    fit: &Fit,
    pts: impl IntoIterator<Item = (f64, f64)>,
    ink: Pixel,
) {
    let mut last: Option<(i32, i32)> = None;
    for (x, y) in pts {
        if !(x.is_finite() && y.is_finite()) {
            last = None;
            continue;
        }
        let p = fit.to_px(x, y);
        match last {
            Some(q) => canvas.line(q, p, ink),
            None => canvas.plot(p.0, p.1, ink),
        }
        last = Some(p);
    }
}

/// Projected 3D line through the coordinate series, aspect preserved.
pub(crate) fn draw_attractor(
    canvas: &mut PixelCanvas,
    xyz: [&[f64]; 3],
    vp: Viewport,
    view: View,
) {
    let [xs, ys, zs] = xyz;
    let pts: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .zip(zs)
        .map(|((&x, &y), &z)| view.project(&[x, y, z]))
        .collect();
    let xb = bounds(pts.iter().map(|p| p.0));
    let yb = bounds(pts.iter().map(|p| p.1));
    let (Some(xb), Some(yb)) = (xb, yb) else {
        return;
    };
    let fit = Fit::new(xb, yb, vp, true);
    polyline(canvas, &fit, pts, C0);
}

/// Line plot of `values` against their index. Returns the y range used.
pub(crate) fn draw_series(
    canvas: &mut PixelCanvas,
    values: &[f64],
    vp: Viewport,
) -> Option<(f64, f64)> {
    let yb = bounds(values.iter().copied())?;
    let xb = if values.len() > 1 {
        (0.0, (values.len() - 1) as f64)
    } else {
        (-0.5, 0.5)
    };
    let fit = Fit::new(xb, yb, vp, false);

    // axes: left and bottom edges
    let (l, b) = (vp.x - 1, vp.y + vp.h);
    canvas.line((l, vp.y), (l, b), AXIS);
    canvas.line((l, b), (vp.x + vp.w - 1, b), AXIS);

    polyline(
        canvas,
        &fit,
        values.iter().enumerate().map(|(i, &v)| (i as f64, v)),
        C1,
    );
    Some(yb)
}

fn fmt_tick(v: f64) -> String {
    if v != 0.0 && (v.abs() >= 1e4 || v.abs() < 1e-2) {
        format!("{v:.2e}")
    } else {
        let s = format!("{v:.3}");
        let s = s.trim_end_matches('0').trim_end_matches('.');
        s.to_string()
    }
}

fn centered(buf: &mut CellBuffer, x0: u16, w: u16, y: u16, s: &str, fg: Color, bold: bool) {
    let text: String = s.chars().take(w as usize).collect();
    let len = text.chars().count() as u16;
    draw_text(buf, x0 + (w - len) / 2, y, &text, fg, bold);
}

fn to_color(p: Pixel) -> Color {
    Color::Rgb { r: p.r, g: p.g, b: p.b }
}

/// Lays out both plots on the canvas and overlays titles, ticks and the legend.
pub(crate) fn compose(cells: &mut CellBuffer, canvas: &mut PixelCanvas, art: &Artifacts) {
    let bg = Color::Black;
    cells.clear(bg);
    canvas.clear(Pixel::default());

    let (cols, rows) = (cells.w, cells.h);
    if cols < 40 || rows < 8 {
        draw_text(cells, 0, 0, "terminal too small", Color::White, false);
        return;
    }

    let half = cols / 2;
    let right_w = cols - half;

    // left: attractor
    let left_vp = Viewport::from_cells(1, 1, half - 2, rows - 2);
    let xs = art.trajectory.axis_series(Axis::X);
    let ys = art.trajectory.axis_series(Axis::Y);
    let zs = art.trajectory.axis_series(Axis::Z);
    draw_attractor(canvas, [&xs, &ys, &zs], left_vp, View::default());

    // right: logistic series, with a label column and tick row
    let y_label_w = 2u16;
    let ticks_w = bounds(art.logistic.iter().copied())
        .map(|(lo, hi)| fmt_tick(lo).len().max(fmt_tick(hi).len()))
        .unwrap_or(1) as u16;
    let plot_x = half + y_label_w + ticks_w + 1;
    let plot_w = (cols - 1).saturating_sub(plot_x).max(1);
    let plot_y = 2;
    let plot_h = rows.saturating_sub(plot_y + 3).max(1);
    let right_vp = Viewport::from_cells(plot_x, plot_y, plot_w, plot_h);
    let y_range = draw_series(canvas, &art.logistic, right_vp);

    canvas_to_cells(canvas, cells, bg);

    let white = Color::White;
    let grey = to_color(AXIS);
    centered(cells, 0, half, 0, LORENZ_TITLE, white, true);
    centered(cells, half, right_w, 0, LOGISTIC_TITLE, white, true);

    let st = art.trajectory.stats();
    let ts = art.trajectory.times();
    let info = format!(
        "t in [{}, {}]  steps {}  rejected {}",
        fmt_tick(ts[0]),
        fmt_tick(ts[ts.len() - 1]),
        st.steps,
        st.rejected
    );
    draw_text(cells, 1, rows - 1, &info, grey, false);

    // legend
    let legend = format!("── {LEGEND}");
    let lx = (cols - 1).saturating_sub(legend.chars().count() as u16);
    draw_text(cells, lx, 1, "──", to_color(C1), false);
    draw_text(cells, lx + 3, 1, LEGEND, white, false);

    if let Some((lo, hi)) = y_range {
        let hi_s = fmt_tick(hi);
        let lo_s = fmt_tick(lo);
        let tick_x = |s: &str| plot_x - 1 - s.len() as u16;
        draw_text(cells, tick_x(&hi_s), plot_y, &hi_s, grey, false);
        draw_text(cells, tick_x(&lo_s), plot_y + plot_h - 1, &lo_s, grey, false);
    }
    draw_text(cells, half, plot_y + plot_h / 2, "x_n", white, false);

    let tick_row = plot_y + plot_h;
    draw_text(cells, plot_x, tick_row, "0", grey, false);
    let last = art.logistic.len().saturating_sub(1).to_string();
    let last_x = (plot_x + plot_w).saturating_sub(last.len() as u16);
    draw_text(cells, last_x, tick_row, &last, grey, false);
    centered(cells, plot_x, plot_w, tick_row + 1, "Iteration", white, false);

    draw_text(cells, (cols - 1).saturating_sub(10), rows - 1, "q to close", grey, false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::pipeline;

    fn inked(canvas: &PixelCanvas) -> Vec<(i32, i32)> {
        let mut out = Vec::new();
        for y in 0..canvas.h {
            for x in 0..canvas.w {
                if canvas.px[canvas.idx(x, y)].a > 0 {
                    out.push((x as i32, y as i32));
                }
            }
        }
        out
    }

    #[test]
    fn projection_axes() {
        let v = View { azim: 0.0, elev: 0.0 };
        // looking along +x: y goes right, z goes up
        let (r, u) = v.project(&[5.0, 2.0, 3.0]);
        assert!((r - 2.0).abs() < 1e-12);
        assert!((u - 3.0).abs() < 1e-12);

        let top = View { azim: 0.0, elev: 90.0 };
        let (_, u) = top.project(&[0.0, 0.0, 7.0]);
        assert!(u.abs() < 1e-12);
    }

    #[test]
    fn attractor_stays_inside_its_viewport() {
        let settings = Settings {
            t_span: (0.0, 20.0),
            ..Settings::default()
        };
        let art = pipeline::run(&settings).unwrap();
        let mut canvas = PixelCanvas::new(200, 120);
        let vp = Viewport {
            x: 10,
            y: 8,
            w: 80,
            h: 100,
        };
        let tr = &art.trajectory;
        let xs = tr.axis_series(Axis::X);
        let ys = tr.axis_series(Axis::Y);
        let zs = tr.axis_series(Axis::Z);
        draw_attractor(&mut canvas, [&xs, &ys, &zs], vp, View::default());
        let ink = inked(&canvas);
        assert!(ink.len() > 100);
        assert!(ink.iter().all(|p| vp.contains(*p)));
    }

    #[test]
    fn series_spans_the_viewport() {
        let mut canvas = PixelCanvas::new(64, 40);
        let vp = Viewport {
            x: 4,
            y: 4,
            w: 50,
            h: 30,
        };
        let values = [0.0, 1.0, 0.5, f64::NAN, 0.25];
        let yb = draw_series(&mut canvas, &values, vp).unwrap();
        assert_eq!(yb, (0.0, 1.0));
        let c1: Vec<_> = inked(&canvas)
            .into_iter()
            .filter(|&(x, y)| canvas.px[canvas.idx(x as u32, y as u32)] == C1)
            .collect();
        assert!(c1.iter().all(|p| vp.contains(*p)));
        // first point bottom-left, last point at the right edge
        assert!(c1.contains(&(4, 33)));
        assert!(c1.iter().any(|&(x, _)| x == 53));
    }

    #[test]
    fn flat_and_empty_series() {
        let mut canvas = PixelCanvas::new(20, 20);
        let vp = Viewport {
            x: 2,
            y: 2,
            w: 10,
            h: 10,
        };
        assert_eq!(draw_series(&mut canvas, &[], vp), None);
        assert_eq!(draw_series(&mut canvas, &[0.975; 5], vp), Some((0.475, 1.475)));
    }

    #[test]
    fn tick_formatting() {
        assert_eq!(fmt_tick(0.0), "0");
        assert_eq!(fmt_tick(0.975), "0.975");
        assert_eq!(fmt_tick(100.0), "100");
        assert_eq!(fmt_tick(-1333.25), "-1333.25");
        assert_eq!(fmt_tick(123456.0), "1.23e5");
    }

    #[test]
    fn compose_writes_titles_and_legend() {
        let settings = Settings {
            t_span: (0.0, 10.0),
            samples: 50,
            ..Settings::default()
        };
        let art = pipeline::run(&settings).unwrap();
        let mut cells = CellBuffer::new(120, 30);
        let mut canvas = PixelCanvas::new(240, 120);
        compose(&mut cells, &mut canvas, &art);

        let row = |y: u16| -> String {
            (0..cells.w).map(|x| cells.get(x, y).unwrap().ch).collect()
        };
        assert!(row(0).contains(LORENZ_TITLE));
        assert!(row(0).contains(LOGISTIC_TITLE));
        assert!(row(1).contains(LEGEND));
        assert!(row(29).contains("q to close"));
        assert!((0..30).any(|y| row(y).contains("Iteration")));
        assert!((0..30).any(|y| row(y).contains("50")));
        // some braille ink landed in both halves
        let braille = |x: u16, y: u16| {
            matches!(cells.get(x, y).map(|c| c.ch as u32), Some(0x2801..=0x28FF))
        };
        assert!((1..29).any(|y| (0..60).any(|x| braille(x, y))));
        assert!((1..29).any(|y| (60..120).any(|x| braille(x, y))));
    }

    #[test]
    fn tiny_terminal_gets_a_notice() {
        let art = pipeline::run(&Settings {
            t_span: (0.0, 1.0),
            samples: 3,
            ..Settings::default()
        })
        .unwrap();
        let mut cells = CellBuffer::new(20, 5);
        let mut canvas = PixelCanvas::new(40, 20);
        compose(&mut cells, &mut canvas, &art);
        assert_eq!(cells.get(0, 0).unwrap().ch, 't');
    }
}
