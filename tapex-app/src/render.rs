use std::collections::HashMap;
use std::f32::consts::{FRAC_PI_2, TAU};
use std::path::Path;

use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
use anyhow::{Context, Result, anyhow, bail};
use tapex_core::{MicroStep, Stage};
use tapex_sequencer::{ExportOutcome, SessionView};
use tiny_skia::{
    Color, FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, PremultipliedColorU8, Rect, Stroke,
    Transform,
};

type Rgb = [u8; 3];

const BACKGROUND: Rgb = [243, 244, 246];
const INK: Rgb = [31, 41, 55];
const MUTED: Rgb = [156, 163, 175];
const ACCENT: Rgb = [22, 163, 74];
const WARNING: Rgb = [217, 119, 6];

/// Rasterizes a line of text onto a transparent pixmap sized to its bounds.
pub fn render_text_pixmap(font: &FontVec, text: &str, font_size: f32, rgb: Rgb) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    let mut pen_x = 0.0f32;
    let mut glyphs: Vec<Glyph> = Vec::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    let (min_x, min_y, max_x, max_y) = outlines.iter().fold(
        (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        |(x0, y0, x1, y1), o| {
            let b = o.px_bounds();
            (x0.min(b.min.x), y0.min(b.min.y), x1.max(b.max.x), y1.max(b.max.y))
        },
    );
    if outlines.is_empty() {
        return None;
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize;
    let dst = pm.pixels_mut();

    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            let px = (x as f32 + b.min.x - min_x).floor() as i64;
            let py = (y as f32 + b.min.y - min_y).floor() as i64;
            if px < 0 || py < 0 || px >= w as i64 || py >= h as i64 {
                return;
            }
            let i = py as usize * stride + px as usize;
            let a = cov.clamp(0.0, 1.0).max(dst[i].alpha() as f32 / 255.0);
            let premul = |c: u8| (c as f32 * a) as u8;
            if let Some(color) = PremultipliedColorU8::from_rgba(
                premul(rgb[0]),
                premul(rgb[1]),
                premul(rgb[2]),
                (a * 255.0) as u8,
            ) {
                dst[i] = color;
            }
        });
    }
    Some(pm)
}

/// Draws a [`SessionView`] into an RGBA frame. Holds no session state, only
/// the canvas and a cache of rasterized labels.
pub struct SceneRenderer {
    canvas: Pixmap,
    font: Option<FontVec>,
    text_cache: HashMap<(String, u32, Rgb), Pixmap>,
}

impl SceneRenderer {
    pub fn new(width: u32, height: u32, font: Option<FontVec>) -> Result<Self> {
        let canvas = Pixmap::new(width, height)
            .ok_or_else(|| anyhow!("cannot allocate {width}x{height} canvas"))?;
        Ok(Self {
            canvas,
            font,
            text_cache: HashMap::new(),
        })
    }

    pub fn load_font(path: &Path) -> Result<FontVec> {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
        FontVec::try_from_vec(bytes).map_err(|e| anyhow!("invalid font {}: {e}", path.display()))
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.canvas = Pixmap::new(width, height)
            .ok_or_else(|| anyhow!("cannot allocate {width}x{height} canvas"))?;
        Ok(())
    }

    pub fn width(&self) -> f32 {
        self.canvas.width() as f32
    }

    pub fn height(&self) -> f32 {
        self.canvas.height() as f32
    }

    pub fn render(&mut self, view: &SessionView, frame: &mut [u8]) -> Result<()> {
        self.draw(view);
        let data = self.canvas.data();
        if frame.len() != data.len() {
            bail!(
                "frame holds {} bytes, canvas {}",
                frame.len(),
                data.len()
            );
        }
        frame.copy_from_slice(data);
        Ok(())
    }

    pub fn draw(&mut self, view: &SessionView) {
        self.canvas.fill(color(BACKGROUND));
        match view.stage {
            Stage::Start => self.draw_start(view),
            Stage::Running => self.draw_running(view),
            Stage::End => self.draw_end(view),
        }
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    fn draw_start(&mut self, view: &SessionView) {
        let (w, h) = (self.width(), self.height());
        let r = w.min(h) * 0.12;
        self.text(&view.headline(), 44.0, (w * 0.5, h * 0.22), INK);
        self.circle((w * 0.5, h * 0.5), r, INK);
        if view.previewing {
            self.ring((w * 0.5, h * 0.5), r * 1.35, 6.0, ACCENT);
        }
        self.text(&view.prompt(), 26.0, (w * 0.5, h * 0.8), INK);
    }

    fn draw_running(&mut self, view: &SessionView) {
        let (w, h) = (self.width(), self.height());

        for i in 0..view.run_count {
            let center = (40.0 + i as f32 * 28.0, 40.0);
            if i < view.run {
                self.circle(center, 9.0, INK);
            } else {
                self.ring(center, 9.0, 2.0, MUTED);
            }
        }
        self.text(&view.headline(), 26.0, (w * 0.5, 40.0), INK);

        let size = 28.0;
        let gap = 16.0;
        let row = view.condition_count as f32 * (size + gap) - gap;
        for i in 0..view.condition_count {
            let x = (w - row) * 0.5 + i as f32 * (size + gap);
            let fill = match (i + 1 == view.condition, view.recording) {
                (true, true) => ACCENT,
                (true, false) => INK,
                (false, _) => MUTED,
            };
            self.rect(x, h * 0.2, size, size, fill);
        }
        if let Some(label) = view.excerpt_label() {
            self.text(&label, 34.0, (w * 0.5, h * 0.3), INK);
        }

        let center = (w * 0.5, h * 0.55);
        let r = w.min(h) * 0.14;
        match view.step {
            Some(MicroStep::Phrase) => {
                self.circle(center, r, ACCENT);
                let bar = (view.taps_in_trial.min(60) as f32 / 60.0) * w * 0.5;
                self.rect(w * 0.25, h * 0.55 + r * 1.3, bar, 8.0, INK);
            }
            Some(_) => {
                self.ring(center, r, 8.0, INK);
                let n = view.countdown.min(12);
                for i in 0..n {
                    let angle = TAU * i as f32 / 12.0 - FRAC_PI_2;
                    let dot = (
                        center.0 + angle.cos() * r * 0.7,
                        center.1 + angle.sin() * r * 0.7,
                    );
                    self.circle(dot, r * 0.08, INK);
                }
                self.text(&view.countdown.to_string(), 64.0, center, INK);
            }
            None => {}
        }
        self.text(&view.prompt(), 28.0, (w * 0.5, h * 0.85), INK);
    }

    fn draw_end(&mut self, view: &SessionView) {
        let (w, h) = (self.width(), self.height());
        let tint = match &view.export {
            Some(ExportOutcome::Delivered { .. }) => ACCENT,
            Some(ExportOutcome::Pending { .. }) => MUTED,
            _ => WARNING,
        };
        let s = w.min(h) * 0.1;
        let (cx, cy) = (w * 0.5, h * 0.45);
        let mut pb = PathBuilder::new();
        pb.move_to(cx - s, cy);
        pb.line_to(cx - s * 0.3, cy + s * 0.7);
        pb.line_to(cx + s, cy - s * 0.7);
        if let Some(path) = pb.finish() {
            let stroke = Stroke {
                width: s * 0.25,
                ..Stroke::default()
            };
            self.canvas
                .stroke_path(&path, &paint(tint), &stroke, Transform::identity(), None);
        }
        self.text(&view.headline(), 28.0, (w * 0.5, h * 0.2), INK);
        self.text(&view.prompt(), 28.0, (w * 0.5, h * 0.27), INK);
        self.text(
            "Press S to save a copy, ENTER for a new session, ESC to quit",
            20.0,
            (w * 0.5, h * 0.8),
            MUTED,
        );
    }

    fn circle(&mut self, (cx, cy): (f32, f32), r: f32, rgb: Rgb) {
        if let Some(path) = PathBuilder::from_circle(cx, cy, r) {
            self.canvas.fill_path(
                &path,
                &paint(rgb),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    fn ring(&mut self, (cx, cy): (f32, f32), r: f32, width: f32, rgb: Rgb) {
        if let Some(path) = PathBuilder::from_circle(cx, cy, r) {
            let stroke = Stroke {
                width,
                ..Stroke::default()
            };
            self.canvas
                .stroke_path(&path, &paint(rgb), &stroke, Transform::identity(), None);
        }
    }

    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, rgb: Rgb) {
        if let Some(rect) = Rect::from_xywh(x, y, w, h) {
            self.canvas
                .fill_rect(rect, &paint(rgb), Transform::identity(), None);
        }
    }

    /// Centered label; skipped when no font is configured.
    fn text(&mut self, text: &str, size: f32, (cx, cy): (f32, f32), rgb: Rgb) {
        let Some(font) = &self.font else {
            return;
        };
        let key = (text.to_string(), size as u32, rgb);
        if !self.text_cache.contains_key(&key) {
            let Some(pm) = render_text_pixmap(font, text, size, rgb) else {
                return;
            };
            self.text_cache.insert(key.clone(), pm);
        }
        if let Some(pm) = self.text_cache.get(&key) {
            let x = (cx - pm.width() as f32 * 0.5) as i32;
            let y = (cy - pm.height() as f32 * 0.5) as i32;
            self.canvas.draw_pixmap(
                x,
                y,
                pm.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
        }
    }
}

fn color(rgb: Rgb) -> Color {
    Color::from_rgba8(rgb[0], rgb[1], rgb[2], 255)
}

fn paint(rgb: Rgb) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgb[0], rgb[1], rgb[2], 255);
    paint.anti_alias = true;
    paint
}
