use std::mem;
use std::time::Duration;

use ab_glyph::FontArc;
use anyhow::{Result, anyhow, bail};
use bytemuck::{cast_slice, cast_slice_mut};
use micue_core::CuePhase;
use micue_timing::{FrameTimes, FrameTimingStats, Timer};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};
use tracing::debug;

use crate::scene::Scene;
use crate::text::{TextCache, TextStyle};

type Rgba = [u8; 4];

const BLACK: Rgba = [0, 0, 0, 255];
const WHITE: Rgba = [255, 255, 255, 255];
const TRACK: Rgba = [50, 50, 50, 255];
const DIM: Rgba = [70, 70, 70, 255];
const CALM: Rgba = [100, 149, 237, 255];
/// Anti-aliased edges bleed past a shape's geometric bounds.
const DIRTY_PAD: f32 = 2.0;

#[repr(usize)]
#[derive(Debug, Clone, Copy)]
enum CacheIndex {
    Blink = 0,
    Left = 1,
    Right = 2,
    Rest = 3,
    Fixation = 4,
}

impl CacheIndex {
    fn for_phase(phase: CuePhase) -> Self {
        match phase {
            CuePhase::Blink => CacheIndex::Blink,
            CuePhase::Left => CacheIndex::Left,
            CuePhase::Right => CacheIndex::Right,
            CuePhase::Rest => CacheIndex::Rest,
        }
    }
}

pub fn phase_color(phase: CuePhase) -> Rgba {
    match phase {
        CuePhase::Blink => [255, 214, 0, 255],
        CuePhase::Left => [66, 135, 245, 255],
        CuePhase::Right => [245, 130, 48, 255],
        CuePhase::Rest => [60, 180, 75, 255],
    }
}

fn solid(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(Color::from_rgba8(color[0], color[1], color[2], color[3]));
    paint
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub clear: Duration,
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub dirty_count: usize,
}

/// CPU renderer: draws into an offscreen canvas and copies only the regions
/// touched this frame or the last into the presented frame buffer.
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),
    cue_size: f32,

    static_cache: Vec<Pixmap>,
    text_cache: Option<TextCache>,

    canvas: Pixmap,
    dirty_regions: Vec<Rect>,
    first_frame: bool,

    draw_times: FrameTimes,
    total_times: FrameTimes,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32, font: Option<FontArc>) -> Result<Self> {
        if font.is_none() {
            debug!("no font loaded; only shapes will be drawn");
        }
        let mut renderer = SkiaRenderer {
            width,
            height,
            center: (width as f32 / 2.0, height as f32 / 2.0),
            cue_size: cue_size(width, height),
            static_cache: Vec::new(),
            text_cache: font.map(TextCache::new),
            canvas: opaque_canvas(width, height)?,
            dirty_regions: Vec::with_capacity(16),
            first_frame: true,
            draw_times: FrameTimes::default(),
            total_times: FrameTimes::default(),
        };
        renderer.cache_cues()?;
        Ok(renderer)
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) -> Result<()> {
        self.width = new_width;
        self.height = new_height;
        self.center = (new_width as f32 / 2.0, new_height as f32 / 2.0);
        self.cue_size = cue_size(new_width, new_height);
        self.canvas = opaque_canvas(new_width, new_height)?;
        self.dirty_regions.clear();
        self.cache_cues()?;
        self.first_frame = true;
        debug!(width = new_width, height = new_height, "renderer resized");
        Ok(())
    }

    pub fn has_font(&self) -> bool {
        self.text_cache.is_some()
    }

    /// Time spent drawing scenes, excluding clear and copy.
    pub fn draw_stats(&self) -> FrameTimingStats {
        self.draw_times.stats()
    }

    pub fn frame_stats(&self) -> FrameTimingStats {
        self.total_times.stats()
    }

    fn cache_cues(&mut self) -> Result<()> {
        let s = self.cue_size;
        // order follows CacheIndex
        let pixmaps = [
            cue_pixmap(CuePhase::Blink, s),
            cue_pixmap(CuePhase::Left, s),
            cue_pixmap(CuePhase::Right, s),
            cue_pixmap(CuePhase::Rest, s),
            fixation_pixmap(40),
        ];
        self.static_cache = pixmaps
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| anyhow!("failed to build cue pixmaps at size {s}"))?;
        Ok(())
    }

    pub fn render_frame<T: Timer>(&mut self, scene: &Scene<'_>, frame_buffer: &mut [u8], timer: &T) -> Result<FrameStats> {
        if frame_buffer.len() != self.canvas.data().len() {
            bail!(
                "frame buffer holds {} bytes, canvas {}x{} needs {}",
                frame_buffer.len(),
                self.width,
                self.height,
                self.canvas.data().len()
            );
        }

        if self.first_frame {
            self.first_frame = false;
            self.canvas.fill(Color::BLACK);
            frame_buffer.copy_from_slice(self.canvas.data());
            self.dirty_regions.clear();
        }

        let old_dirty = mem::take(&mut self.dirty_regions);

        let t = timer.now();
        self.clear_dirty(&old_dirty);
        let t_clear = timer.elapsed(t);

        let t = timer.now();
        self.draw_scene(scene);
        let t_draw = timer.elapsed(t);

        let dirty_count = self.dirty_regions.len();
        let mut present = old_dirty;
        present.extend_from_slice(&self.dirty_regions);
        coalesce_dirty(&mut present);

        let t = timer.now();
        for rect in &present {
            self.copy_dirty_region(*rect, frame_buffer);
        }
        let t_copy = timer.elapsed(t);

        let total = t_clear + t_draw + t_copy;
        self.draw_times.push(t_draw);
        self.total_times.push(total);

        Ok(FrameStats {
            clear: t_clear,
            draw: t_draw,
            copy: t_copy,
            total,
            dirty_count,
        })
    }

    fn draw_scene(&mut self, scene: &Scene<'_>) {
        let (cx, cy) = self.center;
        let h = self.height as f32;
        match *scene {
            Scene::Welcome { subject, error } => {
                self.text("Motor Imagery Session", TextStyle::Title, (cx, h * 0.22));
                self.text("Subject ID", TextStyle::Body, (cx, cy - 64.0));
                self.stroke_box((cx, cy), self.width as f32 * 0.4, 56.0, WHITE);
                self.text(subject, TextStyle::Body, (cx, cy));
                if let Some(message) = error {
                    self.text(message, TextStyle::Error, (cx, cy + 64.0));
                }
                self.text("Type your ID and press ENTER", TextStyle::Hint, (cx, h * 0.78));
            }
            Scene::Relaxation { breath, remaining_s } => {
                let radius = self.cue_size * (0.5 + 0.5 * breath.clamp(0.0, 1.0));
                self.fill_circle(self.center, radius, CALM);
                self.text("Relax and breathe slowly", TextStyle::Title, (cx, h * 0.15));
                self.text(
                    &format!("{remaining_s}s remaining, SPACE to skip"),
                    TextStyle::Hint,
                    (cx, h * 0.85),
                );
            }
            Scene::Ready { subject } => {
                self.blit_cached(CacheIndex::Fixation, self.center);
                self.text(&format!("Subject {subject}"), TextStyle::Hint, (cx, h * 0.15));
                self.text("Press SPACE to begin", TextStyle::Body, (cx, cy + 80.0));
            }
            Scene::Cue {
                phase,
                progress,
                completed_rounds,
                max_rounds,
            } => {
                self.blit_cached(CacheIndex::for_phase(phase), self.center);
                self.text(phase.instruction(), TextStyle::Body, (cx, cy + self.cue_size * 1.3));
                self.progress_bar(progress, phase_color(phase));
                self.round_dots(completed_rounds, max_rounds);
                let round = (completed_rounds + 1).min(max_rounds);
                self.text(&format!("Round {round}/{max_rounds}"), TextStyle::Hint, (cx, 64.0));
            }
            Scene::Closing { rounds } => {
                self.text("Session complete. Thank you!", TextStyle::Title, self.center);
                self.text(
                    &format!("{rounds} rounds recorded. Press SPACE or ESC to exit"),
                    TextStyle::Hint,
                    (cx, cy + 64.0),
                );
            }
        }
    }

    fn text(&mut self, text: &str, style: TextStyle, pos: (f32, f32)) {
        let Some(cache) = self.text_cache.as_mut() else {
            return;
        };
        if let Some(pm) = cache.get_or_render(text, style) {
            if let Some(rect) = blit(&mut self.canvas, &pm, pos) {
                self.dirty_regions.push(rect);
            }
        }
    }

    fn blit_cached(&mut self, index: CacheIndex, pos: (f32, f32)) {
        let Some(src) = self.static_cache.get(index as usize) else {
            return;
        };
        if let Some(rect) = blit(&mut self.canvas, src, pos) {
            self.dirty_regions.push(rect);
        }
    }

    fn progress_bar(&mut self, progress: f32, color: Rgba) {
        let bar_w = self.width as f32 * 0.6;
        let x = (self.width as f32 - bar_w) * 0.5;
        let y = self.height as f32 * 0.82;
        self.fill_rect(x, y, bar_w, 14.0, TRACK);
        let filled = bar_w * progress.clamp(0.0, 1.0);
        if filled >= 1.0 {
            self.fill_rect(x, y, filled, 14.0, color);
        }
    }

    fn round_dots(&mut self, completed: u32, max_rounds: u32) {
        let spacing = 22.0;
        let first = self.center.0 - (max_rounds.saturating_sub(1) as f32) * spacing * 0.5;
        for i in 0..max_rounds {
            let color = if i < completed { WHITE } else { DIM };
            self.fill_circle((first + i as f32 * spacing, 30.0), 6.0, color);
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba) {
        let Some(rect) = Rect::from_xywh(x, y, w, h) else {
            return;
        };
        let mut paint = solid(color);
        paint.anti_alias = false;
        self.canvas.fill_rect(rect, &paint, Transform::identity(), None);
        self.mark_dirty(rect);
    }

    fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Rgba) {
        let Some(path) = PathBuilder::from_circle(center.0, center.1, radius) else {
            return;
        };
        self.canvas
            .fill_path(&path, &solid(color), FillRule::Winding, Transform::identity(), None);
        self.mark_dirty(path.bounds());
    }

    fn stroke_box(&mut self, center: (f32, f32), w: f32, h: f32, color: Rgba) {
        let Some(rect) = Rect::from_xywh(center.0 - w * 0.5, center.1 - h * 0.5, w, h) else {
            return;
        };
        let path = PathBuilder::from_rect(rect);
        let stroke = Stroke {
            width: 2.0,
            ..Stroke::default()
        };
        self.canvas
            .stroke_path(&path, &solid(color), &stroke, Transform::identity(), None);
        self.mark_dirty(rect);
    }

    fn mark_dirty(&mut self, rect: Rect) {
        let padded = Rect::from_ltrb(
            (rect.left() - DIRTY_PAD).floor().max(0.0),
            (rect.top() - DIRTY_PAD).floor().max(0.0),
            (rect.right() + DIRTY_PAD).ceil().min(self.width as f32),
            (rect.bottom() + DIRTY_PAD).ceil().min(self.height as f32),
        );
        if let Some(r) = padded {
            self.dirty_regions.push(r);
        }
    }

    fn clear_dirty(&mut self, dirty: &[Rect]) {
        let (w, h) = (self.width, self.height);
        let stride = w as usize;
        let pixels: &mut [Rgba] = cast_slice_mut(self.canvas.data_mut());
        for rect in dirty {
            let Some((x0, y0, x1, y1)) = pixel_bounds(*rect, w, h) else {
                continue;
            };
            for y in y0..y1 {
                pixels[y * stride + x0..y * stride + x1].fill(BLACK);
            }
        }
    }

    fn copy_dirty_region(&self, dirty: Rect, frame_buffer: &mut [u8]) {
        let Some((x0, y0, x1, y1)) = pixel_bounds(dirty, self.width, self.height) else {
            return;
        };
        let row_bytes = self.width as usize * 4;
        let canvas_data = self.canvas.data();
        for row in y0..y1 {
            let start = row * row_bytes + x0 * 4;
            let end = row * row_bytes + x1 * 4;
            frame_buffer[start..end].copy_from_slice(&canvas_data[start..end]);
        }
    }
}

fn cue_size(width: u32, height: u32) -> f32 {
    (width.min(height) as f32 * 0.18).max(8.0)
}

fn opaque_canvas(width: u32, height: u32) -> Result<Pixmap> {
    let mut canvas =
        Pixmap::new(width, height).ok_or_else(|| anyhow!("cannot allocate a {width}x{height} canvas"))?;
    canvas.fill(Color::BLACK);
    Ok(canvas)
}

/// Cue shape centered in a `2s` square: ring for BLINK, arrows for the hand
/// tasks, a block for REST.
fn cue_pixmap(phase: CuePhase, s: f32) -> Option<Pixmap> {
    let side = (s * 2.0).ceil() as u32;
    let mut pm = Pixmap::new(side, side)?;
    let paint = solid(phase_color(phase));
    let (cx, cy) = (s, s);

    match phase {
        CuePhase::Blink => {
            let ring = PathBuilder::from_circle(cx, cy, s * 0.8)?;
            let stroke = Stroke {
                width: s * 0.15,
                ..Stroke::default()
            };
            pm.stroke_path(&ring, &paint, &stroke, Transform::identity(), None);
        }
        CuePhase::Left | CuePhase::Right => {
            let dir = if phase == CuePhase::Left { -1.0 } else { 1.0 };
            let mut pb = PathBuilder::new();
            pb.move_to(cx + dir * s * 0.95, cy);
            pb.line_to(cx + dir * s * 0.1, cy - s * 0.7);
            pb.line_to(cx + dir * s * 0.1, cy + s * 0.7);
            pb.close();
            let tail = cx - dir * s * 0.85;
            let neck = cx + dir * s * 0.15;
            pb.push_rect(Rect::from_ltrb(tail.min(neck), cy - s * 0.22, tail.max(neck), cy + s * 0.22)?);
            let path = pb.finish()?;
            pm.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
        CuePhase::Rest => {
            let half = s * 0.6;
            let block = Rect::from_ltrb(cx - half, cy - half, cx + half, cy + half)?;
            pm.fill_rect(block, &paint, Transform::identity(), None);
        }
    }
    Some(pm)
}

fn fixation_pixmap(size: u32) -> Option<Pixmap> {
    let mut pm = Pixmap::new(size, size)?;
    let mut paint = solid(WHITE);
    paint.anti_alias = false;
    let extent = size as f32;
    let h = Rect::from_xywh(0.0, (extent - 2.0) * 0.5, extent, 2.0)?;
    pm.fill_rect(h, &paint, Transform::identity(), None);
    let v = Rect::from_xywh((extent - 2.0) * 0.5, 0.0, 2.0, extent)?;
    pm.fill_rect(v, &paint, Transform::identity(), None);
    Some(pm)
}

/// Composites `src` centered on `pos`, returning the touched region.
fn blit(canvas: &mut Pixmap, src: &Pixmap, pos: (f32, f32)) -> Option<Rect> {
    let (w, h) = (src.width() as i32, src.height() as i32);
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    let x = (pos.0 - w as f32 * 0.5).floor() as i32;
    let y = (pos.1 - h as f32 * 0.5).floor() as i32;
    if x + w <= 0 || y + h <= 0 || x >= cw || y >= ch {
        return None;
    }

    let dst_x = x.max(0);
    let dst_y = y.max(0);
    let src_x = (dst_x - x) as usize;
    let src_y = (dst_y - y) as usize;
    let copy_w = ((x + w).min(cw) - dst_x) as usize;
    let copy_h = ((y + h).min(ch) - dst_y) as usize;
    let (dst_x, dst_y) = (dst_x as usize, dst_y as usize);

    let src_px: &[Rgba] = cast_slice(src.data());
    let dst_px: &mut [Rgba] = cast_slice_mut(canvas.data_mut());
    for row in 0..copy_h {
        let s0 = (src_y + row) * w as usize + src_x;
        let d0 = (dst_y + row) * cw as usize + dst_x;
        let src_row = &src_px[s0..s0 + copy_w];
        let dst_row = &mut dst_px[d0..d0 + copy_w];
        if src_row.iter().all(|p| p[3] == 255) {
            dst_row.copy_from_slice(src_row);
            continue;
        }
        for (d, s) in dst_row.iter_mut().zip(src_row) {
            *d = over(*s, *d);
        }
    }

    Rect::from_xywh(dst_x as f32, dst_y as f32, copy_w as f32, copy_h as f32)
}

/// Porter-Duff source-over in premultiplied space.
fn over(src: Rgba, dst: Rgba) -> Rgba {
    let inv = 255 - src[3] as u32;
    let mut out = [0u8; 4];
    for c in 0..4 {
        out[c] = (src[c] as u32 + (dst[c] as u32 * inv + 127) / 255).min(255) as u8;
    }
    out
}

/// Integer pixel span of `rect`, clamped to the canvas.
fn pixel_bounds(rect: Rect, width: u32, height: u32) -> Option<(usize, usize, usize, usize)> {
    let x0 = rect.left().floor().clamp(0.0, width as f32) as usize;
    let y0 = rect.top().floor().clamp(0.0, height as f32) as usize;
    let x1 = rect.right().ceil().clamp(0.0, width as f32) as usize;
    let y1 = rect.bottom().ceil().clamp(0.0, height as f32) as usize;
    (x1 > x0 && y1 > y0).then_some((x0, y0, x1, y1))
}

/// Merges rects on the same row band that touch horizontally.
fn coalesce_dirty(rects: &mut Vec<Rect>) {
    rects.sort_by(|a, b| a.y().total_cmp(&b.y()).then(a.x().total_cmp(&b.x())));
    let mut out: Vec<Rect> = Vec::with_capacity(rects.len());
    for r in rects.drain(..) {
        if let Some(last) = out.last_mut() {
            let same_row = (r.y() - last.y()).abs() < 1.0 && (r.height() - last.height()).abs() < 1.0;
            let touching = r.x() <= last.right() + 1.0;
            if same_row && touching {
                let left = last.x().min(r.x());
                let right = last.right().max(r.right());
                if let Some(merged) = Rect::from_ltrb(left, last.y(), right, last.bottom()) {
                    *last = merged;
                    continue;
                }
            }
        }
        out.push(r);
    }
    *rects = out;
}

#[cfg(test)]
mod tests {
    use super::*;
    use micue_timing::ManualTimer;

    const W: u32 = 320;
    const H: u32 = 240;

    fn frame() -> Vec<u8> {
        vec![0u8; (W * H * 4) as usize]
    }

    fn cue(phase: CuePhase, progress: f32) -> Scene<'static> {
        Scene::Cue {
            phase,
            progress,
            completed_rounds: 2,
            max_rounds: 5,
        }
    }

    fn is_black(buf: &[u8]) -> bool {
        buf.chunks_exact(4).all(|p| p[..3] == [0, 0, 0])
    }

    fn count_color_in_row(buf: &[u8], y: u32, color: Rgba) -> usize {
        let start = (y * W * 4) as usize;
        buf[start..start + (W * 4) as usize]
            .chunks_exact(4)
            .filter(|p| p[..3] == color[..3])
            .count()
    }

    #[test]
    fn draws_distinct_cues_per_phase() {
        let timer = ManualTimer::new();
        let mut frames = Vec::new();
        for phase in CuePhase::ALL {
            let mut r = SkiaRenderer::new(W, H, None).unwrap();
            let mut buf = frame();
            r.render_frame(&cue(phase, 0.0), &mut buf, &timer).unwrap();
            assert!(!is_black(&buf), "{phase} drew nothing");
            frames.push(buf);
        }
        for i in 0..frames.len() {
            for j in i + 1..frames.len() {
                assert_ne!(frames[i], frames[j]);
            }
        }
    }

    #[test]
    fn progress_bar_fills_with_progress() {
        let timer = ManualTimer::new();
        let row = (H as f32 * 0.82) as u32 + 7;
        let color = phase_color(CuePhase::Rest);

        let mut r = SkiaRenderer::new(W, H, None).unwrap();
        let mut buf = frame();
        r.render_frame(&cue(CuePhase::Rest, 0.0), &mut buf, &timer).unwrap();
        assert_eq!(count_color_in_row(&buf, row, color), 0);

        r.render_frame(&cue(CuePhase::Rest, 0.25), &mut buf, &timer).unwrap();
        let quarter = count_color_in_row(&buf, row, color);
        r.render_frame(&cue(CuePhase::Rest, 0.75), &mut buf, &timer).unwrap();
        let three_quarters = count_color_in_row(&buf, row, color);

        assert!(quarter > 40 && quarter < 56, "quarter fill was {quarter}");
        assert!(three_quarters > quarter * 2);
    }

    #[test]
    fn stale_regions_are_cleared() {
        let timer = ManualTimer::new();
        let mut r = SkiaRenderer::new(W, H, None).unwrap();
        let mut buf = frame();
        r.render_frame(&cue(CuePhase::Left, 0.5), &mut buf, &timer).unwrap();
        assert!(!is_black(&buf));
        // without a font the closing screen has nothing to draw
        let stats = r.render_frame(&Scene::Closing { rounds: 5 }, &mut buf, &timer).unwrap();
        assert_eq!(stats.dirty_count, 0);
        assert!(is_black(&buf));
    }

    #[test]
    fn relaxation_circle_follows_breath() {
        let timer = ManualTimer::new();
        let lit = |breath: f32| {
            let mut r = SkiaRenderer::new(W, H, None).unwrap();
            let mut buf = frame();
            r.render_frame(&Scene::Relaxation { breath, remaining_s: 30 }, &mut buf, &timer)
                .unwrap();
            count_color_in_row(&buf, H / 2, CALM)
        };
        assert!(lit(1.0) > lit(0.0));
    }

    #[test]
    fn rejects_mismatched_buffer_and_recovers_after_resize() {
        let timer = ManualTimer::new();
        let mut r = SkiaRenderer::new(W, H, None).unwrap();
        let mut small = vec![0u8; 16];
        assert!(r.render_frame(&Scene::Ready { subject: "S1" }, &mut small, &timer).is_err());

        r.resize(200, 100).unwrap();
        let mut buf = vec![0u8; 200 * 100 * 4];
        r.render_frame(&Scene::Ready { subject: "S1" }, &mut buf, &timer).unwrap();
        assert!(!is_black(&buf));
        assert!(!r.has_font());
    }

    #[test]
    fn coalesces_touching_rects_in_a_row() {
        let mut rects = vec![
            Rect::from_xywh(10.0, 0.0, 5.0, 4.0).unwrap(),
            Rect::from_xywh(0.0, 0.0, 10.0, 4.0).unwrap(),
            Rect::from_xywh(0.0, 50.0, 10.0, 4.0).unwrap(),
        ];
        coalesce_dirty(&mut rects);
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0].width(), 15.0);
    }

    #[test]
    fn over_keeps_destination_under_transparent_source() {
        assert_eq!(over([0, 0, 0, 0], [9, 8, 7, 255]), [9, 8, 7, 255]);
        assert_eq!(over([1, 2, 3, 255], [9, 8, 7, 255]), [1, 2, 3, 255]);
    }
}
