pub mod render;
pub mod scene;
pub mod text;

pub use ab_glyph::FontArc;

pub use render::{FrameStats, SkiaRenderer, phase_color};
pub use scene::{Scene, breath_level};
pub use text::{TextCache, TextStyle, load_font, render_text_pixmap};
