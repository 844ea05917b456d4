use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use micue_render::{FontArc, SkiaRenderer};
use micue_timing::{HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Fullscreen, Window, WindowId};

use crate::logging;
use crate::presenter::{Flow, Input, Presenter};

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    presenter: Presenter,
    font: Option<FontArc>,
    timer: HighPrecisionTimer,
    last_frame_ns: Option<u64>,
    windowed: bool,
    refresh_rate: Option<f64>,
    should_exit: bool,
}

impl App {
    pub fn new(presenter: Presenter, font: Option<FontArc>, windowed: bool) -> Self {
        Self {
            window: None,
            pixels: None,
            renderer: None,
            presenter,
            font,
            timer: HighPrecisionTimer::new(),
            last_frame_ns: None,
            windowed,
            refresh_rate: None,
            should_exit: false,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(
            platform = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            "presenter starting; ESC exits at any time"
        );
        let result = event_loop.run_app(&mut self);
        self.shutdown();
        result.map_err(Into::into)
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("no monitor available"))?;
        self.refresh_rate = monitor.refresh_rate_millihertz().map(|rate| rate as f64 / 1000.0);

        let mut attributes = Window::default_attributes().with_title("micue");
        attributes = if self.windowed {
            attributes.with_inner_size(LogicalSize::new(1280.0, 720.0))
        } else {
            attributes
                .with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))))
                .with_resizable(false)
        };

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        info!(
            width = size.width,
            height = size.height,
            scale = window.scale_factor(),
            refresh_hz = self.refresh_rate,
            "display configured"
        );

        let surface = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface)?);
        self.renderer = Some(SkiaRenderer::new(size.width, size.height, self.font.clone())?);

        if !self.windowed {
            window.set_cursor_visible(false);
        }
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let now_ns = self.timer.now();
        if let Some(last) = self.last_frame_ns.replace(now_ns) {
            self.timer.record_frame(Duration::from_nanos(now_ns.saturating_sub(last)));
        }

        let now_ms = self.timer.now_ms();
        self.presenter.update(now_ms);

        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };
        let scene = self.presenter.scene(now_ms);
        let stats = renderer.render_frame(&scene, pixels.frame_mut(), &self.timer)?;
        pixels.render()?;
        if stats.total > Duration::from_millis(8) {
            debug!(
                clear_us = stats.clear.as_micros() as u64,
                draw_us = stats.draw.as_micros() as u64,
                copy_us = stats.copy.as_micros() as u64,
                dirty = stats.dirty_count,
                "slow frame"
            );
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
        Ok(())
    }

    fn handle_key(&mut self, event: &KeyEvent, event_loop: &ActiveEventLoop) {
        let input = match &event.logical_key {
            Key::Named(NamedKey::Escape) => Input::Escape,
            Key::Named(NamedKey::Enter) => Input::Enter,
            Key::Named(NamedKey::Backspace) => Input::Backspace,
            Key::Named(NamedKey::Space) => Input::Space,
            _ => match &event.text {
                Some(text) => Input::Text(text.to_string()),
                None => return,
            },
        };
        if self.presenter.handle(input, self.timer.now_ms()) == Flow::Exit {
            self.exit(event_loop);
        }
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(size.width, size.height) {
                warn!(error = %e, "failed to resize surface");
            }
            if let Err(e) = pixels.resize_buffer(size.width, size.height) {
                warn!(error = %e, "failed to resize buffer");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(size.width, size.height) {
                warn!(error = %e, "failed to resize renderer");
            }
        }
        debug!(width = size.width, height = size.height, "display resized");
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        self.should_exit = true;
        event_loop.exit();
    }

    fn shutdown(&mut self) {
        self.presenter.shutdown();
        logging::log_frame_stats("display", &self.timer.frame_stats(), self.timer.frame_count());
        if let Some(renderer) = &self.renderer {
            let draw = renderer.draw_stats();
            debug!(
                avg_draw_us = (draw.average_frame_time_ns / 1e3).round(),
                max_draw_us = (draw.max_frame_time_ns / 1e3).round(),
                "renderer timing"
            );
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!(error = %e, "failed to create window and surface");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    error!(error = %e, "render failed");
                    self.exit(event_loop);
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                self.handle_key(&event, event_loop);
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}
