use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use ab_glyph::FontVec;
use anyhow::{Result, anyhow};
use pixels::{Pixels, SurfaceTexture};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tapex_core::{KeyPress, ResultSink, Stage};
use tapex_export::{BackgroundSink, HttpSink, JsonFileSink, RowsFileSink, write_record};
use tapex_sequencer::{ExportOutcome, SequencerEvent, SessionConfig, SessionView, TrialSequencer};
use tapex_timing::MonotonicClock;
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowId},
};

use crate::cli::Cli;
use crate::playback::CommandPlayback;
use crate::render::SceneRenderer;

/// Upper bound between pumps; player exit is only seen when polled.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub type Sequencer = TrialSequencer<MonotonicClock, CommandPlayback, Box<dyn ResultSink>>;

pub struct App {
    cli: Cli,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SceneRenderer>,
    font: Option<FontVec>,
    sequencer: Sequencer,
    rng: StdRng,
    last_view: Option<SessionView>,
    should_exit: bool,
}

impl App {
    pub fn new(cli: Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => SessionConfig::from_json_file(path)?,
            None => SessionConfig::default(),
        };
        if let Some(runs) = cli.runs {
            config.plan.run_count = runs;
        }

        let mut rng = match cli.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let (program, args) = cli.player_command();
        info!(%program, ?args, media_root = %cli.media_root.display(), "audio player");
        let playback = CommandPlayback::new(program, args, cli.media_root.clone());
        let sink = build_sink(&cli, &config);
        info!(sink = sink.name(), "results destination");

        let font = cli
            .font
            .as_deref()
            .map(SceneRenderer::load_font)
            .transpose()?;
        if font.is_none() {
            warn!("no --font given, screens are drawn without text");
        }

        let sequencer =
            TrialSequencer::with_rng(config, &mut rng, MonotonicClock::new(), playback, sink)?;

        Ok(Self {
            cli,
            window: None,
            pixels: None,
            renderer: None,
            font,
            sequencer,
            rng,
            last_view: None,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(
            os = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            runs = self.sequencer.plan().run_count(),
            "tapex ready, SPACE starts, ESC exits"
        );
        event_loop.run_app(&mut self)?;
        Ok(())
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("no monitor available"))?;

        let mut attributes = Window::default_attributes().with_title("Tap to the Beats");
        attributes = if self.cli.windowed {
            attributes.with_inner_size(PhysicalSize::new(1280u32, 800u32))
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
            "window created"
        );

        let surface = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface)?);
        self.renderer = Some(SceneRenderer::new(size.width, size.height, self.font.take())?);

        if !self.cli.windowed {
            window.set_cursor_visible(false);
        }
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };
        let view = self.sequencer.view();
        renderer.render(&view, pixels.frame_mut())?;
        pixels.render()?;
        self.last_view = Some(view);
        Ok(())
    }

    fn request_redraw_if_changed(&self) {
        if self.last_view.as_ref() != Some(&self.sequencer.view()) {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
    }

    fn handle_key(&mut self, event: &KeyEvent, event_loop: &ActiveEventLoop) {
        if event.logical_key == Key::Named(NamedKey::Escape) {
            self.cleanup_and_exit(event_loop);
            return;
        }

        match self.sequencer.stage() {
            Stage::Start if !event.repeat => match &event.logical_key {
                Key::Named(NamedKey::Space | NamedKey::Enter) => {
                    self.sequencer.start();
                }
                Key::Character(c) if c.eq_ignore_ascii_case("p") => {
                    self.sequencer.preview_sample();
                }
                _ => {}
            },
            Stage::Running => {
                if let Some(key) = single_char(&event.logical_key) {
                    self.sequencer.on_key(KeyPress {
                        key,
                        repeat: event.repeat,
                    });
                }
            }
            Stage::End if !event.repeat => match &event.logical_key {
                Key::Character(c) if c.eq_ignore_ascii_case("s") => self.save_copy(),
                Key::Named(NamedKey::Enter) => self.restart(),
                _ => {}
            },
            _ => {}
        }
        self.request_redraw_if_changed();
    }

    /// Writes the finished record next to `--output` under a timestamped name.
    fn save_copy(&self) {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let dir = self
            .cli
            .output
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default();
        let path = dir.join(format!("tapex_session_{stamp}.json"));
        match write_record(&path, self.sequencer.tap_record()) {
            Ok(()) => info!(path = %path.display(), "session saved"),
            Err(e) => error!(path = %path.display(), error = %e, "saving session failed"),
        }
    }

    fn restart(&mut self) {
        match self.sequencer.restart_with_rng(&mut self.rng) {
            Ok(()) => info!("new session ready"),
            Err(e) => error!(error = %e, "cannot restart session"),
        }
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(size.width, size.height) {
                error!(error = %e, "failed to resize surface");
            }
            if let Err(e) = pixels.resize_buffer(size.width, size.height) {
                error!(error = %e, "failed to resize buffer");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(size.width, size.height) {
                error!(error = %e, "failed to resize canvas");
            }
        }
        self.last_view = None;
        debug!(width = size.width, height = size.height, "display resized");
    }

    /// Wake for the next countdown tick or the next poll, whichever is sooner.
    fn next_wake(&self) -> Instant {
        let poll = Instant::now() + POLL_INTERVAL;
        match self.sequencer.next_tick_in() {
            Some(tick) => poll.min(Instant::now() + tick),
            None => poll,
        }
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        if self.sequencer.stage().is_running() {
            warn!(
                taps = self.sequencer.tap_record().total_taps(),
                "exiting mid-session, nothing exported"
            );
        }
        info!("exiting");
        self.should_exit = true;
        event_loop.exit();
    }
}

fn build_sink(cli: &Cli, config: &SessionConfig) -> Box<dyn ResultSink> {
    let root = config.plan.source_root.clone();
    if let Some(url) = &cli.upload_url {
        let http = HttpSink::new(url.clone(), cli.upload_format.into(), root);
        info!(url = http.url(), session = %http.session_id(), "uploading results in background");
        Box::new(BackgroundSink::new(http))
    } else if let Some(path) = &cli.rows_file {
        let rows = RowsFileSink::new(path.clone(), root);
        info!(path = %path.display(), session = %rows.session_id(), "appending result rows");
        Box::new(rows)
    } else {
        Box::new(JsonFileSink::new(cli.output.clone()))
    }
}

fn report_export(outcome: &ExportOutcome) {
    if outcome.is_pending() {
        info!(?outcome, "waiting for results upload");
    } else if outcome.is_delivered() {
        info!("results delivered");
    } else {
        warn!(?outcome, "results not delivered, press S to save");
    }
}

/// The character a key press produces, if it is exactly one.
fn single_char(key: &Key) -> Option<char> {
    match key {
        Key::Character(s) => {
            let mut chars = s.chars();
            let c = chars.next()?;
            chars.next().is_none().then_some(c)
        }
        Key::Named(NamedKey::Space) => Some(' '),
        _ => None,
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
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    error!(error = %e, "render failed");
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
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
            return;
        }
        for event in self.sequencer.pump() {
            match event {
                SequencerEvent::Finished => {
                    if let Some(outcome) = self.sequencer.export_outcome() {
                        report_export(outcome);
                    }
                }
                SequencerEvent::ExportSettled(outcome) => report_export(&outcome),
                SequencerEvent::Ignored(trigger) => debug!(?trigger, "stale trigger"),
                _ => {}
            }
        }
        self.request_redraw_if_changed();
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_wake()));
    }
}
