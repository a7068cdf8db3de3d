mod capture;
mod config;
mod dsp;
mod engine;
mod render;
mod settings;
mod util;

use anyhow::{Context, Result, bail};
use capture::{discovery, parec::ParecBackend};
use clap::Parser;
use config::{AnalyzerConfig, DEFAULT_NUM_BANDS};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::Print,
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use engine::{Engine, EngineState, Tick, Ticker};
use render::{Skin, SkinRegistry, SkinSize, clip_line};
use settings::SettingsManager;
use std::io::{self, IsTerminal, Write};
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const MIN_AUTO_BANDS: usize = 8;
const MAX_AUTO_BANDS: usize = 64;
// Rows reserved below the bars.
const STATUS_ROWS: u16 = 1;

#[derive(Parser)]
#[command(name = "termblip", about = "Spectrum bars for whatever your speakers are playing")]
struct Cli {
    /// Capture device (a PulseAudio monitor source). Default: monitor of the default sink
    #[arg(short, long)]
    device: Option<String>,

    /// List monitor sources and exit
    #[arg(long)]
    list: bool,

    /// List available skins and exit
    #[arg(long)]
    list_skins: bool,

    /// Visual style
    #[arg(short, long)]
    skin: Option<String>,

    /// Number of bands. Default: terminal width, clamped to 8..=64
    #[arg(short, long)]
    bands: Option<usize>,

    /// Capture sample rate in Hz
    #[arg(long)]
    rate: Option<f32>,

    /// Boundary between linear and logarithmic bands, in Hz
    #[arg(long)]
    split: Option<f32>,

    /// Balance gain factor; per-band gain is factor / sqrt(centre Hz), clamped to 1..=12
    #[arg(long)]
    gain: Option<f32>,

    /// Peak headroom multiplier (>= 1)
    #[arg(long)]
    headroom: Option<f32>,

    /// Per-tick decay of the bars while no audio arrives (1.0 holds them)
    #[arg(long)]
    idle_decay: Option<f32>,

    /// Render rate in frames per second
    #[arg(long)]
    fps: Option<u32>,

    /// Persist the effective settings, including the device
    #[arg(long)]
    save: bool,
}

impl Cli {
    fn apply_to(&self, settings: &mut settings::Settings) {
        if let Some(skin) = &self.skin {
            settings.skin = skin.clone();
        }
        if let Some(rate) = self.rate {
            settings.sample_rate = rate;
        }
        if let Some(split) = self.split {
            settings.split_frequency = split;
        }
        if let Some(gain) = self.gain {
            settings.balance_gain_factor = gain;
        }
        if let Some(headroom) = self.headroom {
            settings.headroom_factor = headroom;
        }
        if let Some(decay) = self.idle_decay {
            settings.idle_decay = decay;
        }
        if let Some(fps) = self.fps {
            settings.target_fps = fps;
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let registry = SkinRegistry::builtin();

    if cli.list_skins {
        for name in registry.names() {
            println!("{name}");
        }
        return Ok(());
    }

    if cli.list {
        let sources =
            discovery::list_monitor_sources().context("Failed to list monitor sources")?;
        if sources.is_empty() {
            eprintln!("No monitor sources found");
        }
        for source in sources {
            println!("{source}");
        }
        return Ok(());
    }

    let mut manager = SettingsManager::load_or_default();
    cli.apply_to(&mut manager.data);
    manager.data.sanitize();
    let settings = manager.settings().clone();

    if !registry.contains(&settings.skin) {
        bail!(
            "Unknown skin '{}'. Available: {}",
            settings.skin,
            registry.names().collect::<Vec<_>>().join(", ")
        );
    }

    let num_bands = cli.bands.unwrap_or_else(auto_band_count);
    let config = AnalyzerConfig::new(
        settings.sample_rate,
        num_bands,
        settings.split_frequency,
        settings.balance_gain_factor,
        settings.headroom_factor,
    )
    .context("Invalid analyzer settings")?;

    let device = match cli.device.clone().or(settings.last_device.clone()) {
        Some(device) => device,
        None => discovery::default_monitor().context("Failed to find a capture device")?,
    };

    if cli.save {
        manager.set_last_device(Some(device.clone()));
        match manager.persist() {
            Ok(true) => eprintln!("Saved settings to {}", manager.path().display()),
            Ok(false) => {}
            Err(err) => warn!("[settings] failed to write {:?}: {err}", manager.path()),
        }
    }

    info!(
        "[main] {} bands, frame {} samples @ {} Hz, skin '{}'",
        config.num_bands(),
        config.frame_size(),
        config.sample_rate(),
        settings.skin
    );

    let mut engine = Engine::new(config, ParecBackend::new(config.sample_rate()))
        .with_idle_decay(settings.idle_decay);
    engine
        .attach(&device)
        .with_context(|| format!("Failed to start capture on '{device}'"))?;

    let session = TerminalSession::enter()?;
    let result = run(&mut engine, &registry, &settings.skin, settings.target_fps, &device);
    engine.stop();
    drop(session);
    info!("[main] engine {} after {} frames", engine.state(), engine.frames_processed());
    result
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

fn auto_band_count() -> usize {
    match terminal::size() {
        Ok((columns, _)) => (columns as usize).clamp(MIN_AUTO_BANDS, MAX_AUTO_BANDS),
        Err(err) => {
            warn!("[main] terminal size unavailable: {err}");
            DEFAULT_NUM_BANDS
        }
    }
}

fn bar_height(rows: u16) -> usize {
    rows.saturating_sub(STATUS_ROWS).max(1) as usize
}

fn is_quit(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Why the loop ended. Only a halt the user asked for is a clean exit.
fn halt_outcome(state: EngineState, quit_requested: bool, device: &str) -> Result<()> {
    match state {
        EngineState::Stopped if quit_requested => Ok(()),
        EngineState::Failed => bail!("Capture on '{device}' closed before delivering audio"),
        state => bail!("Capture on '{device}' ended unexpectedly (engine {state})"),
    }
}

fn create_skin(registry: &SkinRegistry, name: &str, rows: u16, bands: usize) -> Result<Box<dyn Skin>> {
    registry
        .create(name, SkinSize::new(bar_height(rows), bands))
        .with_context(|| format!("Unknown skin '{name}'"))
}

fn run(
    engine: &mut Engine<ParecBackend>,
    registry: &SkinRegistry,
    skin_name: &str,
    fps: u32,
    device: &str,
) -> Result<()> {
    let mut out = io::stdout().lock();
    let bands = engine.config().num_bands();
    let (mut columns, mut rows) = terminal::size().unwrap_or((bands as u16, 24));
    let mut skin = create_skin(registry, skin_name, rows, bands)?;
    let mut ticker = Ticker::from_fps(fps);
    let mut quit_requested = false;
    debug!("[main] frame interval {:?}", ticker.interval());

    loop {
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) if is_quit(&key) => {
                    quit_requested = true;
                    engine.stop();
                }
                Event::Resize(new_columns, new_rows) => {
                    (columns, rows) = (new_columns, new_rows);
                    skin = create_skin(registry, skin_name, rows, bands)?;
                    queue!(out, Clear(ClearType::All))?;
                }
                _ => {}
            }
        }

        match engine.tick() {
            Tick::Levels { levels, .. } => {
                draw_bars(&mut out, skin.as_ref(), levels, columns as usize)?
            }
            Tick::Halted(state) => return halt_outcome(state, quit_requested, device),
        }
        let status = format!(
            " {device} | {} | {} frames | q to quit",
            skin.name(),
            engine.frames_processed()
        );
        queue!(
            out,
            MoveTo(0, rows.saturating_sub(STATUS_ROWS)),
            Clear(ClearType::CurrentLine),
            Print(clip_line(&status, columns as usize))
        )?;
        out.flush()?;
        ticker.wait();
    }
}

fn draw_bars(
    out: &mut impl Write,
    skin: &dyn Skin,
    levels: &[f32],
    columns: usize,
) -> io::Result<()> {
    for (row, line) in skin.render(levels).iter().enumerate() {
        queue!(
            out,
            MoveTo(0, row as u16),
            Clear(ClearType::CurrentLine),
            Print(clip_line(line, columns))
        )?;
    }
    Ok(())
}

/// Raw mode plus alternate screen for the lifetime of the value.
struct TerminalSession;

impl TerminalSession {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode().context("Failed to enable raw mode")?;
        let session = TerminalSession;
        execute!(io::stdout(), EnterAlternateScreen, Hide, Clear(ClearType::All))
            .context("Failed to prepare terminal")?;

        // Release builds abort on panic, so restore from the hook as well.
        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_terminal();
            default_hook(info);
        }));
        Ok(session)
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        restore_terminal();
    }
}

fn restore_terminal() {
    if let Err(err) = execute!(io::stdout(), Show, LeaveAlternateScreen) {
        warn!("[main] failed to leave alternate screen: {err}");
    }
    if let Err(err) = terminal::disable_raw_mode() {
        warn!("[main] failed to disable raw mode: {err}");
    }
}
