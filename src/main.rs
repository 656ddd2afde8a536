use clap::Parser;
use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use fireshow::config::{self, DEFAULT_FRAME_RATE, DEFAULT_RESTART_GAP_MS, EffectRecord, Rgb, Settings};
use fireshow::engine::{EngineCall, HeadlessEngine, TerminalEngine};
use fireshow::error::DisplayError;
use fireshow::render::{FrameCounter, Renderer};
use fireshow::{Container, DisplayScheduler, loader};
use log::{LevelFilter, info, warn};
use std::fs::File;
use std::io::{BufWriter, IsTerminal, Write, stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Looping firework display for the terminal.
///
/// Press 'q', ESC, or Ctrl+C to exit and 'r' to restart the show.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Display description (.xml or .json)
    #[arg(default_value = "demos/fireworks.xml")]
    display: PathBuf,

    /// Pause after the last firework ends before the show restarts
    #[arg(long, default_value_t = DEFAULT_RESTART_GAP_MS)]
    restart_gap_ms: f64,

    /// Upper bound on simulation ticks per second
    #[arg(long, default_value_t = DEFAULT_FRAME_RATE)]
    fps: u32,

    /// Background color as hex (e.g., --bg-color 1a1b26)
    #[arg(long, value_parser = parse_bg_color)]
    bg_color: Option<Rgb>,

    /// Log verbosity; logs go to stderr
    #[arg(long, default_value = "warn")]
    log_level: LevelFilter,

    /// Log destination while the display is drawn on a terminal stderr
    #[arg(long, default_value = "fireshow.log")]
    log_file: PathBuf,

    /// Simulate without a terminal and print the engine journal as JSON
    #[arg(long)]
    headless: bool,

    /// Number of display cycles to simulate with --headless
    #[arg(long, default_value_t = 1)]
    cycles: u32,

    /// Draw a frames-per-second counter in the corner
    #[arg(long)]
    show_fps: bool,
}

fn parse_bg_color(hex: &str) -> Result<Rgb, String> {
    config::parse_colour(hex).ok_or_else(|| format!("invalid hex color '{hex}', expected RRGGBB (e.g., 1a1b26)"))
}

fn build_display(
    records: &[EffectRecord],
    settings: &Settings,
    container: &Container,
    (cols, rows): (u16, u16),
    now_ms: f64,
) -> Result<DisplayScheduler<TerminalEngine>, DisplayError> {
    let mut display = DisplayScheduler::new(TerminalEngine::new(cols, rows), container.clone(), settings);
    let report = display.create_all(records, now_ms)?;
    if report.created == 0 {
        warn!("None of the {} fireworks could be created", records.len());
    }
    display.start(now_ms);
    Ok(display)
}

fn run_display(records: &[EffectRecord], settings: &Settings, show_fps: bool) -> Result<(), Box<dyn std::error::Error>> {
    // Creation failures are reported before the terminal is taken over
    let clock = Instant::now();
    let size = terminal::size()?;
    let container = Container::new();
    let display = build_display(records, settings, &container, size, 0.0)?;

    let stdout = stdout();
    let mut stdout = BufWriter::with_capacity(1024 * 64, stdout);

    terminal::enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, Hide, Clear(ClearType::All))?;

    let result = display_loop(records, settings, show_fps, clock, container, display, &mut stdout);

    execute!(stdout, Show, LeaveAlternateScreen)?;
    terminal::disable_raw_mode()?;

    result
}

fn display_loop(
    records: &[EffectRecord],
    settings: &Settings,
    show_fps: bool,
    clock: Instant,
    container: Container,
    mut display: DisplayScheduler<TerminalEngine>,
    stdout: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let now_ms = || clock.elapsed().as_secs_f64() * 1000.0;
    let mut size = terminal::size()?;
    let mut renderer = Renderer::new(size.0, size.1, settings.bg_color);

    let frame_interval = settings.frame_interval_ms();
    let mut last_tick = f64::NEG_INFINITY;
    let mut counter = FrameCounter::new();

    loop {
        if event::poll(Duration::from_millis(1))? {
            match event::read()? {
                Event::Key(key_event) => match key_event.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => break,
                    KeyCode::Char('r') => {
                        display.teardown();
                        container.clear();
                        display = build_display(records, settings, &container, size, now_ms())?;
                        info!("Display restarted by hand");
                    }
                    _ => {}
                },
                Event::Resize(cols, rows) => {
                    size = (cols, rows);
                    renderer = Renderer::new(cols, rows, settings.bg_color);
                    execute!(stdout, Clear(ClearType::All))?;
                }
                _ => {}
            }
        }

        let now = now_ms();
        if now - last_tick < frame_interval {
            continue;
        }
        last_tick = now;

        display.tick(now);
        counter.frame(now);

        let overlay = show_fps.then(|| format!("FPS: {:.2}", counter.fps()));
        renderer.render(&container, now / 1000.0, overlay.as_deref(), stdout)?;
    }

    Ok(())
}

/// Runs the display against a recording engine on a simulated clock.
fn run_headless(records: &[EffectRecord], settings: &Settings, cycles: u32) -> Result<(), Box<dyn std::error::Error>> {
    let engine = HeadlessEngine::new();
    let journal = engine.journal();
    let mut display = DisplayScheduler::new(engine, Container::new(), settings);

    let report = display.create_all(records, 0.0)?;
    display.start(0.0);

    let step = 1000.0 / DEFAULT_FRAME_RATE as f64;
    let end = display.cycle_length_ms() * cycles as f64;
    let mut frame = 0u64;
    loop {
        let now = frame as f64 * step;
        if now > end {
            break;
        }
        display.tick(now);
        frame += 1;
    }
    let cycle_length_ms = display.cycle_length_ms();
    let cycles_completed = display.cycles_completed();
    display.teardown();

    let stdout = stdout();
    let mut out = stdout.lock();
    for (index, e) in &report.failures {
        writeln!(out, "# skipped firework #{index}: {e}")?;
    }
    // Updates are summarised per emitter, everything else is printed as it happened
    let mut updates = Vec::new();
    for call in journal.calls() {
        if let EngineCall::Updated { emitter, .. } = call {
            if updates.len() <= emitter {
                updates.resize(emitter + 1, 0usize);
            }
            updates[emitter] += 1;
        } else {
            writeln!(out, "{}", serde_json::to_string(&call)?)?;
        }
    }
    for (emitter, count) in updates.iter().enumerate() {
        writeln!(out, "# emitter {emitter}: {count} updates")?;
    }
    writeln!(
        out,
        "# {} fireworks, cycle {}ms, {} restarts over {} frames",
        report.created,
        cycle_length_ms,
        cycles_completed,
        frame
    )?;
    Ok(())
}

/// Log lines written into the terminal would tear the display frames.
fn logs_to_file(headless: bool, stderr_is_terminal: bool) -> bool {
    !headless && stderr_is_terminal
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Install logger immediately, then narrow it to the requested level.
    let mut logger = env_logger::builder();
    logger.filter_level(LevelFilter::Trace);
    if logs_to_file(cli.headless, std::io::stderr().is_terminal()) {
        logger.target(env_logger::Target::Pipe(Box::new(File::create(&cli.log_file)?)));
    }
    let _ = logger.try_init();
    log::set_max_level(cli.log_level);

    let records = loader::load(&cli.display).map_err(DisplayError::from)?;
    let settings = Settings {
        restart_gap_ms: cli.restart_gap_ms,
        frame_rate: cli.fps,
        bg_color: cli.bg_color.unwrap_or((0, 0, 0)),
    };

    if cli.headless {
        run_headless(&records, &settings, cli.cycles)
    } else {
        run_display(&records, &settings, cli.show_fps)
    }
}
