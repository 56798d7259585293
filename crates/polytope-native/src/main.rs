use anyhow::Context;
use clap::Parser;
use polytope_core::constants::ANALYSIS_INTERVAL_MS;
use polytope_core::{
    AnalysisConfig, AudioError, AudioFeatureExtractor, GeometryKind, MappingTable,
    ProgramComposer, ProjectionKind, ReactiveMapper, RenderLoop, VisualizerConfig,
};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

mod capture;
mod headless;
mod spectrum;

use headless::{FixedSurface, LogGl, ManualScheduler};
use spectrum::FftSpectrum;

#[derive(Parser, Debug)]
#[command(
    name = "polytope-native",
    version,
    about = "Audio-reactive polytope visualizer diagnostics"
)]
struct Args {
    /// Skip the microphone and run on simulated audio
    #[arg(long)]
    simulate: bool,

    /// JSON mapping rules merged over the defaults
    #[arg(long, value_name = "FILE")]
    mapping: Option<PathBuf>,

    /// JSON analysis configuration
    #[arg(long, value_name = "FILE")]
    analysis: Option<PathBuf>,

    /// Print the composed fragment shader and exit
    #[arg(long)]
    dump_shader: bool,

    #[arg(long, default_value = "hypercube")]
    geometry: String,

    #[arg(long, default_value = "perspective")]
    projection: String,

    /// Stop after this many analysis ticks (runs until interrupted otherwise)
    #[arg(long)]
    ticks: Option<u64>,

    /// Input device name substring
    #[arg(long)]
    device: Option<String>,

    /// Also drive a render loop against a logging GL backend
    #[arg(long)]
    headless: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Args::parse()) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let geometry = GeometryKind::resolve(&args.geometry, GeometryKind::default());
    let projection = ProjectionKind::resolve(&args.projection, ProjectionKind::default());

    if args.dump_shader {
        let composer: ProgramComposer<LogGl> = ProgramComposer::new(geometry, projection);
        let source = composer.compose_fragment_source(geometry.name(), projection.name())?;
        println!("{source}");
        return Ok(());
    }

    let analysis = match &args.analysis {
        Some(path) => AnalysisConfig::from_json(&read(path)?)
            .with_context(|| format!("parse {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    let mut rules = MappingTable::default();
    if let Some(path) = &args.mapping {
        let overrides = MappingTable::from_json(&read(path)?)
            .with_context(|| format!("parse {}", path.display()))?;
        rules.0.extend(overrides.0);
        rules.validate()?;
    }

    let seed = analysis.seed;
    let mut extractor = AudioFeatureExtractor::new(analysis);
    if !extractor.initialize() {
        anyhow::bail!("analysis configuration rejected");
    }
    let mut mapper = ReactiveMapper::new(rules, seed);

    // Keep the capture alive for the whole run
    let _capture = if args.simulate {
        log::info!("[audio] simulated input requested");
        extractor.connection_failed(&AudioError::Unavailable("simulation requested".into()));
        None
    } else {
        let capacity = extractor.config().fft_size * 4;
        match capture::open(args.device.as_deref(), capacity) {
            Ok(mic) => {
                let source = FftSpectrum::new(
                    mic.queue.clone(),
                    mic.sample_rate_hz as f32,
                    extractor.config(),
                );
                if extractor.connect_source(Box::new(source)) {
                    log::info!("[audio] analysing live input from '{}'", mic.device_name);
                }
                Some(mic)
            }
            Err(e) => {
                log::warn!("[audio] {:#}", e);
                extractor.connection_failed(&AudioError::Unavailable(format!("{e:#}")));
                None
            }
        }
    };

    let mut viz = if args.headless {
        let config = VisualizerConfig {
            default_geometry: geometry,
            default_projection: projection,
            ..VisualizerConfig::default()
        };
        let mut r = RenderLoop::new(
            LogGl::default(),
            FixedSurface::new(1280, 720),
            Box::new(ManualScheduler::default()),
            &config,
        )?;
        r.set_error_handler(|e| log::error!("[render] {}", e));
        r.start(0.0);
        Some(r)
    } else {
        None
    };

    let start = Instant::now();
    let interval = Duration::from_millis(ANALYSIS_INTERVAL_MS as u64);
    let mut tick: u64 = 0;
    while args.ticks.map_or(true, |n| tick < n) {
        let now = start.elapsed();
        let snapshot = extractor.analyze(now.as_secs_f64()).clone();
        let mapped = mapper.process(&snapshot, now.as_secs_f64() * 1000.0);

        if let Some(r) = viz.as_mut() {
            r.update_parameters(&mapped.to_patch());
            if !r.render(now.as_secs_f64() * 1000.0) {
                anyhow::bail!("render loop stopped at tick {tick}");
            }
        }

        if tick % 25 == 0 {
            log::info!(
                "[mapper] {} {}{} bass {:.2} mid {:.2} high {:.2}{}",
                if snapshot.simulated { "sim" } else { "mic" },
                snapshot.pitch.note,
                snapshot.pitch.octave,
                snapshot.smoothed_bass,
                snapshot.smoothed_mid,
                snapshot.smoothed_high,
                if snapshot.pitch.is_in_tune { " in tune" } else { "" }
            );
        }
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("[mapper] {}", serde_json::to_string(&mapped)?);
        }

        tick += 1;
        let next = interval * tick as u32;
        if let Some(wait) = next.checked_sub(start.elapsed()) {
            thread::sleep(wait);
        }
    }

    if let Some(mut r) = viz {
        let stats = &r.gl().stats;
        log::info!(
            "[render] {} frames, {} links, {} uniform uploads",
            stats.draws.get(),
            stats.links.get(),
            stats.uploads.get()
        );
        r.dispose();
    }
    Ok(())
}

fn read(path: &PathBuf) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}
