#![cfg(target_arch = "wasm32")]
use instant::Instant;
use polytope_core::constants::ANALYSIS_INTERVAL_MS;
use polytope_core::params::{GEOMETRY_TYPE, PROJECTION_METHOD};
use polytope_core::{
    AnalysisConfig, AudioError, AudioFeatureExtractor, MappingTable, ParameterPatch,
    ReactiveMapper, RenderLoop, VisualizerConfig,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys as web;

mod audio;
mod constants;
mod dom;
mod frame;
mod webgl;

use audio::MicrophoneInput;
use constants::*;
use webgl::{CanvasSurface, WebGl};

type Visualizer = RenderLoop<WebGl, CanvasSurface>;

static AUDIO_REQUESTED: AtomicBool = AtomicBool::new(false);
static TORN_DOWN: AtomicBool = AtomicBool::new(false);

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("polytope-web starting");

    spawn_local(async move {
        if let Err(e) = init().await {
            log::error!("init error: {:?}", e);
            dom::set_status(&format!("Failed to start: {e}"));
        }
    });
    Ok(())
}

fn load_config(document: &web::Document) -> VisualizerConfig {
    match dom::json_block(document, VISUALIZER_CONFIG_ID) {
        Some(text) => VisualizerConfig::from_json(&text).unwrap_or_else(|e| {
            log::warn!("[config] ignoring #{}: {}", VISUALIZER_CONFIG_ID, e);
            VisualizerConfig::default()
        }),
        None => VisualizerConfig::default(),
    }
}

fn load_rules(document: &web::Document) -> MappingTable {
    let mut rules = MappingTable::default();
    if let Some(text) = dom::json_block(document, MAPPING_CONFIG_ID) {
        match MappingTable::from_json(&text) {
            Ok(overrides) => rules.0.extend(overrides.0),
            Err(e) => log::warn!("[config] ignoring #{}: {}", MAPPING_CONFIG_ID, e),
        }
    }
    rules
}

async fn init() -> anyhow::Result<()> {
    let window = web::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| anyhow::anyhow!("no document"))?;

    let canvas: web::HtmlCanvasElement = document
        .get_element_by_id(CANVAS_ID)
        .ok_or_else(|| anyhow::anyhow!("missing #{}", CANVAS_ID))?
        .dyn_into::<web::HtmlCanvasElement>()
        .map_err(|e| anyhow::anyhow!(format!("{:?}", e)))?;

    let gl: web::WebGl2RenderingContext = canvas
        .get_context("webgl2")
        .map_err(|e| anyhow::anyhow!(format!("{:?}", e)))?
        .ok_or_else(|| anyhow::anyhow!("WebGL2 is not available"))?
        .dyn_into()
        .map_err(|e| anyhow::anyhow!(format!("{:?}", e)))?;

    let config = load_config(&document);
    let rules = load_rules(&document);

    let tick: frame::FrameCallback = Rc::new(RefCell::new(None));
    let scheduler = frame::RafScheduler::new(window.clone(), tick.clone());
    let viz: Rc<RefCell<Visualizer>> = Rc::new(RefCell::new(RenderLoop::new(
        WebGl::new(gl),
        CanvasSurface::new(canvas.clone()),
        Box::new(scheduler),
        &config,
    )?));

    viz.borrow_mut().set_error_handler(|e| {
        log::error!("[viz] {}", e);
        if !e.is_recoverable() {
            dom::set_status(&format!("Visualizer stopped: {e}"));
        }
    });
    {
        let viz = viz.clone();
        frame::install(&tick, move |ts| {
            viz.borrow_mut().render(ts);
        });
    }

    // Geometry and projection pickers
    dom::set_select_value(&document, GEOMETRY_SELECT_ID, config.default_geometry.name());
    dom::set_select_value(&document, PROJECTION_SELECT_ID, config.default_projection.name());
    {
        let viz = viz.clone();
        dom::add_select_listener(&document, GEOMETRY_SELECT_ID, move |value| {
            log::info!("[ui] geometry -> {}", value);
            viz.borrow_mut()
                .update_parameters(&ParameterPatch::new().text(GEOMETRY_TYPE, value));
        });
    }
    {
        let viz = viz.clone();
        dom::add_select_listener(&document, PROJECTION_SELECT_ID, move |value| {
            log::info!("[ui] projection -> {}", value);
            viz.borrow_mut()
                .update_parameters(&ParameterPatch::new().text(PROJECTION_METHOD, value));
        });
    }

    // Pointer drives u_mouse
    {
        let viz = viz.clone();
        let target = canvas.clone();
        dom::add_pointer_listener(&canvas, "pointermove", move |ev| {
            let rect = target.get_bounding_client_rect();
            let uv = pointer_uv(
                ev.client_x() as f64,
                ev.client_y() as f64,
                rect.left(),
                rect.top(),
                rect.width(),
                rect.height(),
            );
            viz.borrow_mut()
                .update_parameters(&ParameterPatch::new().floats("mouse", &uv));
        });
    }

    // Context loss stops the loop on the next frame
    {
        let closure = Closure::wrap(Box::new(move |ev: web::Event| {
            ev.prevent_default();
            log::warn!("[viz] WebGL context lost");
            dom::set_status("Graphics context lost, reload to resume");
        }) as Box<dyn FnMut(web::Event)>);
        let _ = canvas
            .add_event_listener_with_callback("webglcontextlost", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    // Audio analysis: simulated until a microphone is connected
    let analysis = AnalysisConfig::default();
    let seed = analysis.seed;
    let extractor = Rc::new(RefCell::new(AudioFeatureExtractor::new(analysis)));
    if !extractor.borrow_mut().initialize() {
        log::error!("[audio] analysis configuration rejected");
    }
    let mapper = Rc::new(RefCell::new(ReactiveMapper::new(rules, seed)));
    dom::set_status("Simulated audio. Click the canvas to use the microphone");

    {
        let extractor = extractor.clone();
        dom::add_pointer_listener(&canvas, "pointerdown", move |_| {
            if AUDIO_REQUESTED.swap(true, Ordering::SeqCst) {
                return;
            }
            let extractor = extractor.clone();
            spawn_local(async move {
                connect_microphone(extractor).await;
            });
        });
    }

    let interval = {
        let viz = viz.clone();
        let extractor = extractor.clone();
        let clock = Instant::now();
        frame::set_interval(&window, ANALYSIS_INTERVAL_MS, move || {
            let now = clock.elapsed().as_secs_f64();
            let snapshot = extractor.borrow_mut().analyze(now).clone();
            let mapped = mapper.borrow_mut().process(&snapshot, now * 1000.0);
            viz.borrow_mut().update_parameters(&mapped.to_patch());
        })?
    };

    // Leaving the page releases GPU objects and the microphone
    {
        let viz = viz.clone();
        let target = window.clone();
        let closure = Closure::wrap(Box::new(move |_: web::Event| {
            if TORN_DOWN.swap(true, Ordering::SeqCst) {
                return;
            }
            log::info!("[viz] page hidden, tearing down");
            AUDIO_REQUESTED.store(true, Ordering::SeqCst);
            target.clear_interval_with_handle(interval);
            extractor.borrow_mut().dispose();
            viz.borrow_mut().dispose();
        }) as Box<dyn FnMut(web::Event)>);
        window
            .add_event_listener_with_callback("pagehide", closure.as_ref().unchecked_ref())
            .map_err(|e| anyhow::anyhow!(format!("{:?}", e)))?;
        closure.forget();
    }

    let now = window.performance().map(|p| p.now()).unwrap_or(0.0);
    viz.borrow_mut().start(now);
    Ok(())
}

async fn connect_microphone(extractor: Rc<RefCell<AudioFeatureExtractor>>) {
    let ctx = match web::AudioContext::new() {
        Ok(ctx) => ctx,
        Err(e) => {
            let err = AudioError::Unavailable(format!("{:?}", e));
            log::warn!("[audio] {}", err);
            extractor.borrow_mut().connection_failed(&err);
            return;
        }
    };
    let config = extractor.borrow().config().clone();
    match MicrophoneInput::connect(ctx, &config).await {
        Ok(input) if TORN_DOWN.load(Ordering::SeqCst) => {
            log::info!("[audio] page already torn down, releasing microphone");
            drop(input);
        }
        Ok(input) => {
            if extractor.borrow_mut().connect_source(Box::new(input)) {
                dom::set_status("Listening to the microphone");
            }
        }
        Err(e) => {
            log::warn!("[audio] {}", e);
            extractor.borrow_mut().connection_failed(&e);
            dom::set_status("Microphone unavailable, using simulated audio");
        }
    }
}
