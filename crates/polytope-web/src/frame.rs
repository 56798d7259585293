use polytope_core::gl::FrameScheduler;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys as web;

pub type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// `requestAnimationFrame` scheduler. The callback slot is filled after the
/// render loop exists, since the callback itself drives that loop.
pub struct RafScheduler {
    window: web::Window,
    tick: FrameCallback,
}

impl RafScheduler {
    pub fn new(window: web::Window, tick: FrameCallback) -> Self {
        Self { window, tick }
    }
}

impl FrameScheduler for RafScheduler {
    fn request_frame(&mut self) -> i32 {
        let tick = self.tick.borrow();
        let Some(cb) = tick.as_ref() else {
            log::warn!("[frame] no frame callback installed");
            return 0;
        };
        match self
            .window
            .request_animation_frame(cb.as_ref().unchecked_ref())
        {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("requestAnimationFrame error: {:?}", e);
                0
            }
        }
    }

    fn cancel_frame(&mut self, handle: i32) {
        let _ = self.window.cancel_animation_frame(handle);
    }
}

/// Installs `on_frame` as the animation frame callback.
pub fn install(tick: &FrameCallback, mut on_frame: impl FnMut(f64) + 'static) {
    *tick.borrow_mut() = Some(Closure::wrap(
        Box::new(move |ts: f64| on_frame(ts)) as Box<dyn FnMut(f64)>
    ));
}

/// Runs `on_tick` every `interval_ms` on the main thread.
pub fn set_interval(
    window: &web::Window,
    interval_ms: u32,
    mut on_tick: impl FnMut() + 'static,
) -> anyhow::Result<i32> {
    let closure = Closure::wrap(Box::new(move || on_tick()) as Box<dyn FnMut()>);
    let id = window
        .set_interval_with_callback_and_timeout_and_arguments_0(
            closure.as_ref().unchecked_ref(),
            interval_ms as i32,
        )
        .map_err(|e| anyhow::anyhow!(format!("{:?}", e)))?;
    closure.forget();
    Ok(id)
}
