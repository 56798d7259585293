use crate::constants::{is_permission_error, SINK_GAIN};
use polytope_core::{AnalysisConfig, AudioError, SpectrumSource};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys as web;

/// Microphone analyser graph: stream source -> analyser -> muted gain -> destination.
pub struct MicrophoneInput {
    ctx: web::AudioContext,
    stream: web::MediaStream,
    source: web::MediaStreamAudioSourceNode,
    analyser: web::AnalyserNode,
    sink: web::GainNode,
}

fn create_gain(
    audio_ctx: &web::AudioContext,
    value: f32,
    label: &str,
) -> Result<web::GainNode, AudioError> {
    match web::GainNode::new(audio_ctx) {
        Ok(g) => {
            g.gain().set_value(value);
            Ok(g)
        }
        Err(e) => {
            log::error!("{} GainNode error: {:?}", label, e);
            Err(AudioError::Unavailable(format!("{:?}", e)))
        }
    }
}

fn create_analyser(
    audio_ctx: &web::AudioContext,
    config: &AnalysisConfig,
) -> Result<web::AnalyserNode, AudioError> {
    let analyser = web::AnalyserNode::new(audio_ctx).map_err(|e| {
        log::error!("AnalyserNode error: {:?}", e);
        AudioError::Unavailable(format!("{:?}", e))
    })?;
    analyser.set_fft_size(config.fft_size as u32);
    analyser.set_smoothing_time_constant(config.analyser_smoothing as f64);
    analyser.set_min_decibels(config.min_decibels as f64);
    analyser.set_max_decibels(config.max_decibels as f64);
    Ok(analyser)
}

// Raw capture: browser voice processing would flatten the spectrum
fn capture_constraints() -> Result<web::MediaStreamConstraints, AudioError> {
    let audio = js_sys::Object::new();
    for key in ["echoCancellation", "noiseSuppression", "autoGainControl"] {
        js_sys::Reflect::set(&audio, &JsValue::from_str(key), &JsValue::FALSE)
            .map_err(|e| AudioError::Unavailable(format!("{:?}", e)))?;
    }
    let constraints = js_sys::Object::new();
    js_sys::Reflect::set(&constraints, &JsValue::from_str("audio"), &audio)
        .map_err(|e| AudioError::Unavailable(format!("{:?}", e)))?;
    js_sys::Reflect::set(&constraints, &JsValue::from_str("video"), &JsValue::FALSE)
        .map_err(|e| AudioError::Unavailable(format!("{:?}", e)))?;
    Ok(constraints.unchecked_into())
}

fn classify_media_error(err: &JsValue) -> AudioError {
    let name = js_sys::Reflect::get(err, &JsValue::from_str("name"))
        .ok()
        .and_then(|n| n.as_string())
        .unwrap_or_default();
    if is_permission_error(&name) {
        AudioError::Permission(name)
    } else {
        AudioError::Unavailable(format!("{:?}", err))
    }
}

impl MicrophoneInput {
    /// Requests the microphone and wires the analyser graph.
    pub async fn connect(
        ctx: web::AudioContext,
        config: &AnalysisConfig,
    ) -> Result<Self, AudioError> {
        let window = web::window().ok_or_else(|| AudioError::Unavailable("no window".into()))?;
        let devices = window
            .navigator()
            .media_devices()
            .map_err(|e| AudioError::Unavailable(format!("{:?}", e)))?;
        let promise = devices
            .get_user_media_with_constraints(&capture_constraints()?)
            .map_err(|e| classify_media_error(&e))?;
        let stream: web::MediaStream = JsFuture::from(promise)
            .await
            .map_err(|e| classify_media_error(&e))?
            .dyn_into()
            .map_err(|e| AudioError::Unavailable(format!("{:?}", e)))?;

        if ctx.state() == web::AudioContextState::Suspended {
            if let Ok(p) = ctx.resume() {
                let _ = JsFuture::from(p).await;
            }
        }

        let source = ctx
            .create_media_stream_source(&stream)
            .map_err(|e| AudioError::Unavailable(format!("{:?}", e)))?;
        let analyser = create_analyser(&ctx, config)?;
        let sink = create_gain(&ctx, SINK_GAIN, "sink")?;

        let wire = |r: Result<web::AudioNode, JsValue>| {
            r.map(|_| ()).map_err(|e| AudioError::Unavailable(format!("{:?}", e)))
        };
        wire(source.connect_with_audio_node(&analyser))?;
        wire(analyser.connect_with_audio_node(&sink))?;
        wire(sink.connect_with_audio_node(&ctx.destination()))?;

        log::info!(
            "[audio] microphone connected at {} Hz, {} bins",
            ctx.sample_rate(),
            analyser.frequency_bin_count()
        );
        Ok(Self {
            ctx,
            stream,
            source,
            analyser,
            sink,
        })
    }

    pub fn disconnect(&self) {
        let _ = self.source.disconnect();
        let _ = self.analyser.disconnect();
        let _ = self.sink.disconnect();
        for track in self.stream.get_tracks().iter() {
            if let Ok(track) = track.dyn_into::<web::MediaStreamTrack>() {
                track.stop();
            }
        }
        let _ = self.ctx.close();
    }
}

impl SpectrumSource for MicrophoneInput {
    fn sample_rate(&self) -> f32 {
        self.ctx.sample_rate()
    }

    fn bin_count(&self) -> usize {
        self.analyser.frequency_bin_count() as usize
    }

    fn fill_byte_frequency_data(&mut self, out: &mut [u8]) -> Result<(), AudioError> {
        if self.ctx.state() == web::AudioContextState::Closed {
            return Err(AudioError::Read("audio context closed".into()));
        }
        self.analyser.get_byte_frequency_data(out);
        Ok(())
    }
}

impl Drop for MicrophoneInput {
    fn drop(&mut self) {
        self.disconnect();
    }
}
