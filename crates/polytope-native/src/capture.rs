use anyhow::{anyhow, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Mono samples shared between the capture callback and the analysis tick.
#[derive(Clone)]
pub struct SampleQueue {
    samples: Arc<Mutex<VecDeque<f32>>>,
    capacity: usize,
    failed: Arc<AtomicBool>,
}

impl SampleQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
            failed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Appends samples, dropping the oldest past capacity.
    pub fn push(&self, mono: impl IntoIterator<Item = f32>) {
        let Ok(mut q) = self.samples.lock() else {
            return;
        };
        for s in mono {
            if q.len() == self.capacity {
                q.pop_front();
            }
            q.push_back(s);
        }
    }

    /// Copies the newest `out.len()` samples into `out`, zero-padding the front
    /// while the queue is still filling.
    pub fn latest(&self, out: &mut [f32]) -> Result<(), String> {
        if self.failed.load(Ordering::Relaxed) {
            return Err("input stream reported an error".into());
        }
        let q = self
            .samples
            .lock()
            .map_err(|_| "sample queue poisoned".to_string())?;
        let n = q.len().min(out.len());
        let pad = out.len() - n;
        out[..pad].iter_mut().for_each(|s| *s = 0.0);
        for (dst, src) in out[pad..].iter_mut().zip(q.iter().skip(q.len() - n)) {
            *dst = *src;
        }
        Ok(())
    }

    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::Relaxed);
    }
}

/// A running input stream; capture stops when this is dropped.
pub struct MicCapture {
    _stream: cpal::Stream,
    pub queue: SampleQueue,
    pub sample_rate_hz: u32,
    pub device_name: String,
}

pub fn open(device_query: Option<&str>, capacity: usize) -> anyhow::Result<MicCapture> {
    let host = cpal::default_host();
    let device = select_input_device(&host, device_query)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".into());
    let supported = device
        .default_input_config()
        .context("get default input config")?;
    let sample_rate_hz = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    let config: cpal::StreamConfig = supported.clone().into();

    let queue = SampleQueue::new(capacity);
    let err_queue = queue.clone();
    let err_fn = move |err| {
        log::error!("[audio] input stream error: {err}");
        err_queue.mark_failed();
    };

    let q = queue.clone();
    let stream = match supported.sample_format() {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _| push_interleaved(data, channels, &q),
            err_fn,
            None,
        )?,
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _| push_interleaved(data, channels, &q),
            err_fn,
            None,
        )?,
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _| push_interleaved(data, channels, &q),
            err_fn,
            None,
        )?,
        fmt => return Err(anyhow!("unsupported sample format: {fmt:?}")),
    };
    stream.play().context("start input stream")?;

    log::info!(
        "[audio] capturing '{}' at {} Hz, {} channel(s)",
        device_name,
        sample_rate_hz,
        channels
    );
    Ok(MicCapture {
        _stream: stream,
        queue,
        sample_rate_hz,
        device_name,
    })
}

fn select_input_device(
    host: &cpal::Host,
    device_query: Option<&str>,
) -> anyhow::Result<cpal::Device> {
    if let Some(want) = device_query.map(|s| s.to_lowercase()) {
        let devices = host
            .input_devices()
            .context("enumerate input devices")?
            .collect::<Vec<_>>();
        return devices
            .into_iter()
            .find(|d| {
                d.name()
                    .map(|n| n.to_lowercase().contains(&want))
                    .unwrap_or(false)
            })
            .ok_or_else(|| anyhow!("no input device matching: {want}"));
    }
    host.default_input_device()
        .ok_or_else(|| anyhow!("no default input device found"))
}

fn push_interleaved<T: Sample<Float = f32> + Copy>(
    data: &[T],
    channels: usize,
    queue: &SampleQueue,
) {
    let channels = channels.max(1);
    queue.push(data.chunks(channels).map(|frame| {
        let acc: f32 = frame.iter().map(|s| s.to_float_sample()).sum();
        acc / frame.len() as f32
    }));
}
