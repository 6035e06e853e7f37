//! Audio backend driver: block-cadenced invocation of the voice
//! scheduler and orbit mixer, PCM to the host sink, and a lock-free-ish
//! visualizer feed.
//!
//! The `cpal` wiring follows the `make_stream` shape in
//! `modular/src/audio.rs` (`build_output_stream` + a per-frame render
//! closure); `AudioSink` is the seam that lets the driver run without a
//! real device under test.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use engine_core::dsp::utils::soft_clip_to_i16;
use parking_lot::Mutex;
use rtrb::{Consumer, Producer, RingBuffer};
use rustfft::{FftPlanner, num_complex::Complex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::bridge::BackBridge;
use crate::error::DeviceError;
use crate::orbits::{DEFAULT_MAX_ORBITS, OrbitMixer};
use crate::voice_scheduler::VoiceScheduler;

/// Consumes fixed-size interleaved stereo i16 blocks. `cpal`'s stream
/// callback is one implementation; tests use an in-memory one.
pub trait AudioSink: Send {
    fn write_block(&mut self, interleaved: &[i16]);
}

/// Most recent pre-master waveform and spectrum, read without allocation by
/// a UI visualizer. Written once per block by the driver, read under a
/// shared lock -- not wait-free, but bounded to a `try_lock`-or-skip read so
/// a slow UI thread never stalls the driver.
pub struct VisualizerBuffer {
    waveform: Mutex<Vec<f32>>,
    spectrum: Mutex<Vec<f32>>,
}

impl VisualizerBuffer {
    fn new(block_frames: usize) -> Self {
        Self {
            waveform: Mutex::new(vec![0.0; block_frames]),
            spectrum: Mutex::new(vec![0.0; block_frames / 2]),
        }
    }

    /// Copy the latest waveform into `out`; returns the number of frames
    /// copied. Never allocates.
    pub fn read_waveform(&self, out: &mut [f32]) -> usize {
        let Some(buf) = self.waveform.try_lock() else { return 0 };
        let n = out.len().min(buf.len());
        out[..n].copy_from_slice(&buf[..n]);
        n
    }

    pub fn read_spectrum(&self, out: &mut [f32]) -> usize {
        let Some(buf) = self.spectrum.try_lock() else { return 0 };
        let n = out.len().min(buf.len());
        out[..n].copy_from_slice(&buf[..n]);
        n
    }
}

pub struct AudioBackend {
    scheduler: VoiceScheduler,
    orbits: OrbitMixer,
    bridge: BackBridge,
    sample_rate: f64,
    block_frames: usize,
    frame_counter: u64,
    visualizer: Arc<VisualizerBuffer>,
    fft_planner: FftPlanner<f32>,
    scratch: Vec<Complex<f32>>,
}

impl AudioBackend {
    pub fn new(sample_rate: u32, block_frames: usize, bridge: BackBridge) -> Self {
        Self {
            scheduler: VoiceScheduler::new(sample_rate as f64, block_frames),
            orbits: OrbitMixer::new(block_frames, sample_rate as f64, DEFAULT_MAX_ORBITS),
            bridge,
            sample_rate: sample_rate as f64,
            block_frames,
            frame_counter: 0,
            visualizer: Arc::new(VisualizerBuffer::new(block_frames)),
            fft_planner: FftPlanner::new(),
            scratch: vec![Complex::new(0.0, 0.0); block_frames],
        }
    }

    pub fn visualizer(&self) -> Arc<VisualizerBuffer> {
        self.visualizer.clone()
    }

    /// Process one block and write it to `sink` as interleaved stereo i16.
    /// The authoritative frame counter only ever advances here.
    pub fn process_block(&mut self, sink: &mut dyn AudioSink) {
        self.scheduler.process(self.frame_counter, &mut self.bridge, &mut self.orbits);

        let (left, right) = self.orbits.process_and_mix();

        self.update_visualizer(&left);

        let mut interleaved = Vec::with_capacity(self.block_frames * 2);
        for i in 0..self.block_frames {
            interleaved.push(soft_clip_to_i16(left[i]));
            interleaved.push(soft_clip_to_i16(right[i]));
        }
        sink.write_block(&interleaved);

        self.frame_counter += self.block_frames as u64;
    }

    fn update_visualizer(&mut self, left: &[f64]) {
        if let Some(mut waveform) = self.visualizer.waveform.try_lock() {
            for (dst, src) in waveform.iter_mut().zip(left.iter()) {
                *dst = *src as f32;
            }
        }

        for (slot, sample) in self.scratch.iter_mut().zip(left.iter()) {
            *slot = Complex::new(*sample as f32, 0.0);
        }
        let fft = self.fft_planner.plan_fft_forward(self.block_frames);
        fft.process(&mut self.scratch);

        if let Some(mut spectrum) = self.visualizer.spectrum.try_lock() {
            let n = spectrum.len().min(self.scratch.len() / 2);
            for i in 0..n {
                spectrum[i] = self.scratch[i].norm() / self.block_frames as f32;
            }
        }
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }
}

/// A sink that appends every block to an in-memory buffer, for tests.
#[derive(Default)]
pub struct BufferSink {
    pub samples: Vec<i16>,
}

impl AudioSink for BufferSink {
    fn write_block(&mut self, interleaved: &[i16]) {
        self.samples.extend_from_slice(interleaved);
    }
}

/// Sized for a few blocks of lookahead between the render thread and the
/// `cpal` callback; generous enough that the render thread's ~`block_frames`
/// cadence never starves the callback on a merely busy (not stalled) host.
const RING_CAPACITY_FRAMES: usize = 1 << 14;

/// Pushes rendered blocks into a ring buffer consumed by the `cpal` output
/// callback. Lives entirely on the render thread.
struct RingSink {
    tx: Producer<i16>,
}

impl AudioSink for RingSink {
    fn write_block(&mut self, interleaved: &[i16]) {
        for &sample in interleaved {
            // Backs off rather than drops: the render thread runs ahead of
            // playback by design (see `RING_CAPACITY_FRAMES`), so a full ring
            // means it is far enough ahead to simply wait.
            while self.tx.push(sample).is_err() {
                std::thread::yield_now();
            }
        }
    }
}

/// Owns the `cpal` device, the render thread, and the ring buffer between
/// them. Dropping it stops the stream and joins the render thread.
pub struct CpalAudioSink {
    _stream: cpal::Stream,
    running: Arc<AtomicBool>,
    render_thread: Option<std::thread::JoinHandle<()>>,
}

impl CpalAudioSink {
    /// Opens the default output device and spawns a render thread driving
    /// `backend` at its own `block_frames` cadence into a ring buffer the
    /// `cpal` callback drains. Shaped after `make_stream`'s
    /// `build_output_stream` + `err_fn` pairing, adapted from its per-frame
    /// pull model to this crate's fixed-block push model.
    pub fn open(mut backend: AudioBackend) -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(DeviceError::NoDevice)?;
        let supported = device
            .default_output_config()
            .map_err(|e| DeviceError::UnsupportedConfig(e.to_string()))?;

        if supported.channels() != 2 {
            return Err(DeviceError::UnsupportedConfig(format!(
                "expected 2-channel output, device offers {}",
                supported.channels()
            )));
        }

        let config = supported.config();
        let sample_format = supported.sample_format();
        let (tx, rx) = RingBuffer::new(RING_CAPACITY_FRAMES);
        let running = Arc::new(AtomicBool::new(true));

        let render_running = running.clone();
        let render_thread = std::thread::spawn(move || {
            let mut sink = RingSink { tx };
            while render_running.load(Ordering::Acquire) {
                backend.process_block(&mut sink);
            }
        });

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_output_stream::<f32>(&device, &config, rx)?,
            cpal::SampleFormat::I16 => build_output_stream::<i16>(&device, &config, rx)?,
            cpal::SampleFormat::U16 => build_output_stream::<u16>(&device, &config, rx)?,
            other => {
                return Err(DeviceError::UnsupportedConfig(format!("{other:?}")));
            }
        };
        stream.play().map_err(|e| DeviceError::PlayStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            render_thread: Some(render_thread),
        })
    }
}

impl Drop for CpalAudioSink {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.render_thread.take() {
            let _ = handle.join();
        }
    }
}

fn build_output_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut rx: Consumer<i16>,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample + FromSample<i16>,
{
    let err_fn = |err| tracing::error!(%err, "audio output stream error");

    device
        .build_output_stream(
            config,
            move |output: &mut [T], _info: &cpal::OutputCallbackInfo| {
                for slot in output.iter_mut() {
                    let sample = rx.pop().unwrap_or(0);
                    *slot = T::from_sample(sample);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| DeviceError::BuildStream(e.to_string()))
}
