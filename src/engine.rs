//! Capture-driven analyzer engine and tick pacing.

use crate::capture::{ByteSource, CaptureBackend, CaptureError, ReadStatus};
use crate::config::AnalyzerConfig;
use crate::dsp::{BandPipeline, FrameBuffer};
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_IDLE_DECAY: f32 = 0.9;
pub const DEFAULT_TARGET_FPS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, no stream attached yet.
    Idle,
    Running,
    /// Stopped on request or end of stream. Terminal.
    Stopped,
    /// Attach failed, or the stream closed before delivering any audio. Terminal.
    Failed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        })
    }
}

#[derive(Debug)]
pub enum EngineError {
    Attach(CaptureError),
    InvalidState {
        state: EngineState,
        action: &'static str,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Attach(err) => write!(f, "failed to attach capture stream: {err}"),
            EngineError::InvalidState { state, action } => {
                write!(f, "cannot {action} while engine is {state}")
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Attach(err) => Some(err),
            EngineError::InvalidState { .. } => None,
        }
    }
}

impl From<CaptureError> for EngineError {
    fn from(err: CaptureError) -> Self {
        EngineError::Attach(err)
    }
}

/// Result of one [`Engine::tick`].
#[derive(Debug, PartialEq)]
pub enum Tick<'a> {
    /// Levels to hand to the renderer, with the number of frames analysed this tick.
    Levels { levels: &'a [f32], frames: usize },
    /// Engine is not running; nothing to render.
    Halted(EngineState),
}

pub struct Engine<B: CaptureBackend> {
    backend: B,
    stream: Option<B::Stream>,
    state: EngineState,
    pipeline: BandPipeline,
    frames: FrameBuffer,
    incoming: Vec<u8>,
    idle_decay: f32,
    frames_processed: u64,
    bytes_received: u64,
    stream_ended: bool,
}

impl<B: CaptureBackend> Engine<B> {
    pub fn new(config: AnalyzerConfig, backend: B) -> Self {
        Self {
            frames: FrameBuffer::new(config.frame_bytes()),
            pipeline: BandPipeline::new(config),
            backend,
            stream: None,
            state: EngineState::Idle,
            incoming: Vec::new(),
            idle_decay: DEFAULT_IDLE_DECAY,
            frames_processed: 0,
            bytes_received: 0,
            stream_ended: false,
        }
    }

    /// Factor applied to the displayed levels on ticks without a frame; `1.0` holds them.
    pub fn with_idle_decay(mut self, decay: f32) -> Self {
        self.idle_decay = decay.clamp(0.0, 1.0);
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &AnalyzerConfig {
        self.pipeline.config()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Idle -> Running. A failed attach leaves the engine in `Failed` for good.
    pub fn attach(&mut self, device: &str) -> Result<(), EngineError> {
        if self.state != EngineState::Idle {
            return Err(EngineError::InvalidState {
                state: self.state,
                action: "attach",
            });
        }

        match self.backend.attach(device) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = EngineState::Running;
                info!("[engine] running on '{device}'");
                Ok(())
            }
            Err(err) => {
                self.state = EngineState::Failed;
                warn!("[engine] attach to '{device}' failed: {err}");
                Err(err.into())
            }
        }
    }

    /// Drain available capture bytes, analyse every complete frame, and
    /// return the levels to show. Never blocks on the capture source.
    ///
    /// When the source ends, levels from its last frames are still returned
    /// and the engine halts on the following tick. A source that ends without
    /// ever delivering a byte is treated as a failed attach.
    pub fn tick(&mut self) -> Tick<'_> {
        if self.state != EngineState::Running {
            return Tick::Halted(self.state);
        }
        if self.stream_ended {
            self.halt_on_end();
            return Tick::Halted(self.state);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Tick::Halted(self.state);
        };

        self.incoming.clear();
        let status = stream.read_available(&mut self.incoming);
        self.bytes_received += self.incoming.len() as u64;

        let mut frames = 0;
        let mut incoming: &[u8] = &self.incoming;
        while let Some(frame) = self.frames.pull(std::mem::take(&mut incoming)) {
            self.pipeline.process_bytes(frame);
            frames += 1;
        }
        self.frames_processed += frames as u64;

        if status == ReadStatus::Ended {
            self.stream_ended = true;
            if frames == 0 {
                self.halt_on_end();
                return Tick::Halted(self.state);
            }
        }

        let levels = if frames == 0 {
            self.pipeline.idle(self.idle_decay)
        } else {
            self.pipeline.levels()
        };
        Tick::Levels { levels, frames }
    }

    /// Idle or Running -> Stopped. Releases the stream and discards any
    /// partial frame; terminal states are left as they are.
    pub fn stop(&mut self) {
        self.finish(EngineState::Stopped);
    }

    fn halt_on_end(&mut self) {
        if self.bytes_received == 0 {
            warn!("[engine] capture stream closed before delivering audio");
            self.finish(EngineState::Failed);
        } else {
            info!("[engine] capture stream ended");
            self.finish(EngineState::Stopped);
        }
    }

    fn finish(&mut self, next: EngineState) {
        match self.state {
            EngineState::Running | EngineState::Idle => {}
            EngineState::Stopped | EngineState::Failed => return,
        }

        if let Some(stream) = self.stream.take() {
            self.backend.detach(stream);
        }
        let discarded = self.frames.clear();
        if discarded > 0 {
            debug!("[engine] discarded {discarded} buffered bytes");
        }
        self.state = next;
        info!("[engine] {next} after {} frames", self.frames_processed);
    }
}

impl<B: CaptureBackend> Drop for Engine<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fixed-rate pacing for the render loop. Falling behind skips ahead
/// instead of bursting to catch up.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    next: Instant,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now() + interval,
        }
    }

    pub fn from_fps(fps: u32) -> Self {
        Self::new(Duration::from_secs(1) / fps.max(1))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep until the next deadline.
    pub fn wait(&mut self) {
        let now = Instant::now();
        if self.next > now {
            thread::sleep(self.next - now);
            self.next += self.interval;
        } else {
            self.next = now + self.interval;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::f32::consts::TAU;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        attached: Vec<String>,
        detached: usize,
    }

    /// Replays scripted reads; `None` marks end of stream. With
    /// `close_with_last`, the final chunk arrives together with the end.
    struct ScriptedStream {
        reads: VecDeque<Option<Vec<u8>>>,
        close_with_last: bool,
    }

    impl ByteSource for ScriptedStream {
        fn read_available(&mut self, buf: &mut Vec<u8>) -> ReadStatus {
            match self.reads.pop_front() {
                Some(Some(bytes)) => {
                    buf.extend_from_slice(&bytes);
                    if self.close_with_last && self.reads.is_empty() {
                        ReadStatus::Ended
                    } else {
                        ReadStatus::Open
                    }
                }
                Some(None) => ReadStatus::Ended,
                None => ReadStatus::Open,
            }
        }
    }

    struct FakeBackend {
        reads: Vec<Option<Vec<u8>>>,
        fail: bool,
        close_with_last: bool,
        log: Rc<RefCell<Log>>,
    }

    impl FakeBackend {
        fn new(reads: Vec<Option<Vec<u8>>>) -> (Self, Rc<RefCell<Log>>) {
            let log = Rc::new(RefCell::new(Log::default()));
            let backend = Self {
                reads,
                fail: false,
                close_with_last: false,
                log: Rc::clone(&log),
            };
            (backend, log)
        }
    }

    impl CaptureBackend for FakeBackend {
        type Stream = ScriptedStream;

        fn attach(&mut self, device: &str) -> Result<ScriptedStream, CaptureError> {
            if self.fail {
                return Err(CaptureError::NoMonitorSource);
            }
            self.log.borrow_mut().attached.push(device.to_string());
            Ok(ScriptedStream {
                reads: std::mem::take(&mut self.reads).into(),
                close_with_last: self.close_with_last,
            })
        }

        fn detach(&mut self, _stream: ScriptedStream) {
            self.log.borrow_mut().detached += 1;
        }
    }

    fn config() -> AnalyzerConfig {
        AnalyzerConfig::with_bands(16).expect("valid config")
    }

    fn tone_bytes(config: &AnalyzerConfig, frames: usize) -> Vec<u8> {
        (0..config.frame_size() * frames)
            .flat_map(|n| {
                let t = n as f32 / config.sample_rate();
                let sample = (16_000.0 * (TAU * 1_500.0 * t).sin()) as i16;
                sample.to_le_bytes()
            })
            .collect()
    }

    fn levels_of(tick: Tick<'_>) -> (Vec<f32>, usize) {
        match tick {
            Tick::Levels { levels, frames } => (levels.to_vec(), frames),
            Tick::Halted(state) => panic!("engine halted in state {state}"),
        }
    }

    #[test]
    fn idle_engine_does_not_tick() {
        let (backend, _) = FakeBackend::new(Vec::new());
        let mut engine = Engine::new(config(), backend);
        assert_eq!(engine.tick(), Tick::Halted(EngineState::Idle));
    }

    #[test]
    fn processes_every_complete_frame_in_one_tick() {
        let config = config();
        let bytes = tone_bytes(&config, 3);
        let split = config.frame_bytes() / 2;
        let (backend, log) = FakeBackend::new(vec![
            Some(bytes[..split].to_vec()),
            Some(bytes[split..].to_vec()),
        ]);
        let mut engine = Engine::new(config, backend);
        engine.attach("test.monitor").expect("attach");
        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(log.borrow().attached, vec!["test.monitor".to_string()]);

        let (_, frames) = levels_of(engine.tick());
        assert_eq!(frames, 0);

        let (levels, frames) = levels_of(engine.tick());
        assert_eq!(frames, 3);
        assert_eq!(levels.len(), 16);
        assert!(levels.iter().any(|&l| l > 0.0));
        assert!(levels.iter().all(|l| (0.0..=1.0).contains(l)));
        assert_eq!(engine.frames_processed(), 3);
    }

    #[test]
    fn empty_ticks_decay_levels() {
        let config = config();
        let (backend, _) = FakeBackend::new(vec![Some(tone_bytes(&config, 1))]);
        let mut engine = Engine::new(config, backend).with_idle_decay(0.5);
        engine.attach("dev").expect("attach");

        let (loud, _) = levels_of(engine.tick());
        let (quiet, frames) = levels_of(engine.tick());
        assert_eq!(frames, 0);
        for (a, b) in loud.iter().zip(&quiet) {
            assert!((b - a * 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn end_of_stream_stops_and_detaches() {
        let (backend, log) = FakeBackend::new(vec![Some(vec![0; 10]), None]);
        let mut engine = Engine::new(config(), backend);
        engine.attach("dev").expect("attach");
        let _ = levels_of(engine.tick());
        assert_eq!(engine.tick(), Tick::Halted(EngineState::Stopped));
        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(log.borrow().detached, 1);

        // Terminal: no re-attach, no second detach.
        assert!(matches!(
            engine.attach("dev"),
            Err(EngineError::InvalidState { .. })
        ));
        engine.stop();
        assert_eq!(log.borrow().detached, 1);
    }

    #[test]
    fn stream_closing_before_any_audio_fails() {
        let (backend, log) = FakeBackend::new(vec![None]);
        let mut engine = Engine::new(config(), backend);
        engine.attach("no-such-device.monitor").expect("attach");
        assert_eq!(engine.tick(), Tick::Halted(EngineState::Failed));
        assert_eq!(engine.state(), EngineState::Failed);
        assert_eq!(log.borrow().detached, 1);
        assert_eq!(engine.tick(), Tick::Halted(EngineState::Failed));
    }

    #[test]
    fn final_frames_are_shown_before_halting() {
        let config = config();
        let (mut backend, log) = FakeBackend::new(vec![Some(tone_bytes(&config, 2))]);
        backend.close_with_last = true;
        let mut engine = Engine::new(config, backend);
        engine.attach("dev").expect("attach");

        let (levels, frames) = levels_of(engine.tick());
        assert_eq!(frames, 2);
        assert!(levels.iter().any(|&l| l > 0.0));
        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(log.borrow().detached, 0);

        assert_eq!(engine.tick(), Tick::Halted(EngineState::Stopped));
        assert_eq!(log.borrow().detached, 1);
    }

    #[test]
    fn failed_attach_is_terminal() {
        let (mut backend, log) = FakeBackend::new(Vec::new());
        backend.fail = true;
        let mut engine = Engine::new(config(), backend);
        assert!(matches!(
            engine.attach("missing"),
            Err(EngineError::Attach(CaptureError::NoMonitorSource))
        ));
        assert_eq!(engine.state(), EngineState::Failed);
        assert_eq!(engine.tick(), Tick::Halted(EngineState::Failed));
        assert!(engine.attach("missing").is_err());
        drop(engine);
        assert_eq!(log.borrow().detached, 0);
    }

    #[test]
    fn stop_releases_stream_once() {
        let (backend, log) = FakeBackend::new(vec![Some(vec![1; 7])]);
        let mut engine = Engine::new(config(), backend);
        engine.attach("dev").expect("attach");
        let _ = engine.tick();
        engine.stop();
        assert_eq!(engine.state(), EngineState::Stopped);
        drop(engine);
        assert_eq!(log.borrow().detached, 1);
    }

    #[test]
    fn ticker_paces_waits() {
        let mut ticker = Ticker::new(Duration::from_millis(5));
        let start = Instant::now();
        for _ in 0..3 {
            ticker.wait();
        }
        assert!(start.elapsed() >= Duration::from_millis(15));
        assert_eq!(Ticker::from_fps(50).interval(), Duration::from_millis(20));
    }
}
