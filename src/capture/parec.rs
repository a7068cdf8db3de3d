//! Capture through a `parec` child process.
//!
//! A reader thread blocks on the child's stdout and forwards chunks over a
//! bounded channel; the engine drains that channel with `try_recv`, so a
//! silent or stalled recorder never blocks a tick.
//!
//! `parec` reports an unknown device by exiting shortly after it starts, so
//! attach waits briefly for either audio or an exit before returning.

use super::{ByteSource, CaptureBackend, CaptureError, ReadStatus, spawn_error};
use async_channel::{Receiver, Sender, TryRecvError};
use std::io::{ErrorKind, Read};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const PAREC: &str = "parec";
const READ_CHUNK: usize = 4_096;
const CHANNEL_CAPACITY: usize = 64;
const LATENCY_MSEC: u32 = 10;
const STARTUP_GRACE: Duration = Duration::from_millis(250);
const STARTUP_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct ParecBackend {
    sample_rate: u32,
}

impl ParecBackend {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate: sample_rate.round().max(1.0) as u32,
        }
    }

    fn command(&self, device: &str) -> Command {
        let mut command = Command::new(PAREC);
        command
            .arg(format!("--rate={}", self.sample_rate))
            .arg("--channels=1")
            .arg("--format=s16le")
            .arg(format!("--device={device}"))
            .arg(format!("--latency-msec={LATENCY_MSEC}"))
            .env("PULSE_LATENCY_MSEC", LATENCY_MSEC.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        command
    }
}

impl CaptureBackend for ParecBackend {
    type Stream = ParecStream;

    fn attach(&mut self, device: &str) -> Result<ParecStream, CaptureError> {
        let mut child = self
            .command(device)
            .spawn()
            .map_err(|err| spawn_error(PAREC, err))?;

        let Some(stdout) = child.stdout.take() else {
            reap(&mut child);
            return Err(CaptureError::Io(std::io::Error::other(
                "recorder stdout not captured",
            )));
        };

        let (sender, receiver) = async_channel::bounded(CHANNEL_CAPACITY);
        let reader = match thread::Builder::new()
            .name("termblip-capture".into())
            .spawn(move || forward_loop(stdout, sender))
        {
            Ok(handle) => handle,
            Err(err) => {
                reap(&mut child);
                return Err(CaptureError::Io(err));
            }
        };

        let mut stream = ParecStream {
            child,
            chunks: receiver,
            reader: Some(reader),
        };
        // Dropping the stream on error reaps the child and joins the reader.
        await_startup(&mut stream.child, &stream.chunks, STARTUP_GRACE)?;

        info!(
            "[capture] recording '{device}' at {} Hz (pid {})",
            self.sample_rate,
            stream.child.id()
        );
        Ok(stream)
    }

    fn detach(&mut self, mut stream: ParecStream) {
        stream.shutdown();
    }
}

#[derive(Debug)]
pub struct ParecStream {
    child: Child,
    chunks: Receiver<Vec<u8>>,
    reader: Option<thread::JoinHandle<()>>,
}

impl ParecStream {
    fn shutdown(&mut self) {
        self.chunks.close();
        reap(&mut self.child);
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("[capture] reader thread panicked");
            }
        }
    }
}

impl ByteSource for ParecStream {
    fn read_available(&mut self, buf: &mut Vec<u8>) -> ReadStatus {
        loop {
            match self.chunks.try_recv() {
                Ok(chunk) => buf.extend_from_slice(&chunk),
                Err(TryRecvError::Empty) => return ReadStatus::Open,
                Err(TryRecvError::Closed) => return ReadStatus::Ended,
            }
        }
    }
}

impl Drop for ParecStream {
    fn drop(&mut self) {
        if self.reader.is_some() {
            self.shutdown();
        }
    }
}

fn forward_loop(mut stdout: ChildStdout, sender: Sender<Vec<u8>>) {
    let mut forwarded: u64 = 0;
    loop {
        let mut chunk = vec![0u8; READ_CHUNK];
        match stdout.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => {
                chunk.truncate(read);
                forwarded += read as u64;
                if sender.send_blocking(chunk).is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!("[capture] recorder read failed: {err}");
                break;
            }
        }
    }
    debug!("[capture] reader finished after {forwarded} bytes");
}

/// Returns once audio has arrived or `grace` has passed with the recorder
/// still running. An exit inside that window means the device was rejected.
fn await_startup(
    child: &mut Child,
    chunks: &Receiver<Vec<u8>>,
    grace: Duration,
) -> Result<(), CaptureError> {
    let deadline = Instant::now() + grace;
    loop {
        if !chunks.is_empty() {
            return Ok(());
        }
        match child.try_wait() {
            Ok(Some(status)) => {
                return Err(CaptureError::CommandFailed {
                    tool: PAREC,
                    status: status.to_string(),
                });
            }
            Ok(None) => {}
            Err(err) => return Err(CaptureError::Io(err)),
        }
        if Instant::now() >= deadline {
            return Ok(());
        }
        thread::sleep(STARTUP_POLL);
    }
}

fn reap(child: &mut Child) {
    if let Err(err) = child.kill() {
        // Already exited is fine; anything else is worth a note.
        if err.kind() != ErrorKind::InvalidInput {
            debug!("[capture] kill failed: {err}");
        }
    }
    if let Err(err) = child.wait() {
        warn!("[capture] failed to reap recorder: {err}");
    }
}
