//! Encoder contract and the built-in encoders.
//!
//! Encoders are fed one frame at a time in presentation order, so a run
//! never needs the whole export in memory. A run is `begin`, `write_frame`
//! for every frame, then `finish`; `abort` drops a run that will not finish.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use montage_core::{ExportError, FrameBuffer, MontageError, Resolution, Result};
use tracing::{debug, info, warn};

use crate::format::{Codec, ExportFormat};

/// Streams rendered frames into a container.
pub trait Encoder: Send {
    /// Short name used in errors and logs.
    fn name(&self) -> &str;

    /// Whether this encoder can produce `format`.
    fn supports(&self, format: &ExportFormat) -> bool;

    /// Start a stream of `total_frames` frames. Discards any unfinished run.
    fn begin(&mut self, format: &ExportFormat, total_frames: u64) -> Result<()>;

    /// Append the next frame.
    fn write_frame(&mut self, frame: FrameBuffer) -> Result<()>;

    /// Close the stream and return the container bytes.
    fn finish(&mut self) -> Result<Vec<u8>>;

    /// Drop the current run and whatever it produced.
    fn abort(&mut self) {}
}

/// Pick the encoder for a format: in-process for Y4M, ffmpeg otherwise.
pub fn encoder_for(format: &ExportFormat) -> Result<Box<dyn Encoder>> {
    match format.codec {
        Codec::Y4m => Ok(Box::new(Y4mEncoder::new())),
        _ => Ok(Box::new(FfmpegEncoder::locate()?)),
    }
}

fn not_started(encoder: &str) -> MontageError {
    ExportError::encoder(encoder, "no stream in progress").into()
}

fn wrong_size(encoder: &str, index: u64, frame: Resolution, stream: Resolution) -> MontageError {
    ExportError::encoder(
        encoder,
        format!("frame {index} is {frame} but the stream is {stream}"),
    )
    .into()
}

// ── YUV4MPEG2 ───────────────────────────────────────────────────

/// Uncompressed YUV4MPEG2 stream, 4:4:4, full-range BT.601.
#[derive(Debug, Default)]
pub struct Y4mEncoder {
    stream: Option<Y4mStream>,
}

#[derive(Debug)]
struct Y4mStream {
    resolution: Resolution,
    out: Vec<u8>,
    frames: u64,
}

impl Y4mEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn header(format: &ExportFormat) -> String {
        format!(
            "YUV4MPEG2 W{} H{} F{}:{} Ip A1:1 C444 XCOLORRANGE=FULL\n",
            format.resolution.width,
            format.resolution.height,
            format.frame_rate.numerator,
            format.frame_rate.denominator
        )
    }

    /// Append one frame as three planes.
    fn append_frame(out: &mut Vec<u8>, frame: &FrameBuffer) {
        let pixels = frame.width as usize * frame.height as usize;
        let data = frame.data();
        out.extend_from_slice(b"FRAME\n");
        let base = out.len();
        out.resize(base + pixels * 3, 0);
        let (y_plane, rest) = out[base..].split_at_mut(pixels);
        let (u_plane, v_plane) = rest.split_at_mut(pixels);
        for (i, px) in data.chunks_exact(4).enumerate() {
            let (y, u, v) = rgb_to_yuv(px[0], px[1], px[2]);
            y_plane[i] = y;
            u_plane[i] = u;
            v_plane[i] = v;
        }
    }
}

/// Full-range BT.601.
pub fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let v = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    let q = |c: f32| c.round().clamp(0.0, 255.0) as u8;
    (q(y), q(u), q(v))
}

impl Encoder for Y4mEncoder {
    fn name(&self) -> &str {
        "y4m"
    }

    fn supports(&self, format: &ExportFormat) -> bool {
        format.codec == Codec::Y4m
    }

    fn begin(&mut self, format: &ExportFormat, _total_frames: u64) -> Result<()> {
        self.stream = Some(Y4mStream {
            resolution: format.resolution,
            out: Self::header(format).into_bytes(),
            frames: 0,
        });
        Ok(())
    }

    fn write_frame(&mut self, frame: FrameBuffer) -> Result<()> {
        let stream = self.stream.as_mut().ok_or_else(|| not_started("y4m"))?;
        if frame.resolution() != stream.resolution {
            return Err(wrong_size("y4m", stream.frames, frame.resolution(), stream.resolution));
        }
        Self::append_frame(&mut stream.out, &frame);
        stream.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        let stream = self.stream.take().ok_or_else(|| not_started("y4m"))?;
        debug!(frames = stream.frames, bytes = stream.out.len(), "y4m stream finished");
        Ok(stream.out)
    }

    fn abort(&mut self) {
        self.stream = None;
    }
}

// ── FFmpeg ──────────────────────────────────────────────────────

/// Frames queued for the ffmpeg writer thread before `write_frame` blocks.
const WRITE_QUEUE: usize = 4;

/// Encodes by piping raw RGBA frames into an `ffmpeg` process.
#[derive(Debug)]
pub struct FfmpegEncoder {
    binary: PathBuf,
    session: Option<FfmpegSession>,
}

/// One running ffmpeg process and the thread feeding its stdin.
#[derive(Debug)]
struct FfmpegSession {
    child: Child,
    output: tempfile::NamedTempFile,
    frames: Sender<FrameBuffer>,
    writer: JoinHandle<std::io::Result<u64>>,
    resolution: Resolution,
    queued: u64,
}

impl FfmpegSession {
    /// Close stdin and wait for ffmpeg to exit.
    fn close(self) -> Result<(u64, tempfile::NamedTempFile)> {
        let Self {
            mut child,
            output,
            frames,
            writer,
            ..
        } = self;
        drop(frames);
        let written = writer
            .join()
            .map_err(|_| ExportError::encoder("ffmpeg", "writer thread panicked"))?;
        let status = child
            .wait()
            .map_err(|e| ExportError::encoder("ffmpeg", format!("failed to wait: {e}")))?;
        let written = written
            .map_err(|e| ExportError::encoder("ffmpeg", format!("failed to write frame: {e}")))?;
        if !status.success() {
            return Err(ExportError::encoder("ffmpeg", format!("exited with {status}")).into());
        }
        Ok((written, output))
    }

    fn kill(self) {
        let Self {
            mut child,
            frames,
            writer,
            ..
        } = self;
        if let Err(e) = child.kill() {
            warn!(error = %e, "Failed to kill ffmpeg");
        }
        drop(frames);
        let _ = writer.join();
        let _ = child.wait();
    }
}

/// Spawn the thread that copies queued frames into ffmpeg's stdin.
/// Dropping stdin at the end closes the pipe.
fn spawn_writer(
    mut stdin: std::process::ChildStdin,
    frames: crossbeam_channel::Receiver<FrameBuffer>,
) -> std::io::Result<JoinHandle<std::io::Result<u64>>> {
    std::thread::Builder::new()
        .name("montage-ffmpeg-writer".into())
        .spawn(move || {
            let mut written = 0u64;
            for frame in frames {
                stdin.write_all(frame.data())?;
                written += 1;
            }
            stdin.flush()?;
            Ok(written)
        })
}

impl FfmpegEncoder {
    /// Find `ffmpeg` on `PATH`.
    pub fn locate() -> Result<Self> {
        which::which("ffmpeg")
            .map(Self::with_binary)
            .map_err(|_| ExportError::EncoderUnavailable("ffmpeg".into()).into())
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            session: None,
        }
    }

    /// Command-line arguments for encoding `format` into `output`.
    pub fn args(format: &ExportFormat, output: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pixel_format".into(),
            "rgba".into(),
            "-video_size".into(),
            format.resolution.to_string(),
            "-framerate".into(),
            format!(
                "{}/{}",
                format.frame_rate.numerator, format.frame_rate.denominator
            ),
            "-i".into(),
            "pipe:0".into(),
        ];

        if let Some(encoder) = format.codec.ffmpeg_encoder() {
            args.extend(["-c:v".into(), encoder.into()]);
        }
        match format.codec {
            Codec::H264 => {
                args.extend(["-crf".into(), format.quality.crf().to_string()]);
                args.extend(["-pix_fmt".into(), "yuv420p".into()]);
            }
            Codec::Vp9 => {
                args.extend(["-crf".into(), (format.quality.crf() + 8).to_string()]);
                args.extend(["-b:v".into(), "0".into()]);
                args.extend(["-pix_fmt".into(), "yuv420p".into()]);
            }
            Codec::ProRes => {
                args.extend([
                    "-profile:v".into(),
                    format.quality.prores_profile().to_string(),
                ]);
                args.extend(["-pix_fmt".into(), "yuv422p10le".into()]);
            }
            Codec::Y4m => {}
        }
        args.extend(["-f".into(), container_muxer(&format.extension).into()]);
        args.push(output.to_string());
        args
    }
}

fn container_muxer(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "mp4" => "mp4",
        "mov" => "mov",
        "webm" => "webm",
        "mkv" => "matroska",
        _ => "yuv4mpegpipe",
    }
}

impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn supports(&self, format: &ExportFormat) -> bool {
        format.codec.ffmpeg_encoder().is_some()
    }

    fn begin(&mut self, format: &ExportFormat, total_frames: u64) -> Result<()> {
        self.abort();
        let output = tempfile::Builder::new()
            .prefix("montage-encode-")
            .suffix(&format!(".{}", format.extension))
            .tempfile()?;
        let output_path = output.path().to_string_lossy().into_owned();
        let args = Self::args(format, &output_path);
        debug!(binary = %self.binary.display(), total_frames, ?args, "Spawning ffmpeg");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ExportError::encoder("ffmpeg", format!("failed to spawn: {e}")))?;

        let (tx, rx) = crossbeam_channel::bounded(WRITE_QUEUE);
        let writer = match child.stdin.take() {
            Some(stdin) => spawn_writer(stdin, rx)
                .map_err(|e| ExportError::encoder("ffmpeg", format!("failed to start writer: {e}"))),
            None => Err(ExportError::encoder("ffmpeg", "failed to open stdin")),
        };
        let writer = match writer {
            Ok(writer) => writer,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        };

        self.session = Some(FfmpegSession {
            child,
            output,
            frames: tx,
            writer,
            resolution: format.resolution,
            queued: 0,
        });
        Ok(())
    }

    fn write_frame(&mut self, frame: FrameBuffer) -> Result<()> {
        let session = self.session.as_mut().ok_or_else(|| not_started("ffmpeg"))?;
        if frame.resolution() != session.resolution {
            return Err(wrong_size(
                "ffmpeg",
                session.queued,
                frame.resolution(),
                session.resolution,
            ));
        }
        if session.frames.send(frame).is_ok() {
            session.queued += 1;
            return Ok(());
        }
        // The writer only hangs up after a failed write; surface its error.
        let session = self.session.take().ok_or_else(|| not_started("ffmpeg"))?;
        match session.close() {
            Ok(_) => Err(ExportError::encoder("ffmpeg", "stopped accepting frames").into()),
            Err(e) => Err(e),
        }
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        let session = self.session.take().ok_or_else(|| not_started("ffmpeg"))?;
        let (frames, output) = session.close()?;

        let mut bytes = Vec::new();
        output.reopen()?.read_to_end(&mut bytes)?;
        info!(bytes = bytes.len(), frames, "ffmpeg encode finished");
        Ok(bytes)
    }

    fn abort(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(queued = session.queued, "Aborting ffmpeg encode");
            session.kill();
        }
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        self.abort();
    }
}
