use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use anyhow::{bail, Context, Result};
use image::RgbImage;
use tracing::{debug, info};

/// Whether a system ffmpeg binary is reachable on PATH.
pub fn is_ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Encodes video frames by piping raw RGB24 data into the ffmpeg CLI.
///
/// Output is libx264 / yuv420p MP4, so the frame dimensions must be even.
pub struct VideoEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
    frames_written: u64,
    out_path: PathBuf,
}

impl VideoEncoder {
    /// Open the output file and spawn the encoder process.
    pub fn open(path: &Path, width: u32, height: u32, fps: f64) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("output dimensions must be non-zero, got {width}x{height}");
        }
        if width % 2 != 0 || height % 2 != 0 {
            bail!("output dimensions must be even for yuv420p mp4, got {width}x{height}");
        }
        if fps <= 0.0 {
            bail!("output frame rate must be positive, got {fps}");
        }
        if !is_ffmpeg_available() {
            bail!("ffmpeg is required for video encoding but was not found on PATH");
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create output directory {}", parent.display())
                })?;
            }
        }

        info!(?path, width, height, fps, "spawning ffmpeg encoder process");

        let mut child = Command::new("ffmpeg")
            .args(["-y", "-v", "error"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{width}x{height}")])
            .args(["-r", &format!("{fps}")])
            .args(["-i", "pipe:0"])
            .args(["-an", "-c:v", "libx264", "-pix_fmt", "yuv420p"])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to spawn ffmpeg — is ffmpeg installed?")?;

        let stdin = child.stdin.take().context("ffmpeg stdin not available")?;

        info!(?path, "video encoder opened");

        Ok(Self {
            child,
            stdin: Some(stdin),
            width,
            height,
            frames_written: 0,
            out_path: path.to_path_buf(),
        })
    }

    /// Write one frame to the encoder pipe. The frame must match the encoder
    /// dimensions exactly; the pipeline resizes before writing.
    pub fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        let (w, h) = image.dimensions();
        if (w, h) != (self.width, self.height) {
            bail!(
                "frame size {w}x{h} does not match encoder size {}x{}",
                self.width,
                self.height,
            );
        }

        let stdin = self
            .stdin
            .as_mut()
            .context("video encoder already finished")?;
        stdin
            .write_all(image.as_raw())
            .context("failed to write frame to ffmpeg pipe")?;

        self.frames_written += 1;
        debug!(frame = self.frames_written, "encoded frame");
        Ok(())
    }

    /// Close the pipe and wait for ffmpeg to finalize the container.
    ///
    /// Skipping this leaves a truncated output file, so a normal run must
    /// call it; `Drop` only reaps the process.
    pub fn finish(&mut self) -> Result<()> {
        drop(self.stdin.take());

        let status = self
            .child
            .wait()
            .context("failed to wait for ffmpeg encoder")?;
        if !status.success() {
            let mut stderr = String::new();
            if let Some(pipe) = self.child.stderr.as_mut() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            bail!("ffmpeg encoder exited with {status}: {}", stderr.trim());
        }

        info!(
            frames = self.frames_written,
            path = %self.out_path.display(),
            "video encoder finished"
        );
        Ok(())
    }
}

impl Drop for VideoEncoder {
    fn drop(&mut self) {
        // finish() already reaped the process when it ran; this path only
        // covers early exits.
        if self.stdin.is_some() {
            drop(self.stdin.take());
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
