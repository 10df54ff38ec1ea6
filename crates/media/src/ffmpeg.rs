//! ffmpeg/ffprobe backed video input and output.
//!
//! Decoding pipes `ffmpeg -f rawvideo -pix_fmt rgb24` from a child process
//! and reads exactly `width * height * 3` bytes per frame. Encoding is the
//! mirror image: raw rgb24 frames are written to ffmpeg's stdin.

use std::ffi::OsString;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use image::RgbImage;
use reelstab_common::{parse_frame_rate, FrameClock, StabError, StabResult};
use reelstab_model::{Frame, VideoInfo};

use crate::source::{FrameSource, VideoInput};

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Probe the first video stream of `path`.
pub fn probe_video(path: &Path) -> StabResult<VideoInfo> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,nb_frames",
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .output()
        .map_err(|e| StabError::input_unavailable(path, format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(StabError::input_unavailable(
            path,
            format!("ffprobe failed ({}): {}", output.status, stderr.trim()),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .find_map(parse_probe_line)
        .ok_or_else(|| StabError::input_unavailable(path, "no video stream found"))
}

/// Parse one `width,height,rate[,nb_frames]` line from ffprobe.
fn parse_probe_line(line: &str) -> Option<VideoInfo> {
    let mut fields = line.trim().split(',');
    let width = fields.next()?.trim().parse::<u32>().ok()?;
    let height = fields.next()?.trim().parse::<u32>().ok()?;
    let fps = parse_frame_rate(fields.next()?)?;
    let frame_count = fields
        .next()
        .and_then(|n| n.trim().parse::<u64>().ok())
        .filter(|&n| n > 0);
    if width == 0 || height == 0 {
        return None;
    }
    Some(VideoInfo {
        width,
        height,
        fps,
        frame_count,
    })
}

/// Collect a child's stderr on a background thread so the pipe never fills.
fn drain_stderr(child: &mut Child) -> Option<JoinHandle<String>> {
    let stderr = child.stderr.take()?;
    Some(std::thread::spawn(move || {
        let mut reader = BufReader::new(stderr);
        let mut output = String::new();
        match reader.read_to_string(&mut output) {
            Ok(_) => output,
            Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
        }
    }))
}

fn join_stderr(task: Option<JoinHandle<String>>) -> String {
    task.map(|t| {
        t.join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
    })
    .unwrap_or_default()
}

/// A video file decoded through ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegInput {
    path: PathBuf,
}

impl FfmpegInput {
    /// Fails with `InputUnavailable` when `path` is not a readable file.
    pub fn new(path: impl Into<PathBuf>) -> StabResult<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(StabError::input_unavailable(&path, "no such file"));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VideoInput for FfmpegInput {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn info(&self) -> StabResult<VideoInfo> {
        probe_video(&self.path)
    }

    fn open(&self) -> StabResult<Box<dyn FrameSource + '_>> {
        let info = self.info()?;
        Ok(Box::new(FfmpegSource::spawn(&self.path, info)?))
    }
}

/// Decoder arguments for `path`.
///
/// Rotation metadata is ignored so frames keep the stored size that
/// ffprobe reports.
fn decode_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-nostdin", "-noautorotate", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_os_string());
    args.extend(
        ["-map", "0:v:0", "-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"]
            .into_iter()
            .map(OsString::from),
    );
    args
}

/// Raw rgb24 frames read from an ffmpeg child process.
pub struct FfmpegSource {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    clock: FrameClock,
    position: u64,
    finished: bool,
}

impl FfmpegSource {
    fn spawn(path: &Path, info: VideoInfo) -> StabResult<Self> {
        let mut child = Command::new("ffmpeg")
            .args(decode_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StabError::input_unavailable(path, format!("failed to start ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StabError::input_unavailable(path, "failed to capture ffmpeg stdout"))?;
        let stderr_task = drain_stderr(&mut child);

        tracing::debug!(
            pid = child.id(),
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            "ffmpeg decoder started"
        );

        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            stderr_task,
            width: info.width,
            height: info.height,
            clock: FrameClock::new(info.fps),
            position: 0,
            finished: false,
        })
    }

    /// Reap the child once stdout is exhausted.
    fn finish(&mut self) -> StabResult<()> {
        self.finished = true;
        let status = self
            .child
            .wait()
            .map_err(|e| StabError::decode("decode", self.position, format!("failed to wait on ffmpeg: {e}")))?;
        let stderr = join_stderr(self.stderr_task.take());

        if status.success() {
            return Ok(());
        }
        if self.position == 0 {
            return Err(StabError::decode(
                "decode",
                0,
                format!("ffmpeg exited with {status}: {}", stderr.trim()),
            ));
        }
        tracing::warn!(
            frames = self.position,
            status = %status,
            stderr = stderr.trim(),
            "ffmpeg exited with an error after decoding frames; treating as end of stream"
        );
        Ok(())
    }
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> StabResult<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.width as usize * self.height as usize * 3];
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(StabError::decode(
                        "decode",
                        self.position,
                        format!("failed reading ffmpeg output: {e}"),
                    ))
                }
            }
        }

        if filled < buf.len() {
            if filled > 0 {
                tracing::warn!(
                    frame = self.position,
                    bytes = filled,
                    "Dropping truncated final frame"
                );
            }
            self.finish()?;
            return Ok(None);
        }

        let image = RgbImage::from_raw(self.width, self.height, buf).ok_or_else(|| {
            StabError::decode("decode", self.position, "frame buffer size mismatch")
        })?;
        let index = self.position;
        self.position += 1;
        Ok(Some(Frame::new(index, self.clock.timestamp(index), image)))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Encodes frames into a video file by piping rgb24 into ffmpeg.
pub struct FfmpegEncoder {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stderr_task: Option<JoinHandle<String>>,
    path: PathBuf,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl FfmpegEncoder {
    pub fn spawn(path: &Path, width: u32, height: u32, fps: f64) -> StabResult<Self> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-v".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-s".into(),
            format!("{width}x{height}"),
            "-r".into(),
            format!("{fps}"),
            "-i".into(),
            "-".into(),
        ];
        args.extend(codec_args_for(path));
        args.push(path.display().to_string());

        tracing::debug!(args = ?args, "Running ffmpeg encoder");
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StabError::encode(0, format!("failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StabError::encode(0, "failed to capture ffmpeg stdin"))?;
        let stderr_task = drain_stderr(&mut child);

        Ok(Self {
            child,
            stdin: Some(BufWriter::new(stdin)),
            stderr_task,
            path: path.to_path_buf(),
            width,
            height,
            frames_written: 0,
        })
    }

    pub fn write_frame(&mut self, image: &RgbImage, frame_index: u64) -> StabResult<()> {
        if image.dimensions() != (self.width, self.height) {
            return Err(StabError::encode(
                frame_index,
                format!(
                    "frame is {:?}, encoder expects {}x{}",
                    image.dimensions(),
                    self.width,
                    self.height
                ),
            ));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| StabError::encode(frame_index, "encoder already closed"))?;
        stdin
            .write_all(image.as_raw())
            .map_err(|e| StabError::encode(frame_index, format!("ffmpeg stdin write failed: {e}")))?;
        self.frames_written += 1;
        Ok(())
    }

    /// Close the input and wait for ffmpeg to finish the file.
    pub fn finish(mut self) -> StabResult<PathBuf> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin
                .flush()
                .map_err(|e| StabError::encode(self.frames_written, format!("ffmpeg stdin flush failed: {e}")))?;
        }
        let status = self
            .child
            .wait()
            .map_err(|e| StabError::encode(self.frames_written, format!("failed to wait on ffmpeg: {e}")))?;
        let stderr = join_stderr(self.stderr_task.take());
        if !status.success() {
            return Err(StabError::encode(
                self.frames_written,
                format!("ffmpeg encode failed (status {status}): {}", stderr.trim()),
            ));
        }
        tracing::info!(
            path = %self.path.display(),
            frames = self.frames_written,
            "Wrote stabilized video"
        );
        Ok(self.path.clone())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Codec arguments chosen by output container.
fn codec_args_for(path: &Path) -> Vec<String> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let args: &[&str] = match ext.as_str() {
        "avi" => &["-c:v", "mjpeg", "-q:v", "3"],
        "webm" => &["-c:v", "libvpx-vp9", "-b:v", "0", "-crf", "32"],
        _ => &[
            "-vf",
            "scale=trunc(iw/2)*2:trunc(ih/2)*2",
            "-c:v",
            "libx264",
            "-preset",
            "medium",
            "-crf",
            "18",
            "-pix_fmt",
            "yuv420p",
        ],
    };
    args.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_line() {
        let info = parse_probe_line("1920,1080,30000/1001,450").unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert!((info.fps - 29.97).abs() < 0.01);
        assert_eq!(info.frame_count, Some(450));
    }

    #[test]
    fn test_parse_probe_line_without_frame_count() {
        let info = parse_probe_line("640,480,25/1,N/A").unwrap();
        assert_eq!(info.fps, 25.0);
        assert_eq!(info.frame_count, None);
        assert!(parse_probe_line("640,480,25").is_some());
    }

    #[test]
    fn test_parse_probe_line_rejects_garbage() {
        assert!(parse_probe_line("").is_none());
        assert!(parse_probe_line("0,480,25/1").is_none());
        assert!(parse_probe_line("640,480,0/0").is_none());
    }

    #[test]
    fn test_missing_input_is_unavailable() {
        let err = FfmpegInput::new("/definitely/not/here.mp4").unwrap_err();
        assert!(matches!(err, StabError::InputUnavailable { .. }));
    }

    #[test]
    fn test_decode_disables_autorotate_before_input() {
        let args = decode_args(Path::new("portrait.mov"));
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert!(pos("-noautorotate") < pos("-i"));
        assert_eq!(args[pos("-i") + 1], OsString::from("portrait.mov"));
        assert_eq!(args.last(), Some(&OsString::from("-")));
    }

    #[test]
    fn test_codec_args_follow_extension() {
        assert!(codec_args_for(Path::new("out.avi")).contains(&"mjpeg".to_string()));
        assert!(codec_args_for(Path::new("out.MP4")).contains(&"libx264".to_string()));
    }
}
