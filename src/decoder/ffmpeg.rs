use crate::decoder::pump::PumpDecoder;
use crate::decoder::{DecoderFactory, MediaDecoder};
use crate::foundation::error::ReelflowResult;
use crate::media::clip::MediaSource;

/// Factory for decoders that stream raw frames out of an `ffmpeg` subprocess.
///
/// Requires the `media-ffmpeg` feature; without it every open fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegDecoderFactory;

impl DecoderFactory for FfmpegDecoderFactory {
    fn create(&self, _source: &MediaSource) -> ReelflowResult<Box<dyn MediaDecoder>> {
        Ok(Box::new(PumpDecoder::new(imp::open, None)))
    }
}

#[cfg(feature = "media-ffmpeg")]
mod imp {
    use std::io::Read as _;
    use std::path::PathBuf;
    use std::process::{Child, ChildStdout, Command, Stdio};

    use crate::decoder::pump::FrameSource;
    use crate::decoder::{DecoderConfig, StreamFormat};
    use crate::foundation::core::Fps;
    use crate::foundation::error::{ReelflowError, ReelflowResult};

    pub(super) fn open(cfg: &DecoderConfig) -> ReelflowResult<Box<dyn FrameSource>> {
        let uri = &cfg.source.uri;
        let path = PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri));
        if !path.exists() {
            return Err(ReelflowError::decoder(format!(
                "media file '{}' does not exist",
                path.display()
            )));
        }
        let mut src = FfmpegSource {
            path,
            fps: cfg.fps,
            format: cfg.format,
            child: None,
        };
        src.spawn_at(cfg.range.start.0)?;
        Ok(Box::new(src))
    }

    struct FfmpegSource {
        path: PathBuf,
        fps: Fps,
        format: StreamFormat,
        child: Option<(Child, ChildStdout)>,
    }

    impl FfmpegSource {
        fn spawn_at(&mut self, frame: u64) -> ReelflowResult<()> {
            self.kill();
            let start = self.fps.frames_to_secs(frame);
            let mut cmd = Command::new("ffmpeg");
            cmd.args(["-v", "error", "-ss", &format!("{start:.9}")])
                .arg("-i")
                .arg(&self.path);
            match self.format {
                StreamFormat::Video { width, height } => {
                    cmd.args([
                        "-an",
                        "-vf",
                        &format!("scale={width}:{height},fps={}/{}", self.fps.num, self.fps.den),
                        "-f",
                        "rawvideo",
                        "-pix_fmt",
                        "rgba",
                        "pipe:1",
                    ]);
                }
                StreamFormat::Audio { format, .. } => {
                    cmd.args([
                        "-vn",
                        "-f",
                        "f32le",
                        "-acodec",
                        "pcm_f32le",
                        "-ac",
                        &format.channels.to_string(),
                        "-ar",
                        &format.sample_rate.to_string(),
                        "pipe:1",
                    ]);
                }
            }
            let mut child = cmd
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| ReelflowError::decoder(format!("failed to run ffmpeg: {e}")))?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| ReelflowError::decoder("ffmpeg stdout is not piped"))?;
            self.child = Some((child, stdout));
            Ok(())
        }

        fn kill(&mut self) {
            if let Some((mut child, _)) = self.child.take() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }

    impl FrameSource for FfmpegSource {
        fn seek(&mut self, frame: u64) -> ReelflowResult<()> {
            self.spawn_at(frame)
        }

        fn read_frame(&mut self, out: &mut [u8]) -> ReelflowResult<bool> {
            let Some((_, stdout)) = self.child.as_mut() else {
                return Ok(false);
            };
            match stdout.read_exact(out) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
                Err(e) => Err(ReelflowError::decoder(format!(
                    "ffmpeg read failed for '{}': {e}",
                    self.path.display()
                ))),
            }
        }
    }

    impl Drop for FfmpegSource {
        fn drop(&mut self) {
            self.kill();
        }
    }
}

#[cfg(not(feature = "media-ffmpeg"))]
mod imp {
    use crate::decoder::DecoderConfig;
    use crate::decoder::pump::FrameSource;
    use crate::foundation::error::{ReelflowError, ReelflowResult};

    pub(super) fn open(_cfg: &DecoderConfig) -> ReelflowResult<Box<dyn FrameSource>> {
        Err(ReelflowError::decoder(
            "file media requires the 'media-ffmpeg' feature",
        ))
    }
}
