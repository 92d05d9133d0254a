//! Still-image and video capture.
//!
//! Screenshots are PNG-encoded with the `image` crate. Video is written
//! by piping raw RGBA frames into an FFmpeg child process producing WebM;
//! the encoder is picked from a preference chain (VP9, then VP8, then the
//! container default) and missing codecs degrade silently.

use anyhow::{anyhow, Context, Result};
use image::{ImageBuffer, RgbaImage};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Save a raw RGBA frame as a PNG under the fixed screenshot filename.
pub fn save_png(path: &Path, width: u32, height: u32, rgba: &[u8]) -> Result<()> {
    let img: RgbaImage = ImageBuffer::from_raw(width, height, rgba.to_vec())
        .ok_or_else(|| anyhow!("frame buffer does not match {width}x{height}"))?;
    img.save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// WebM encoder preference, most preferred first. `None` stands for the
/// FFmpeg container default.
const WEBM_CODECS: [Option<&str>; 3] = [Some("libvpx-vp9"), Some("libvpx"), None];

/// Probe the encoder chain once and return the first available entry.
pub fn pick_webm_codec() -> Option<&'static str> {
    let listing = installed_encoders();
    WEBM_CODECS
        .iter()
        .flatten()
        .copied()
        .find(|codec| encoder_listed(&listing, codec))
}

fn installed_encoders() -> String {
    Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .map(|output| String::from_utf8_lossy(&output.stdout).into_owned())
        .unwrap_or_default()
}

/// Match the encoder name as a whole token in the `-encoders` listing, so
/// `libvpx` does not match a line that only offers `libvpx-vp9`.
fn encoder_listed(listing: &str, name: &str) -> bool {
    listing
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some(name))
}

/// Check if FFmpeg is reachable at all; surfaced in the UI as a label.
pub fn check_ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// Owns one FFmpeg child encoding raw RGBA frames into a WebM file.
pub struct VideoRecorder {
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frames_written: usize,
    child: Option<Child>,
}

impl VideoRecorder {
    pub fn start(output_path: PathBuf, width: u32, height: u32, fps: u32) -> Result<Self> {
        let codec = pick_webm_codec();

        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgba")
            .arg("-s")
            .arg(format!("{width}x{height}"))
            .arg("-r")
            .arg(fps.to_string())
            .arg("-i")
            .arg("-");

        match codec {
            Some("libvpx-vp9") => {
                cmd.arg("-c:v")
                    .arg("libvpx-vp9")
                    .arg("-crf")
                    .arg("24")
                    .arg("-b:v")
                    .arg("0")
                    .arg("-pix_fmt")
                    .arg("yuv420p");
            }
            Some(other) => {
                cmd.arg("-c:v").arg(other).arg("-pix_fmt").arg("yuv420p");
            }
            None => {
                // Let FFmpeg pick whatever the WebM muxer defaults to.
                cmd.arg("-pix_fmt").arg("yuv420p");
            }
        }

        cmd.arg(&output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = cmd
            .spawn()
            .context("spawning ffmpeg; make sure it is installed and on PATH")?;

        Ok(Self {
            output_path,
            width,
            height,
            fps,
            frames_written: 0,
            child: Some(child),
        })
    }

    pub fn write_frame(&mut self, rgba: &[u8]) -> Result<()> {
        let expected = (self.width * self.height * 4) as usize;
        if rgba.len() != expected {
            return Err(anyhow!(
                "frame size mismatch: got {}, expected {expected}",
                rgba.len()
            ));
        }

        let child = self
            .child
            .as_mut()
            .ok_or_else(|| anyhow!("recorder already finished"))?;
        let stdin = child
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow!("encoder stdin closed"))?;
        stdin.write_all(rgba).context("writing frame to encoder")?;
        self.frames_written += 1;
        Ok(())
    }

    /// Close the pipe and wait for the encoder to flush the container.
    pub fn finish(mut self) -> Result<PathBuf> {
        if let Some(mut child) = self.child.take() {
            drop(child.stdin.take());
            let status = child.wait().context("waiting for ffmpeg")?;
            if !status.success() {
                return Err(anyhow!("ffmpeg exited with {:?}", status.code()));
            }
        }
        Ok(std::mem::take(&mut self.output_path))
    }

    pub fn cancel(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for VideoRecorder {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENCODER_LISTING: &str = "\
 Encoders:
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC
 V....D libvpx               libvpx VP8 (codec vp8)
 V....D libvpx-vp9           libvpx VP9 (codec vp9)
 A....D libopus              libopus Opus";

    #[test]
    fn codec_preference_order() {
        assert_eq!(WEBM_CODECS[0], Some("libvpx-vp9"));
        assert_eq!(WEBM_CODECS[1], Some("libvpx"));
        assert_eq!(WEBM_CODECS[2], None);
    }

    #[test]
    fn encoder_listed_matches_whole_names() {
        assert!(encoder_listed(ENCODER_LISTING, "libvpx-vp9"));
        assert!(encoder_listed(ENCODER_LISTING, "libvpx"));
        assert!(!encoder_listed(ENCODER_LISTING, "libaom-av1"));
    }

    #[test]
    fn encoder_listed_needs_an_exact_token() {
        // A build that only ships VP9 must not satisfy a VP8 lookup.
        let vp9_only = " V....D libvpx-vp9           libvpx VP9 (codec vp9)";
        assert!(encoder_listed(vp9_only, "libvpx-vp9"));
        assert!(!encoder_listed(vp9_only, "libvpx"));
        assert!(!encoder_listed("", "libvpx-vp9"));
    }

    #[test]
    fn finish_without_child_returns_output_path() {
        let recorder = VideoRecorder {
            output_path: PathBuf::from("glow_tree.webm"),
            width: 640,
            height: 480,
            fps: 30,
            frames_written: 0,
            child: None,
        };
        let path = recorder.finish().unwrap();
        assert_eq!(path, PathBuf::from("glow_tree.webm"));
    }

    #[test]
    fn save_png_rejects_short_buffer() {
        let dir = std::env::temp_dir().join("glow_tree_test_short.png");
        let err = save_png(&dir, 4, 4, &[0u8; 8]);
        assert!(err.is_err());
    }

    #[test]
    fn save_png_writes_file() {
        let path = std::env::temp_dir().join("glow_tree_test_frame.png");
        let rgba = vec![200u8; 4 * 4 * 4];
        save_png(&path, 4, 4, &rgba).unwrap();
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }
}
