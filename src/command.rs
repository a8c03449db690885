use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::debug;

use crate::config::CONFIG;
use crate::error::{ClipError, ClipResult};
use crate::geometry::CenterCrop;
use crate::planner::Segment;

/// The external media collaborators: retrieval, probing, and per-clip
/// encoding. The processor is written against this trait so its pipeline
/// can run in tests without the real subprocesses.
pub trait Media {
    fn fetch(&self, url: &str, dir: &Path) -> ClipResult<Download>;
    fn probe(&self, path: &Path) -> ClipResult<Metadata>;
    fn encode_clip(
        &self,
        source: &Path,
        segment: &Segment,
        crop: &CenterCrop,
        output: &Path,
    ) -> ClipResult<()>;
}

pub struct Download {
    pub path: PathBuf,
    pub title: String,
}

#[derive(Debug, Clone, Copy)]
pub struct Metadata {
    pub width: u32,
    pub height: u32,
    pub duration: f64,
}

/// Shells out to yt-dlp, ffprobe and ffmpeg.
pub struct Tools;

const ENCODE_ARGUMENTS: &'static str = "-ss $START -to $END -i $INPUT -vf $FILTER -r $FPS -c:v libx264 -c:a aac -map_metadata -1 -y $OUTPUT";

fn run_command(executable: &str, arguments: Vec<String>, descriptor: &str) -> Result<Output, String> {
    let output = Command::new(executable)
        .args(arguments)
        .output()
        .map_err(|e| format!("{descriptor} could not be started: {e}"))?;

    if !output.status.success() {
        return match String::from_utf8(output.stderr) {
            Ok(text) => Err(format!("{descriptor} failed\n\n{text}")),
            Err(_) => Err(format!("{descriptor} failed and the output was not UTF-8")),
        };
    }

    Ok(output)
}

fn build_fetch_arguments(url: &str, dir: &Path) -> Vec<String> {
    // Player-client spoofing and the Android user agent keep YouTube's
    // throttling off our back; see yt-dlp's extractor docs.
    vec![
        "--quiet".to_owned(),
        "--no-warnings".to_owned(),
        "--no-playlist".to_owned(),
        "-f".to_owned(),
        format!("best[height<={}]", CONFIG.max_source_height),
        "--extractor-args".to_owned(),
        "youtube:player_client=android,ios,web".to_owned(),
        "--user-agent".to_owned(),
        "com.google.android.youtube/17.36.4 (Linux; U; Android 12; GB) gzip".to_owned(),
        "--add-header".to_owned(),
        "Accept-Language:en-US,en;q=0.9".to_owned(),
        "--no-simulate".to_owned(),
        "--print".to_owned(),
        "after_move:filepath".to_owned(),
        "--print".to_owned(),
        "title".to_owned(),
        "-o".to_owned(),
        dir.join("source.%(ext)s").display().to_string(),
        url.to_owned(),
    ]
}

fn build_encode_arguments(
    source: &Path,
    segment: &Segment,
    crop: &CenterCrop,
    output: &Path,
) -> Vec<String> {
    ENCODE_ARGUMENTS
        .split(" ")
        .map(|arg| match arg {
            "$START" => format!("{:.2}", segment.start),
            "$END" => format!("{:.2}", segment.end),
            "$INPUT" => source.display().to_string(),
            "$FILTER" => crop.to_filter(),
            "$FPS" => CONFIG.output_frame_rate.to_string(),
            "$OUTPUT" => output.display().to_string(),
            other => other.to_owned(),
        })
        .collect()
}

fn cap_u32(cap: &regex::Captures, i: usize) -> u32 {
    cap.get(i).unwrap().as_str().parse::<u32>().unwrap()
}

fn parse_probe_output(text: &str) -> ClipResult<Metadata> {
    let duration_re = Regex::new(r"(?m)^  Duration: (\d\d):(\d\d):(\d\d)\.(\d\d),").unwrap();
    let duration_cap = duration_re
        .captures(text)
        .ok_or_else(|| ClipError::Probe("no duration found".to_owned()))?;

    let duration = cap_u32(&duration_cap, 1) as f64 * 3600.0
        + cap_u32(&duration_cap, 2) as f64 * 60.0
        + cap_u32(&duration_cap, 3) as f64
        + cap_u32(&duration_cap, 4) as f64 / 100.0;

    let resolution_re = Regex::new(r"(?m)^  Stream [^ ]+: Video: .*, (\d\d\d+)x(\d\d\d+)").unwrap();
    let resolution_cap = resolution_re
        .captures(text)
        .ok_or_else(|| ClipError::Probe("no resolution found".to_owned()))?;

    Ok(Metadata {
        width: cap_u32(&resolution_cap, 1),
        height: cap_u32(&resolution_cap, 2),
        duration,
    })
}

impl Media for Tools {
    fn fetch(&self, url: &str, dir: &Path) -> ClipResult<Download> {
        let output = run_command("yt-dlp", build_fetch_arguments(url, dir), "yt-dlp")
            .map_err(ClipError::Download)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines();

        let path = lines
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| ClipError::Download("yt-dlp did not report an output file".to_owned()))?;
        let title = lines.next().unwrap_or("").trim().to_owned();

        Ok(Download {
            path: PathBuf::from(path),
            title,
        })
    }

    fn probe(&self, path: &Path) -> ClipResult<Metadata> {
        // ffprobe prints its stream banner on stderr.
        let output = run_command("ffprobe", vec![path.display().to_string()], "ffprobe")
            .map_err(ClipError::Probe)?;

        let text = String::from_utf8(output.stderr)
            .map_err(|_| ClipError::Probe("invalid encoding".to_owned()))?;

        debug!("probe output: {}", text);

        parse_probe_output(&text)
    }

    fn encode_clip(
        &self,
        source: &Path,
        segment: &Segment,
        crop: &CenterCrop,
        output: &Path,
    ) -> ClipResult<()> {
        let arguments = build_encode_arguments(source, segment, crop, output);

        run_command("ffmpeg", arguments, "ffmpeg").map_err(|message| ClipError::Encode {
            index: segment.index + 1,
            message,
        })?;

        Ok(())
    }
}
