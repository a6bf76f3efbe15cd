//! yt-dlp console output parsing.

use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

use super::ProgressUpdate;

fn progress_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\[download\]\s+(?P<pct>\d+(?:\.\d+)?)%(?:\s+of\s+~?\s*\S+)?(?:\s+at\s+(?P<rate>\S+))?(?:\s+ETA\s+(?P<eta>\S+))?",
        )
        .expect("progress regex is valid")
    })
}

fn destination_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^\[(?:Merger|download|ExtractAudio|VideoConvertor|VideoRemuxer)\]\s+(?:Merging formats into|Destination:)\s+"?(?P<path>[^"]+?)"?\s*$"#,
        )
        .expect("destination regex is valid")
    })
}

fn already_downloaded_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[download\]\s+(?P<path>.+?) has already been downloaded")
            .expect("already-downloaded regex is valid")
    })
}

/// Parse a `[download]  42.0% of 10.00MiB at 1.20MiB/s ETA 00:05` line.
/// Placeholder values such as `Unknown` become `None`.
pub fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let caps = progress_re().captures(line.trim())?;
    let percent = caps.name("pct")?.as_str().parse::<f64>().ok()?;
    let label = |name: &str| {
        caps.name(name)
            .map(|m| m.as_str())
            .filter(|s| !s.starts_with("Unknown") && *s != "N/A")
            .map(str::to_string)
    };
    Some(ProgressUpdate {
        percent,
        rate: label("rate"),
        eta: label("eta"),
    })
}

/// The file yt-dlp is writing or merging into, if the line announces one.
/// The last announcement wins, since merging follows the per-stream downloads.
pub fn parse_destination(line: &str) -> Option<PathBuf> {
    let line = line.trim();
    destination_re()
        .captures(line)
        .or_else(|| already_downloaded_re().captures(line))
        .and_then(|c| c.name("path"))
        .map(|m| PathBuf::from(m.as_str()))
}
