use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tapex_export::UploadFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UploadFormatArg {
    Record,
    Rows,
}

impl From<UploadFormatArg> for UploadFormat {
    fn from(arg: UploadFormatArg) -> Self {
        match arg {
            UploadFormatArg::Record => UploadFormat::Record,
            UploadFormatArg::Rows => UploadFormat::Rows,
        }
    }
}

/// Tap-along beat experiment: listen to short excerpts and tap in time.
#[derive(Debug, Clone, Parser)]
#[command(name = "tapex", version, about)]
pub struct Cli {
    /// Session config (JSON); built-in defaults otherwise
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the number of runs
    #[arg(long)]
    pub runs: Option<usize>,

    /// Seed for plan randomization, for reproducible sessions
    #[arg(long)]
    pub seed: Option<u64>,

    /// Where the tap record is written at the end of a session
    #[arg(long, default_value = "tapex_results.json")]
    pub output: PathBuf,

    /// Upload the tap record to this endpoint instead of writing `--output`
    #[arg(long)]
    pub upload_url: Option<String>,

    #[arg(long, value_enum, default_value_t = UploadFormatArg::Record)]
    pub upload_format: UploadFormatArg,

    /// Append spreadsheet rows (JSON lines) to this file instead
    #[arg(long, conflicts_with = "upload_url")]
    pub rows_file: Option<PathBuf>,

    /// Directory audio source paths are resolved against
    #[arg(long, default_value = ".")]
    pub media_root: PathBuf,

    /// External player command, e.g. "ffplay -nodisp -autoexit -loglevel quiet"
    #[arg(long)]
    pub player: Option<String>,

    /// TrueType font for on-screen text; shapes only without it
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Run in a window instead of borderless fullscreen
    #[arg(long)]
    pub windowed: bool,
}

impl Cli {
    /// Player program and leading arguments.
    pub fn player_command(&self) -> (String, Vec<String>) {
        let line = self.player.clone().unwrap_or_else(default_player);
        let mut parts = line.split_whitespace().map(String::from);
        let program = parts.next().unwrap_or_else(|| "aplay".to_string());
        (program, parts.collect())
    }
}

fn default_player() -> String {
    if cfg!(target_os = "macos") {
        "afplay".to_string()
    } else if cfg!(target_os = "windows") {
        "ffplay -nodisp -autoexit -loglevel quiet".to_string()
    } else {
        "aplay -q".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_write_a_local_file() {
        let cli = Cli::try_parse_from(["tapex"]).unwrap();
        assert_eq!(cli.output, PathBuf::from("tapex_results.json"));
        assert!(cli.upload_url.is_none());
        assert_eq!(cli.upload_format, UploadFormatArg::Record);
        assert!(!cli.windowed);
    }

    #[test]
    fn parses_session_overrides() {
        let cli = Cli::try_parse_from([
            "tapex",
            "--runs",
            "2",
            "--seed",
            "99",
            "--upload-url",
            "http://localhost:3000/upload",
            "--upload-format",
            "rows",
            "--player",
            "ffplay -nodisp -autoexit",
        ])
        .unwrap();
        assert_eq!(cli.runs, Some(2));
        assert_eq!(cli.seed, Some(99));
        assert_eq!(UploadFormat::from(cli.upload_format), UploadFormat::Rows);
        let (program, args) = cli.player_command();
        assert_eq!(program, "ffplay");
        assert_eq!(args, vec!["-nodisp", "-autoexit"]);
    }

    #[test]
    fn rows_file_and_upload_are_exclusive() {
        let parsed = Cli::try_parse_from([
            "tapex",
            "--upload-url",
            "http://x",
            "--rows-file",
            "rows.jsonl",
        ]);
        assert!(parsed.is_err());
    }
}
