use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use tapex_sequencer::{PlaybackCycle, PlaybackError, PlaybackSurface};
use tracing::{debug, warn};

/// Plays sources by running an external audio player, one process per
/// load-and-play cycle. The process exiting is the end-of-media notice.
pub struct CommandPlayback {
    program: String,
    args: Vec<String>,
    media_root: PathBuf,
    loaded: Option<(PathBuf, PlaybackCycle)>,
    child: Option<(Child, PlaybackCycle)>,
}

impl CommandPlayback {
    pub fn new(program: String, args: Vec<String>, media_root: PathBuf) -> Self {
        Self {
            program,
            args,
            media_root,
            loaded: None,
            child: None,
        }
    }

    fn stop_child(&mut self) {
        if let Some((mut child, cycle)) = self.child.take() {
            if let Err(e) = child.kill() {
                debug!(cycle = cycle.0, error = %e, "player already exited");
            }
            let _ = child.wait();
        }
    }
}

impl PlaybackSurface for CommandPlayback {
    fn load(&mut self, source: &str, cycle: PlaybackCycle) -> Result<(), PlaybackError> {
        self.stop_child();
        let path = self.media_root.join(source);
        if !path.is_file() {
            self.loaded = None;
            return Err(PlaybackError::MissingSource(path));
        }
        self.loaded = Some((path, cycle));
        Ok(())
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        let Some((path, cycle)) = self.loaded.clone() else {
            return Err(PlaybackError::NothingLoaded);
        };
        self.stop_child();
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| PlaybackError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        debug!(path = %path.display(), cycle = cycle.0, pid = child.id(), "player started");
        self.child = Some((child, cycle));
        Ok(())
    }

    /// Stops the player. Sources always restart from the beginning.
    fn pause(&mut self) {
        self.stop_child();
    }

    fn poll_complete(&mut self) -> Option<PlaybackCycle> {
        let (child, cycle) = self.child.as_mut()?;
        let cycle = *cycle;
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    warn!(cycle = cycle.0, %status, "player exited with failure");
                }
                self.child = None;
                Some(cycle)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(cycle = cycle.0, error = %e, "cannot poll player, treating as finished");
                self.child = None;
                Some(cycle)
            }
        }
    }
}

impl Drop for CommandPlayback {
    fn drop(&mut self) {
        self.stop_child();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn media_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("phrases/Anchor")).unwrap();
        std::fs::write(dir.path().join("phrases/Anchor/03.wav"), b"RIFF").unwrap();
        dir
    }

    fn wait_for_completion(playback: &mut CommandPlayback) -> Option<PlaybackCycle> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(cycle) = playback.poll_complete() {
                return Some(cycle);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        None
    }

    #[test]
    fn missing_sources_fail_to_load() {
        let dir = media_dir();
        let mut playback = CommandPlayback::new("true".into(), vec![], dir.path().into());
        assert!(matches!(
            playback.load("phrases/MT/03.wav", PlaybackCycle(1)),
            Err(PlaybackError::MissingSource(_))
        ));
        assert!(matches!(playback.play(), Err(PlaybackError::NothingLoaded)));
    }

    #[test]
    fn player_exit_reports_the_cycle_once() {
        let dir = media_dir();
        let mut playback = CommandPlayback::new("true".into(), vec![], dir.path().into());
        playback.load("phrases/Anchor/03.wav", PlaybackCycle(3)).unwrap();
        playback.play().unwrap();

        assert_eq!(wait_for_completion(&mut playback), Some(PlaybackCycle(3)));
        assert_eq!(playback.poll_complete(), None);
    }

    #[test]
    fn pause_kills_the_player_without_a_completion() {
        let dir = media_dir();
        let args = vec!["-c".into(), "sleep 30".into(), "player".into()];
        let mut playback = CommandPlayback::new("sh".into(), args, dir.path().into());
        playback.load("phrases/Anchor/03.wav", PlaybackCycle(1)).unwrap();
        playback.play().unwrap();
        playback.pause();
        assert_eq!(playback.poll_complete(), None);
    }

    #[test]
    fn unknown_program_is_a_spawn_error() {
        let dir = media_dir();
        let mut playback =
            CommandPlayback::new("tapex-no-such-player".into(), vec![], dir.path().into());
        playback.load("phrases/Anchor/03.wav", PlaybackCycle(1)).unwrap();
        assert!(matches!(playback.play(), Err(PlaybackError::Spawn { .. })));
    }
}
