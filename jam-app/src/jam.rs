//! The open jam - one mounted player per loop of a manifest

use jam_audio::{LoopPlayer, LoopSnapshot, PlayerContext};
use jam_library::{JamManifest, ManifestError};
use std::path::{Path, PathBuf};

pub struct Jam {
    ctx: PlayerContext,
    path: Option<PathBuf>,
    title: Option<String>,
    players: Vec<LoopPlayer>,
}

impl Jam {
    /// A jam with no loops
    pub fn empty(ctx: PlayerContext) -> Self {
        Self {
            ctx,
            path: None,
            title: None,
            players: Vec::new(),
        }
    }

    /// Open the manifest at `path`, replacing every loop
    ///
    /// On error the current loops are left mounted.
    pub fn open(&mut self, path: &Path) -> Result<(), ManifestError> {
        let manifest = JamManifest::load_from(path)?;
        self.mount(manifest);
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Re-read the current manifest; true if the loops were remounted
    pub fn refresh(&mut self) -> Result<bool, ManifestError> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        let manifest = JamManifest::load_from(&path)?;
        Ok(self.apply(manifest))
    }

    /// Bring the players in line with `manifest`
    ///
    /// With the same loops in the same order each player only swaps its
    /// track list; otherwise every loop is unmounted and mounted afresh.
    /// Returns whether a remount happened.
    pub fn apply(&mut self, manifest: JamManifest) -> bool {
        let same_loops = self.players.len() == manifest.loops.len()
            && self
                .players
                .iter()
                .zip(&manifest.loops)
                .all(|(player, lp)| player.loop_id() == &lp.id);

        if !same_loops {
            self.mount(manifest);
            return true;
        }

        self.title = manifest.title;
        for (player, lp) in self.players.iter().zip(manifest.loops) {
            if player.replace_tracks(lp.tracks) {
                tracing::info!(loop_id = %lp.id, "Track list changed");
            }
        }
        false
    }

    fn mount(&mut self, manifest: JamManifest) {
        self.unmount_all();
        self.title = manifest.title;
        self.players = manifest
            .loops
            .into_iter()
            .map(|lp| LoopPlayer::mount(lp, self.ctx.clone()))
            .collect();
        tracing::info!(loops = self.players.len(), "Mounted jam");
    }

    pub fn unmount_all(&mut self) {
        for player in self.players.drain(..) {
            player.unmount();
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn player(&self, index: usize) -> Option<&LoopPlayer> {
        self.players.get(index)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn snapshots(&self) -> Vec<LoopSnapshot> {
        self.players.iter().map(LoopPlayer::snapshot).collect()
    }

    pub fn context(&self) -> &PlayerContext {
        &self.ctx
    }
}

impl Drop for Jam {
    fn drop(&mut self) {
        self.unmount_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jam_audio::{offline, AudioDeviceSession, FrameScheduler, PlaybackCoordinator};
    use jam_library::{LoopId, StaticFetcher};
    use std::sync::Arc;

    const MANIFEST: &str = r#"{
        "title": "Friday",
        "loops": [
            {"id": "l1", "name": "Groove", "tracks": [
                {"id": "t1", "url": "kick.wav", "displayName": "Kick"},
                {"id": "t2"}
            ]},
            {"id": "l2", "tracks": [{"id": "t3", "url": "keys.wav"}]}
        ]
    }"#;

    fn jam() -> Jam {
        let (device, _renderer) = offline::open(48000);
        Jam::empty(PlayerContext {
            session: Arc::new(AudioDeviceSession::with_device(device)),
            coordinator: Arc::new(PlaybackCoordinator::new()),
            scheduler: Arc::new(FrameScheduler::new()),
            fetcher: Arc::new(StaticFetcher::new()),
            peak_points: 100,
        })
    }

    fn temp_manifest(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("jam-app-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("jam.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_apply_mounts_every_loop() {
        let mut jam = jam();
        assert!(jam.apply(JamManifest::parse(MANIFEST).unwrap()));

        assert_eq!(jam.len(), 2);
        assert_eq!(jam.title(), Some("Friday"));
        assert_eq!(jam.context().coordinator.registered_count(), 2);

        let snapshots = jam.snapshots();
        assert_eq!(snapshots[0].name.as_deref(), Some("Groove"));
        let labels: Vec<&str> = snapshots[0].tracks.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["Kick", "t2"]);
        assert_eq!(snapshots[1].tracks[0].label, "Audio 1");
    }

    #[test]
    fn test_same_loops_swap_tracks_in_place() {
        let mut jam = jam();
        jam.apply(JamManifest::parse(MANIFEST).unwrap());

        let updated = MANIFEST.replace(r#"{"id": "t2"}"#, r#"{"id": "t2", "url": "bass.wav"}"#);
        assert!(!jam.apply(JamManifest::parse(&updated).unwrap()));

        let snapshots = jam.snapshots();
        assert!(snapshots[0].tracks[1].playable);
        assert_eq!(jam.context().coordinator.registered_count(), 2);
    }

    #[test]
    fn test_new_loops_remount() {
        let mut jam = jam();
        jam.apply(JamManifest::parse(MANIFEST).unwrap());

        let other = r#"{"loops": [{"id": "l9", "tracks": []}]}"#;
        assert!(jam.apply(JamManifest::parse(other).unwrap()));

        let coordinator = &jam.context().coordinator;
        assert_eq!(coordinator.registered_count(), 1);
        assert!(coordinator.is_registered(&LoopId::from("l9")));
        assert!(!coordinator.is_registered(&LoopId::from("l1")));
        assert_eq!(jam.title(), None);
    }

    #[test]
    fn test_open_and_refresh_from_file() {
        let path = temp_manifest("refresh", MANIFEST);
        let mut jam = jam();
        jam.open(&path).unwrap();
        assert_eq!(jam.path(), Some(path.as_path()));
        assert_eq!(jam.len(), 2);

        std::fs::write(&path, MANIFEST.replace("Friday", "Saturday")).unwrap();
        assert!(!jam.refresh().unwrap());
        assert_eq!(jam.title(), Some("Saturday"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_failed_open_keeps_loops() {
        let mut jam = jam();
        jam.apply(JamManifest::parse(MANIFEST).unwrap());

        assert!(jam.open(Path::new("/nonexistent/jam.json")).is_err());
        assert_eq!(jam.len(), 2);
        assert_eq!(jam.path(), None);
    }

    #[test]
    fn test_drop_unregisters() {
        let mut jam = jam();
        jam.apply(JamManifest::parse(MANIFEST).unwrap());
        let coordinator = Arc::clone(&jam.context().coordinator);

        drop(jam);
        assert_eq!(coordinator.registered_count(), 0);
    }
}
