//! Per-loop mix state - mute, solo, volume, master mute

use jam_library::TrackId;
use std::collections::HashMap;

/// Mix settings of one track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackMix {
    pub muted: bool,
    pub soloed: bool,
    /// Linear volume (0.0-1.0)
    pub volume: f32,
}

impl Default for TrackMix {
    fn default() -> Self {
        Self {
            muted: false,
            soloed: false,
            volume: 1.0,
        }
    }
}

/// Mix settings of every track in a loop
#[derive(Debug, Clone, Default)]
pub struct MixState {
    tracks: HashMap<TrackId, TrackMix>,
    master_muted: bool,
}

impl MixState {
    pub fn new<'a>(track_ids: impl IntoIterator<Item = &'a TrackId>) -> Self {
        Self {
            tracks: track_ids
                .into_iter()
                .map(|id| (id.clone(), TrackMix::default()))
                .collect(),
            master_muted: false,
        }
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.tracks.contains_key(id)
    }

    pub fn track(&self, id: &TrackId) -> Option<TrackMix> {
        self.tracks.get(id).copied()
    }

    pub fn any_soloed(&self) -> bool {
        self.tracks.values().any(|t| t.soloed)
    }

    /// Gain for a track's gain stage
    ///
    /// Muted tracks are silent; when any track is soloed, only soloed
    /// tracks sound; otherwise the track's volume.
    pub fn effective_gain(&self, id: &TrackId) -> f32 {
        let Some(track) = self.tracks.get(id) else {
            return 0.0;
        };
        if track.muted || (self.any_soloed() && !track.soloed) {
            0.0
        } else {
            track.volume
        }
    }

    /// Apply `f` to a track's settings; false for unknown tracks
    fn update(&mut self, id: &TrackId, f: impl FnOnce(&mut TrackMix)) -> bool {
        match self.tracks.get_mut(id) {
            Some(track) => {
                f(track);
                true
            }
            None => false,
        }
    }

    pub fn set_muted(&mut self, id: &TrackId, muted: bool) -> bool {
        self.update(id, |t| t.muted = muted)
    }

    pub fn toggle_muted(&mut self, id: &TrackId) -> bool {
        self.update(id, |t| t.muted = !t.muted)
    }

    pub fn set_soloed(&mut self, id: &TrackId, soloed: bool) -> bool {
        self.update(id, |t| t.soloed = soloed)
    }

    pub fn toggle_soloed(&mut self, id: &TrackId) -> bool {
        self.update(id, |t| t.soloed = !t.soloed)
    }

    pub fn set_volume(&mut self, id: &TrackId, volume: f32) -> bool {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.update(id, |t| t.volume = volume)
    }

    pub fn master_muted(&self) -> bool {
        self.master_muted
    }

    pub fn set_master_muted(&mut self, muted: bool) {
        self.master_muted = muted;
    }

    /// Gain for the loop's master stage
    pub fn master_gain(&self) -> f32 {
        if self.master_muted {
            0.0
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> [TrackId; 3] {
        [TrackId::from("a"), TrackId::from("b"), TrackId::from("c")]
    }

    #[test]
    fn test_defaults() {
        let ids = ids();
        let mix = MixState::new(&ids);
        assert_eq!(mix.track(&ids[0]), Some(TrackMix::default()));
        assert_eq!(mix.effective_gain(&ids[1]), 1.0);
        assert_eq!(mix.master_gain(), 1.0);
        assert_eq!(mix.effective_gain(&TrackId::from("zzz")), 0.0);
    }

    #[test]
    fn test_solo_silences_others() {
        let [a, b, c] = ids();
        let mut mix = MixState::new([&a, &b, &c]);
        mix.set_volume(&b, 0.7);
        mix.set_soloed(&b, true);

        assert_eq!(mix.effective_gain(&a), 0.0);
        assert_eq!(mix.effective_gain(&b), 0.7);
        assert_eq!(mix.effective_gain(&c), 0.0);

        mix.toggle_soloed(&b);
        assert_eq!(mix.effective_gain(&a), 1.0);
    }

    #[test]
    fn test_mute_beats_solo() {
        let [a, b, c] = ids();
        let mut mix = MixState::new([&a, &b, &c]);
        mix.set_muted(&a, true);
        assert_eq!(mix.effective_gain(&a), 0.0);
        assert_eq!(mix.effective_gain(&b), 1.0);
        assert_eq!(mix.effective_gain(&c), 1.0);

        mix.set_soloed(&a, true);
        assert_eq!(mix.effective_gain(&a), 0.0);
        assert_eq!(mix.effective_gain(&b), 0.0);
    }

    #[test]
    fn test_volume_clamped() {
        let [a, ..] = ids();
        let mut mix = MixState::new([&a]);
        mix.set_volume(&a, 1.5);
        assert_eq!(mix.effective_gain(&a), 1.0);
        mix.set_volume(&a, -0.2);
        assert_eq!(mix.effective_gain(&a), 0.0);
        assert!(!mix.set_volume(&TrackId::from("x"), 0.5));
    }

    #[test]
    fn test_master_mute_keeps_track_state() {
        let [a, ..] = ids();
        let mut mix = MixState::new([&a]);
        mix.set_volume(&a, 0.4);
        mix.set_master_muted(true);

        assert_eq!(mix.master_gain(), 0.0);
        assert_eq!(mix.effective_gain(&a), 0.4);
    }
}
