//! Looping hoof sounds
//!
//! Two channels, trot and gallop, gated on movement, gait and a short grace period after
//! leaving the ground. Channels are loaded once on first use and reused. Pausing the game
//! pauses them instead of stopping so the loop keeps its phase.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::gait::Gait;

/// How long the mount may be airborne before the hoof loops stop (seconds).
pub const AIRBORNE_SOUND_GRACE: f32 = 0.2;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HoofChannel {
    Trot,
    Gallop,
}

impl HoofChannel {
    pub const ALL: [HoofChannel; 2] = [HoofChannel::Trot, HoofChannel::Gallop];

    pub fn asset_path(self) -> &'static str {
        match self {
            HoofChannel::Trot => "sounds/creature/hooved/trot.ogg",
            HoofChannel::Gallop => "sounds/creature/hooved/gallop.ogg",
        }
    }

    fn index(self) -> usize {
        match self {
            HoofChannel::Trot => 0,
            HoofChannel::Gallop => 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SoundCommand {
    Load { channel: HoofChannel, position: Vec3 },
    Start(HoofChannel),
    Stop(HoofChannel),
    Pause(HoofChannel),
    Resume(HoofChannel),
    SetPosition { channel: HoofChannel, position: Vec3 },
    OneShot { sound: String, position: Vec3 },
}

#[derive(Component, Clone, Debug, Default, PartialEq)]
pub struct RidingSounds {
    loaded: [bool; 2],
    playing: [bool; 2],
    paused: bool,
    airborne_for: f32,
}

impl RidingSounds {
    pub fn is_playing(&self, channel: HoofChannel) -> bool {
        self.playing[channel.index()]
    }

    pub fn is_loaded(&self, channel: HoofChannel) -> bool {
        self.loaded[channel.index()]
    }

    /// Follow the global pause flag. Playing channels pause and later resume together.
    pub fn update_pause(&mut self, paused: bool) -> Vec<SoundCommand> {
        if paused == self.paused {
            return Vec::new();
        }
        self.paused = paused;
        HoofChannel::ALL
            .into_iter()
            .filter(|c| self.playing[c.index()])
            .map(|c| {
                if paused {
                    SoundCommand::Pause(c)
                } else {
                    SoundCommand::Resume(c)
                }
            })
            .collect()
    }

    pub fn update(
        &mut self,
        dt: f32,
        should_move: bool,
        gait: Gait,
        on_ground: bool,
        position: Vec3,
    ) -> Vec<SoundCommand> {
        // Emitters follow the mount even while paused
        let mut commands: Vec<SoundCommand> = HoofChannel::ALL
            .into_iter()
            .filter(|c| self.loaded[c.index()])
            .map(|channel| SoundCommand::SetPosition { channel, position })
            .collect();
        if self.paused {
            return commands;
        }

        if on_ground {
            self.airborne_for = 0.0;
        } else {
            self.airborne_for += dt;
        }
        let grounded = self.airborne_for < AIRBORNE_SOUND_GRACE;

        for channel in HoofChannel::ALL {
            let i = channel.index();
            let gait_matches = match channel {
                HoofChannel::Trot => gait != Gait::Gallop,
                HoofChannel::Gallop => gait == Gait::Gallop,
            };
            let wanted = should_move && gait_matches && grounded;
            if wanted == self.playing[i] {
                continue;
            }
            if wanted {
                if !self.loaded[i] {
                    self.loaded[i] = true;
                    commands.push(SoundCommand::Load { channel, position });
                }
                commands.push(SoundCommand::Start(channel));
            } else {
                commands.push(SoundCommand::Stop(channel));
            }
            self.playing[i] = wanted;
        }
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trot_loads_once_and_follows_gait() {
        let mut sounds = RidingSounds::default();
        let pos = Vec3::ZERO;

        let first = sounds.update(0.1, true, Gait::Walk, true, pos);
        assert_eq!(
            first,
            vec![
                SoundCommand::Load { channel: HoofChannel::Trot, position: pos },
                SoundCommand::Start(HoofChannel::Trot),
            ]
        );

        // Steady state only moves emitters
        let steady = sounds.update(0.1, true, Gait::Walk, true, pos);
        assert_eq!(steady, vec![SoundCommand::SetPosition { channel: HoofChannel::Trot, position: pos }]);

        let gallop = sounds.update(0.1, true, Gait::Gallop, true, pos);
        assert!(gallop.contains(&SoundCommand::Stop(HoofChannel::Trot)));
        assert!(gallop.contains(&SoundCommand::Start(HoofChannel::Gallop)));
        assert!(!sounds.is_playing(HoofChannel::Trot));

        // Back to trot: no second load
        let back = sounds.update(0.1, true, Gait::Canter, true, pos);
        assert!(!back.iter().any(|c| matches!(c, SoundCommand::Load { channel: HoofChannel::Trot, .. })));
        assert!(back.contains(&SoundCommand::Start(HoofChannel::Trot)));
    }

    #[test]
    fn test_airborne_grace() {
        let mut sounds = RidingSounds::default();
        sounds.update(0.1, true, Gait::Walk, true, Vec3::ZERO);

        sounds.update(0.1, true, Gait::Walk, false, Vec3::ZERO);
        assert!(sounds.is_playing(HoofChannel::Trot));
        let stop = sounds.update(0.15, true, Gait::Walk, false, Vec3::ZERO);
        assert!(stop.contains(&SoundCommand::Stop(HoofChannel::Trot)));
    }

    #[test]
    fn test_pause_resumes_playing_channels() {
        let mut sounds = RidingSounds::default();
        sounds.update(0.1, true, Gait::Gallop, true, Vec3::ZERO);

        assert_eq!(sounds.update_pause(true), vec![SoundCommand::Pause(HoofChannel::Gallop)]);
        assert_eq!(
            sounds.update(0.1, false, Gait::Walk, true, Vec3::ZERO),
            vec![SoundCommand::SetPosition { channel: HoofChannel::Gallop, position: Vec3::ZERO }]
        );
        assert!(sounds.update_pause(true).is_empty());
        assert_eq!(sounds.update_pause(false), vec![SoundCommand::Resume(HoofChannel::Gallop)]);
        assert!(sounds.is_playing(HoofChannel::Gallop));
    }

    #[test]
    fn test_paused_emitters_follow_the_mount() {
        let mut sounds = RidingSounds::default();
        sounds.update(0.1, true, Gait::Walk, true, Vec3::ZERO);
        sounds.update(0.1, true, Gait::Gallop, true, Vec3::ZERO);
        sounds.update_pause(true);

        let moved = Vec3::new(4.0, 0.0, -2.0);
        let paused = sounds.update(0.1, true, Gait::Gallop, true, moved);
        assert_eq!(
            paused,
            vec![
                SoundCommand::SetPosition { channel: HoofChannel::Trot, position: moved },
                SoundCommand::SetPosition { channel: HoofChannel::Gallop, position: moved },
            ]
        );
        // Play state is frozen until resume
        assert!(sounds.is_playing(HoofChannel::Gallop));
        assert!(!sounds.is_playing(HoofChannel::Trot));
    }
}
