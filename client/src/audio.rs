//! Hoof audio
//!
//! Plays the sound commands the riding layer emits for each mount. Loops are spatial
//! `AudioPlayer` entities positioned at the mount; pausing goes through the `AudioSink`
//! so a resumed loop keeps its place.

use std::collections::HashMap;

use bevy::audio::Volume;
use bevy::prelude::*;
use shared::{HoofChannel, SoundCommand};

use crate::riding::MountSound;
use crate::states::GameState;

/// Volume of the hoof loops
const LOOP_VOLUME: f32 = 0.7;

/// Loaded hoof clips, filled on first `Load`.
#[derive(Resource, Default)]
pub struct HoofAudio {
    pub clips: HashMap<HoofChannel, Handle<AudioSource>>,
}

/// Loop entities by (mount, channel).
#[derive(Resource, Default)]
pub struct HoofLoops(pub HashMap<(Entity, HoofChannel), Entity>);

/// Marker for a looping hoof sound
#[derive(Component)]
pub struct HoofLoop {
    pub mount: Entity,
    pub channel: HoofChannel,
}

/// Path of a one-shot creature sound.
pub fn one_shot_path(sound: &str) -> String {
    format!("sounds/creature/hooved/{}.ogg", sound)
}

/// Apply the hoof sound commands written this frame
pub fn play_mount_sounds(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut audio: ResMut<HoofAudio>,
    mut loops: ResMut<HoofLoops>,
    mut reader: MessageReader<MountSound>,
    mut transforms: Query<&mut Transform, With<HoofLoop>>,
    sinks: Query<&AudioSink, With<HoofLoop>>,
) {
    for MountSound { mount, command } in reader.read() {
        match command {
            SoundCommand::Load { channel, .. } => {
                audio
                    .clips
                    .entry(*channel)
                    .or_insert_with(|| asset_server.load(channel.asset_path()));
            }
            SoundCommand::Start(channel) => {
                if loops.0.contains_key(&(*mount, *channel)) {
                    continue;
                }
                let clip = audio
                    .clips
                    .entry(*channel)
                    .or_insert_with(|| asset_server.load(channel.asset_path()))
                    .clone();
                let entity = commands
                    .spawn((
                        HoofLoop {
                            mount: *mount,
                            channel: *channel,
                        },
                        AudioPlayer::new(clip),
                        PlaybackSettings::LOOP
                            .with_volume(Volume::Linear(LOOP_VOLUME))
                            .with_spatial(true),
                        Transform::default(),
                    ))
                    .id();
                loops.0.insert((*mount, *channel), entity);
            }
            SoundCommand::Stop(channel) => {
                if let Some(entity) = loops.0.remove(&(*mount, *channel)) {
                    commands.entity(entity).despawn();
                }
            }
            SoundCommand::Pause(channel) => {
                if let Some(sink) = loops.0.get(&(*mount, *channel)).and_then(|e| sinks.get(*e).ok()) {
                    sink.pause();
                }
            }
            SoundCommand::Resume(channel) => {
                if let Some(sink) = loops.0.get(&(*mount, *channel)).and_then(|e| sinks.get(*e).ok()) {
                    sink.play();
                }
            }
            SoundCommand::SetPosition { channel, position } => {
                if let Some(mut transform) = loops
                    .0
                    .get(&(*mount, *channel))
                    .and_then(|e| transforms.get_mut(*e).ok())
                {
                    transform.translation = *position;
                }
            }
            SoundCommand::OneShot { sound, position } => {
                commands.spawn((
                    AudioPlayer::new(asset_server.load(one_shot_path(sound))),
                    PlaybackSettings::DESPAWN.with_spatial(true),
                    Transform::from_translation(*position),
                ));
            }
        }
    }
}

/// Drop loops whose mount is gone
pub fn cleanup_orphan_loops(
    mut commands: Commands,
    mut loops: ResMut<HoofLoops>,
    mounts: Query<(), With<shared::Mount>>,
) {
    loops.0.retain(|(mount, _), entity| {
        if mounts.contains(*mount) {
            return true;
        }
        commands.entity(*entity).despawn();
        false
    });
}

/// Silence everything when back at the menu
pub fn stop_all_loops(mut commands: Commands, mut loops: ResMut<HoofLoops>) {
    for (_, entity) in loops.0.drain() {
        commands.entity(entity).despawn();
    }
}

pub struct HoofAudioPlugin;

impl Plugin for HoofAudioPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<HoofAudio>();
        app.init_resource::<HoofLoops>();
        app.add_message::<MountSound>();
        app.add_systems(OnEnter(GameState::MainMenu), stop_all_loops);
        app.add_systems(
            Update,
            (play_mount_sounds, cleanup_orphan_loops)
                .chain()
                .run_if(in_state(GameState::Playing).or(in_state(GameState::Paused))),
        );
    }
}
