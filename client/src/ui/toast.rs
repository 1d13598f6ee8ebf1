//! Ride error toast
//!
//! Refused mounts and denied ride/turn attempts arrive as `RideRejected` messages carrying
//! a language key. The latest one is shown briefly at the bottom of the screen.

use bevy::prelude::*;
use lightyear::prelude::*;
use shared::RideRejected;

use crate::states::GameState;
use super::styles::*;

/// How long a toast stays up (seconds)
pub const TOAST_SECONDS: f32 = 3.0;

/// Text of the toast currently on screen, if any.
#[derive(Resource)]
pub struct RideErrorToast {
    pub message: Option<String>,
    pub timer: Timer,
}

impl Default for RideErrorToast {
    fn default() -> Self {
        Self {
            message: None,
            timer: Timer::from_seconds(TOAST_SECONDS, TimerMode::Once),
        }
    }
}

impl RideErrorToast {
    pub fn show(&mut self, message: String) {
        self.message = Some(message);
        self.timer.reset();
    }

    /// Advance the display timer. Returns true when the toast just expired.
    pub fn tick(&mut self, delta: std::time::Duration) -> bool {
        if self.message.is_none() {
            return false;
        }
        if self.timer.tick(delta).just_finished() {
            self.message = None;
            return true;
        }
        false
    }
}

/// English text for a ride error key.
pub fn lang_text(key: &str) -> String {
    match key {
        "toowild" => "Animal is too wild to ride".to_string(),
        "cantride-nosaddle" => "You need a saddle to ride this animal".to_string(),
        _ => match key.strip_prefix("cantride-") {
            Some(reason) => format!("You can't ride this animal right now ({})", reason),
            None => key.to_string(),
        },
    }
}

#[derive(Component)]
struct ToastRoot;

#[derive(Component)]
struct ToastText;

pub struct ToastPlugin;

impl Plugin for ToastPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RideErrorToast>();
        app.add_systems(OnEnter(GameState::Playing), spawn_toast);
        app.add_systems(OnEnter(GameState::MainMenu), despawn_toast);
        app.add_systems(
            Update,
            (receive_ride_rejections, update_toast)
                .chain()
                .run_if(in_state(GameState::Playing).or(in_state(GameState::Paused))),
        );
    }
}

fn spawn_toast(mut commands: Commands, existing: Query<(), With<ToastRoot>>) {
    if !existing.is_empty() {
        return;
    }
    commands
        .spawn((
            ToastRoot,
            Node {
                position_type: PositionType::Absolute,
                bottom: Val::Px(60.0),
                width: Val::Percent(100.0),
                justify_content: JustifyContent::Center,
                ..default()
            },
        ))
        .with_children(|parent| {
            parent.spawn((
                ToastText,
                Text::new(""),
                TextFont {
                    font_size: 20.0,
                    ..default()
                },
                TextColor(ACCENT_RED),
                Visibility::Hidden,
            ));
        });
}

fn despawn_toast(mut commands: Commands, query: Query<Entity, With<ToastRoot>>, mut toast: ResMut<RideErrorToast>) {
    for entity in query.iter() {
        commands.entity(entity).despawn();
    }
    toast.message = None;
}

/// Read refusals sent by the server
fn receive_ride_rejections(
    mut toast: ResMut<RideErrorToast>,
    mut receivers: Query<&mut MessageReceiver<RideRejected>, With<crate::GameClient>>,
) {
    for mut receiver in receivers.iter_mut() {
        for rejected in receiver.receive() {
            debug!("Ride on mount {} rejected: {}", rejected.mount_id, rejected.lang_key);
            toast.show(lang_text(&rejected.lang_key));
        }
    }
}

fn update_toast(
    time: Res<Time>,
    mut toast: ResMut<RideErrorToast>,
    mut text: Query<(&mut Text, &mut Visibility), With<ToastText>>,
) {
    toast.tick(time.delta());
    let Ok((mut text, mut visibility)) = text.single_mut() else {
        return;
    };
    match &toast.message {
        Some(message) => {
            if text.0 != *message {
                text.0 = message.clone();
            }
            *visibility = Visibility::Inherited;
        }
        None => *visibility = Visibility::Hidden,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_lang_text() {
        assert_eq!(lang_text("toowild"), "Animal is too wild to ride");
        assert!(lang_text("cantride-claimed").contains("claimed"));
        assert_eq!(lang_text("something-else"), "something-else");
    }

    #[test]
    fn test_toast_expires() {
        let mut toast = RideErrorToast::default();
        assert!(!toast.tick(Duration::from_secs(10)));

        toast.show("nope".into());
        assert!(!toast.tick(Duration::from_secs_f32(TOAST_SECONDS * 0.5)));
        assert!(toast.message.is_some());
        assert!(toast.tick(Duration::from_secs_f32(TOAST_SECONDS)));
        assert!(toast.message.is_none());
    }
}
