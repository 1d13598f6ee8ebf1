//! Rendering systems
//!
//! Camera setup and the day/night cycle.

use bevy::prelude::*;
use bevy::audio::SpatialListener;
use bevy::core_pipeline::tonemapping::Tonemapping;
use bevy::light::{light_consts::lux, DirectionalLightShadowMap};
use shared::WorldCalendar;

// =============================================================================
// COMPONENTS
// =============================================================================

/// Marker for the sun directional light (driven by day/night cycle)
#[derive(Component)]
pub struct SunLight;

/// Marker for the moon directional light (provides visibility at night)
#[derive(Component)]
pub struct MoonLight;

const DAY_SKY: Color = Color::srgb(0.55, 0.72, 0.9);
const NIGHT_SKY: Color = Color::srgb(0.03, 0.04, 0.08);

// =============================================================================
// SETUP
// =============================================================================

/// One-time rendering setup.
pub fn setup_rendering(mut commands: Commands) {
    commands.insert_resource(DirectionalLightShadowMap { size: 1024 });
    commands.insert_resource(ClearColor(DAY_SKY));

    commands.spawn((
        Camera3d::default(),
        Tonemapping::AcesFitted,
        Transform::from_xyz(0.0, 10.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
        // Hoof loops are spatial; the camera carries the ears.
        SpatialListener::new(0.1),
    ));

    info!("Client rendering initialized");
}

// =============================================================================
// DAY/NIGHT CYCLE
// =============================================================================

/// Sun elevation factor for a calendar hour: -1 at midnight, 0 at 6h and 18h, +1 at noon.
pub fn sun_elevation(hour_of_day: f32) -> f32 {
    let phase = hour_of_day / 24.0 * std::f32::consts::TAU;
    -phase.cos()
}

/// Update sun, moon, ambient light, and sky color from the replicated world calendar.
pub fn update_day_night_cycle(
    calendar: Query<&WorldCalendar>,
    mut sun_query: Query<(&mut DirectionalLight, &mut Transform), (With<SunLight>, Without<MoonLight>)>,
    mut moon_query: Query<(&mut DirectionalLight, &mut Transform), (With<MoonLight>, Without<SunLight>)>,
    mut ambient: ResMut<AmbientLight>,
    mut clear_color: ResMut<ClearColor>,
) {
    let Some(calendar) = calendar.iter().next() else {
        return;
    };

    let phase = calendar.hour_of_day() / 24.0 * std::f32::consts::TAU;
    let elevation = sun_elevation(calendar.hour_of_day());
    let azimuth = phase - std::f32::consts::PI;

    let elev_angle = elevation * std::f32::consts::FRAC_PI_2 * 0.9;
    let (sin_e, cos_e) = elev_angle.sin_cos();

    // Direction the light rays travel. y is negative while the sun is up.
    let sun_dir = Vec3::new(azimuth.sin() * cos_e, -sin_e, azimuth.cos() * cos_e).normalize_or_zero();
    let day_factor = smoothstep(-0.05, 0.15, elevation);

    for (mut light, mut transform) in sun_query.iter_mut() {
        transform.rotation = Quat::from_rotation_arc(Vec3::NEG_Z, sun_dir);
        light.illuminance = lux::AMBIENT_DAYLIGHT * elevation.max(0.0).powf(0.6) * day_factor;
    }

    let moon_dir = Vec3::new(-azimuth.sin() * cos_e, -sin_e.abs().max(0.2), -azimuth.cos() * cos_e)
        .normalize_or_zero();
    for (mut light, mut transform) in moon_query.iter_mut() {
        transform.rotation = Quat::from_rotation_arc(Vec3::NEG_Z, moon_dir);
        light.illuminance = 800.0 * (1.0 - day_factor);
    }

    ambient.brightness = 12.0 + 68.0 * day_factor;
    clear_color.0 = lerp_color(NIGHT_SKY, DAY_SKY, day_factor);
}

// =============================================================================
// HELPERS
// =============================================================================

/// Helper to linearly interpolate between two colors
fn lerp_color(a: Color, b: Color, t: f32) -> Color {
    let a = a.to_srgba();
    let b = b.to_srgba();
    Color::srgba(
        a.red + (b.red - a.red) * t,
        a.green + (b.green - a.green) * t,
        a.blue + (b.blue - a.blue) * t,
        a.alpha + (b.alpha - a.alpha) * t,
    )
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sun_elevation_follows_calendar_hours() {
        assert!((sun_elevation(12.0) - 1.0).abs() < 1e-5);
        assert!((sun_elevation(0.0) + 1.0).abs() < 1e-5);
        assert!(sun_elevation(6.0).abs() < 1e-5);
        assert!(sun_elevation(18.0).abs() < 1e-5);
    }
}
