//! Shared UI styles - meadow/leather palette

use bevy::prelude::*;

/// Dark background for menus
pub const MENU_BACKGROUND: Color = Color::srgb(0.07, 0.08, 0.06);

/// Button colors - saddle leather
pub const BUTTON_NORMAL: Color = Color::srgb(0.16, 0.11, 0.07);
pub const BUTTON_HOVERED: Color = Color::srgb(0.26, 0.18, 0.10);
pub const BUTTON_PRESSED: Color = Color::srgb(0.42, 0.28, 0.14);
pub const BUTTON_BORDER: Color = Color::srgb(0.35, 0.26, 0.16);

/// Accent color - brass buckle
pub const ACCENT_COLOR: Color = Color::srgb(0.82, 0.66, 0.3);

/// Errors and refusals
pub const ACCENT_RED: Color = Color::srgb(0.9, 0.35, 0.25);

/// Text colors
pub const TEXT_COLOR: Color = Color::srgb(0.93, 0.9, 0.82);
pub const TEXT_MUTED: Color = Color::srgb(0.52, 0.5, 0.44);

/// Standard button style
pub fn button_style() -> Node {
    Node {
        width: Val::Px(280.0),
        height: Val::Px(55.0),
        justify_content: JustifyContent::Center,
        align_items: AlignItems::Center,
        margin: UiRect::all(Val::Px(8.0)),
        border: UiRect::all(Val::Px(2.0)),
        ..default()
    }
}

pub fn button_text_style() -> TextFont {
    TextFont {
        font_size: 22.0,
        ..default()
    }
}

pub fn title_text_style() -> TextFont {
    TextFont {
        font_size: 72.0,
        ..default()
    }
}

/// Spawn a menu button carrying `action`.
pub fn spawn_button<A: Component>(parent: &mut ChildSpawnerCommands<'_>, text: &str, action: A) {
    parent
        .spawn((
            Button,
            action,
            button_style(),
            BackgroundColor(BUTTON_NORMAL),
            BorderColor::from(BUTTON_BORDER),
            BorderRadius::all(Val::Px(6.0)),
        ))
        .with_children(|btn| {
            btn.spawn((Text::new(text), button_text_style(), TextColor(TEXT_COLOR)));
        });
}

/// Hover/press feedback shared by every menu
pub fn button_interactions(
    mut buttons: Query<
        (&Interaction, &mut BackgroundColor, &mut BorderColor),
        (Changed<Interaction>, With<Button>),
    >,
) {
    for (interaction, mut bg_color, mut border_color) in buttons.iter_mut() {
        let (bg, border) = match interaction {
            Interaction::Pressed => (BUTTON_PRESSED, ACCENT_COLOR),
            Interaction::Hovered => (BUTTON_HOVERED, ACCENT_COLOR),
            Interaction::None => (BUTTON_NORMAL, BUTTON_BORDER),
        };
        *bg_color = BackgroundColor(bg);
        *border_color = BorderColor::from(border);
    }
}
