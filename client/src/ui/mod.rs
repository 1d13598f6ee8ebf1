//! UI module

pub mod main_menu;
pub mod pause_menu;
pub mod styles;
pub mod toast;

pub use main_menu::MainMenuPlugin;
pub use pause_menu::PauseMenuPlugin;
pub use toast::{RideErrorToast, ToastPlugin};
