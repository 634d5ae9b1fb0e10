//! Host integration for the launcher front-end: the external launcher
//! process and the desktop window list.

pub mod error;
pub mod launcher;
pub mod window;

pub use error::*;
pub use launcher::*;
pub use window::*;

#[cfg(test)]
mod tests {
    use super::{default_window_control, PlatformError, ProcessLauncher, UnsupportedWindows};
    use ao_core::config::LaunchSettings;
    use ao_core::launch::Launcher;
    use std::any::TypeId;

    #[test]
    fn crate_root_reexports_types() {
        let _ = TypeId::of::<PlatformError>();
        let _ = TypeId::of::<ProcessLauncher>();
        let _ = TypeId::of::<UnsupportedWindows>();
    }

    #[test]
    fn backends_are_usable_as_trait_objects() {
        let settings = LaunchSettings::default();
        let launcher: Box<dyn Launcher> = Box::new(ProcessLauncher::from_settings(&settings));
        let windows = default_window_control(&settings);
        assert_eq!(
            windows.character_window_title("Bob"),
            "Anarchy Online - Bob"
        );
        drop(launcher);
    }
}
