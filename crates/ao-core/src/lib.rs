pub mod config;
pub mod conflict;
pub mod error;
pub mod launch;
pub mod prefs;
pub mod roster;
pub mod script;
pub mod selection;
pub mod settings;
pub mod types;
pub mod validation;
pub mod window;

pub use config::*;
pub use conflict::*;
pub use error::*;
pub use launch::*;
pub use prefs::*;
pub use roster::*;
pub use script::*;
pub use selection::*;
pub use settings::*;
pub use types::*;
pub use validation::*;
pub use window::*;
