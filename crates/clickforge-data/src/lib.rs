pub mod game;
pub mod loader;

pub use game::{load_config, load_game_dir};
pub use loader::{DataLoadError, Format};
