//! Loading a [`GameConfig`] from disk.
//!
//! A game is either a single config file or a directory:
//!
//! ```text
//! my_game/
//!   game.ron          required: settings and any inline content
//!   upgrades.toml     optional content lists, appended to the inline ones
//!   generators.json
//!   achievements.ron
//!   events.ron
//!   quests.ron
//!   prestige.ron
//! ```
//!
//! Every file may be RON, TOML or JSON. The merged config is validated before
//! it is returned.

use std::path::Path;

use clickforge_core::config::GameConfig;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::loader::{DataLoadError, deserialize_file, deserialize_list, find_data_file, require_data_file};

/// Base name of the settings file in a game directory.
pub const GAME_FILE: &str = "game";

/// Load and validate a single config file.
pub fn load_config(path: &Path) -> Result<GameConfig, DataLoadError> {
    let config: GameConfig = deserialize_file(path)?;
    validate(config, path)
}

/// Load a game directory: the required `game` file plus any content list
/// files, then validate the merged config.
pub fn load_game_dir(dir: &Path) -> Result<GameConfig, DataLoadError> {
    let game_path = require_data_file(dir, GAME_FILE)?;
    let mut config: GameConfig = deserialize_file(&game_path)?;

    append_list(dir, "upgrades", &mut config.upgrades)?;
    append_list(dir, "generators", &mut config.generators)?;
    append_list(dir, "achievements", &mut config.achievements)?;
    append_list(dir, "events", &mut config.events)?;
    append_list(dir, "quests", &mut config.quests)?;
    append_list(dir, "prestige", &mut config.prestige)?;

    let config = validate(config, &game_path)?;
    info!(
        dir = %dir.display(),
        version = %config.version,
        upgrades = config.upgrades.len(),
        generators = config.generators.len(),
        "game data loaded"
    );
    Ok(config)
}

/// Append the entries of `{name}.*` to `list` if the file exists.
fn append_list<T: DeserializeOwned>(
    dir: &Path,
    name: &str,
    list: &mut Vec<T>,
) -> Result<(), DataLoadError> {
    let Some(path) = find_data_file(dir, name)? else {
        return Ok(());
    };
    let entries: Vec<T> = deserialize_list(&path, name)?;
    debug!(file = %path.display(), count = entries.len(), "content list loaded");
    list.extend(entries);
    Ok(())
}

fn validate(config: GameConfig, file: &Path) -> Result<GameConfig, DataLoadError> {
    config.validate().map_err(|source| DataLoadError::Invalid {
        file: file.to_path_buf(),
        source,
    })?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
