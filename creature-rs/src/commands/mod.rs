//! Command implementations

pub mod bake;
pub mod contact;
pub mod info;
pub mod pose;
pub mod tree;

use anyhow::{Context, Result};
use std::path::Path;

use creature_runtime::{Creature, CreatureData, CreatureManager};

/// Load an asset and build a manager holding every clip
pub(crate) fn load_manager(path: &Path) -> Result<(CreatureData, CreatureManager)> {
    let data = CreatureData::from_path(path)
        .with_context(|| format!("Failed to read asset: {}", path.display()))?;
    let creature = Creature::from_data(&data)
        .with_context(|| format!("Failed to build creature from {}", path.display()))?;

    let mut manager = CreatureManager::new(creature);
    manager
        .create_all_animations(&data)
        .with_context(|| format!("Failed to load clips from {}", path.display()))?;
    Ok((data, manager))
}

/// Activate `name`, or keep the default clip when `None`
pub(crate) fn activate_clip(manager: &mut CreatureManager, name: Option<&str>) -> Result<String> {
    let name = match name {
        Some(name) => name.to_string(),
        None => manager
            .active_animation_name()
            .map(str::to_string)
            .context("Asset has no animation clips")?,
    };

    if manager.animation(&name).is_none() {
        anyhow::bail!(
            "Unknown animation '{name}' (available: {})",
            manager.animation_names().join(", ")
        );
    }
    manager.set_active_animation_name(&name, false);
    Ok(name)
}
