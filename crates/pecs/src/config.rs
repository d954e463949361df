//! World configuration.

use serde::{Deserialize, Serialize};

/// Construction-time settings for a [`World`](crate::world::World).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use pecs::config::WorldConfig;
///
/// let config: WorldConfig = serde_json::from_str(r#"{ "entity_capacity": 4096 }"#).unwrap();
/// assert_eq!(config.entity_capacity, 4096);
/// assert_eq!(config.system_capacity, WorldConfig::default().system_capacity);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Entity records to reserve up front.
    pub entity_capacity: usize,
    /// System slots to reserve up front.
    pub system_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 1024,
            system_capacity: 16,
        }
    }
}
