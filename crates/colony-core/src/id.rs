use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a placed building. Versioned: a removed building's id never
    /// aliases a building placed later in the same slot.
    pub struct BuildingId;
}

/// Identifies an item type in the registry. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemTypeId(pub u32);

/// Identifies a building definition in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingTypeId(pub u32);

/// Identifies a recipe in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecipeId(pub u32);

/// Identifies a technology in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TechId(pub u32);

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn item_type_id_equality() {
        assert_eq!(ItemTypeId(0), ItemTypeId(0));
        assert_ne!(ItemTypeId(0), ItemTypeId(1));
    }

    #[test]
    fn building_ids_are_not_reused_after_removal() {
        let mut sm = SlotMap::<BuildingId, ()>::with_key();
        let a = sm.insert(());
        sm.remove(a);
        let b = sm.insert(());
        assert_ne!(a, b);
        assert!(!sm.contains_key(a));
    }
}
