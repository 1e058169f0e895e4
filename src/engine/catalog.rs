//! Character and item catalog operations.
//!
//! These never touch roster state.

use std::collections::HashSet;

use tracing::{info, instrument};

use super::{EngineError, Result, RosterEngine};
use crate::types::{ActorId, Character, CharacterClass, Item, starter_items};

fn required_name(name: &str, what: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::invalid_input(format!("{what} name is required")));
    }
    Ok(name.to_string())
}

impl RosterEngine {
    #[instrument(skip(self), fields(actor = %actor))]
    pub async fn register_character(
        &self,
        actor: &ActorId,
        name: &str,
        class: CharacterClass,
    ) -> Result<Character> {
        let character = Character::new(actor.clone(), required_name(name, "Character")?, class);
        self.store.register_character(character.clone()).await?;
        info!(character_id = %character.id, class = %class, "Character registered");
        Ok(character)
    }

    /// Characters owned by `actor`, newest first.
    pub async fn characters(&self, actor: &ActorId) -> Result<Vec<Character>> {
        Ok(self.store.characters_of(actor).await?)
    }

    #[instrument(skip(self, image_url))]
    pub async fn register_item(
        &self,
        name: &str,
        value: u64,
        image_url: Option<String>,
    ) -> Result<Item> {
        let image_url = image_url.filter(|url| !url.trim().is_empty());
        let item = Item::new(required_name(name, "Item")?, value, image_url);
        self.store.register_item(item.clone()).await?;
        info!(item_id = %item.id, "Item registered");
        Ok(item)
    }

    /// The item catalog by name ascending.
    pub async fn items(&self) -> Result<Vec<Item>> {
        Ok(self.store.items().await?)
    }

    /// Registers every starter item whose name is not in the catalog yet.
    /// Returns how many were added.
    pub async fn seed_catalog(&self) -> Result<usize> {
        let existing: HashSet<String> = self
            .store
            .items()
            .await?
            .into_iter()
            .map(|item| item.name)
            .collect();

        let mut added = 0;
        for item in starter_items() {
            if existing.contains(&item.name) {
                continue;
            }
            self.store.register_item(item).await?;
            added += 1;
        }
        if added > 0 {
            info!(added, "Seeded item catalog");
        }
        Ok(added)
    }
}
