//! Classification of contextual-menu entries.
//!
//! Menu text is the only place the core reads natural language, so all of
//! it is confined here. Matching is a case-insensitive substring test
//! against configurable vocabularies, which makes it fragile to text or
//! localization changes in the environment.

use crate::config::CombatConfig;

/// What a single menu entry would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    /// Attack the entity.
    Attack,
    /// Harvest the entity (it is a corpse, not a live target).
    Harvest,
    /// Anything else.
    Other,
}

/// The entry to take from a whole menu, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    /// Take the attack entry at this index.
    Attack(usize),
    /// Take the harvest entry at this index.
    Harvest(usize),
    /// Only a harvest entry exists and harvesting is disabled.
    HarvestDisabled,
    /// Nothing usable.
    Nothing,
}

impl MenuChoice {
    /// Index to hand back to the interactor, if an entry should be taken.
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Attack(i) | Self::Harvest(i) => Some(i),
            Self::HarvestDisabled | Self::Nothing => None,
        }
    }
}

/// Classify one entry. Attack words take precedence over harvest words.
pub fn classify(entry: &str, config: &CombatConfig) -> MenuAction {
    let lower = entry.to_lowercase();
    let matches = |words: &[String]| words.iter().any(|w| lower.contains(&w.to_lowercase()));
    if matches(&config.attack_actions) {
        MenuAction::Attack
    } else if matches(&config.harvest_actions) {
        MenuAction::Harvest
    } else {
        MenuAction::Other
    }
}

/// Pick an entry from a menu: any attack entry first, then a harvest entry.
pub fn resolve(entries: &[String], config: &CombatConfig, harvest_enabled: bool) -> MenuChoice {
    let kinds: Vec<MenuAction> = entries.iter().map(|e| classify(e, config)).collect();
    if let Some(i) = kinds.iter().position(|k| *k == MenuAction::Attack) {
        return MenuChoice::Attack(i);
    }
    match kinds.iter().position(|k| *k == MenuAction::Harvest) {
        Some(i) if harvest_enabled => MenuChoice::Harvest(i),
        Some(_) => MenuChoice::HarvestDisabled,
        None => MenuChoice::Nothing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn menu(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|e| (*e).to_owned()).collect()
    }

    #[test]
    fn classification_is_case_insensitive() {
        let config = CombatConfig::default();
        assert_eq!(classify("ATTACK Chompy bird", &config), MenuAction::Attack);
        assert_eq!(classify("Pluck Chompy bird", &config), MenuAction::Harvest);
        assert_eq!(classify("Walk here", &config), MenuAction::Other);
    }

    #[test]
    fn attack_beats_harvest_regardless_of_order() {
        let config = CombatConfig::default();
        let entries = menu(&["Walk here", "Pluck Chompy bird", "Attack Chompy bird"]);
        assert_eq!(resolve(&entries, &config, true), MenuChoice::Attack(2));
    }

    #[test]
    fn harvest_only_menus_depend_on_the_toggle() {
        let config = CombatConfig::default();
        let entries = menu(&["Pluck Chompy bird", "Examine"]);
        assert_eq!(resolve(&entries, &config, true), MenuChoice::Harvest(0));
        assert_eq!(resolve(&entries, &config, false), MenuChoice::HarvestDisabled);
        assert_eq!(MenuChoice::HarvestDisabled.index(), None);
    }

    #[test]
    fn empty_or_irrelevant_menus_yield_nothing() {
        let config = CombatConfig::default();
        assert_eq!(resolve(&[], &config, true), MenuChoice::Nothing);
        assert_eq!(
            resolve(&menu(&["Walk here", "Cancel"]), &config, true),
            MenuChoice::Nothing
        );
    }
}
