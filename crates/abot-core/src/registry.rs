use std::{collections::HashMap, sync::Arc};

use crate::{
    ability::{Ability, ReplyRule},
    errors::Error,
    Result,
};

/// Reserved name of the ability that receives free text.
pub const DEFAULT: &str = "default";

/// Immutable name → ability map plus the flattened reply rules.
#[derive(Debug)]
pub struct Registry {
    abilities: HashMap<String, Arc<Ability>>,
    replies: Vec<ReplyRule>,
}

impl Registry {
    /// Fails on the first duplicated name; reply rules keep declaration order.
    pub fn new(abilities: Vec<Ability>) -> Result<Self> {
        let mut map = HashMap::with_capacity(abilities.len());
        let mut replies = Vec::new();

        for ability in abilities {
            let name = ability.name().to_string();
            if map.contains_key(&name) {
                tracing::error!(
                    ability = %name,
                    "duplicate ability name; custom abilities must not clash with reserved ones"
                );
                return Err(Error::DuplicateAbility(name));
            }
            replies.extend(ability.replies().iter().cloned());
            map.insert(name, Arc::new(ability));
        }

        tracing::info!(
            abilities = map.len(),
            replies = replies.len(),
            "abilities registered"
        );
        Ok(Self {
            abilities: map,
            replies,
        })
    }

    /// Exact, case-sensitive lookup.
    pub fn resolve(&self, token: &str) -> Option<Arc<Ability>> {
        self.abilities.get(token).cloned()
    }

    pub fn default_ability(&self) -> Option<Arc<Ability>> {
        self.resolve(DEFAULT)
    }

    pub fn replies(&self) -> &[ReplyRule] {
        &self.replies
    }

    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.abilities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Locality, Privacy};
    use crate::flags::Flag;

    fn ability(name: &str) -> Ability {
        Ability::builder()
            .name(name)
            .privacy(Privacy::Public)
            .locality(Locality::All)
            .action(|_ctx| async { Ok(()) })
            .build()
            .unwrap()
    }

    fn with_reply(name: &str, flag: Flag) -> Ability {
        Ability::builder()
            .name(name)
            .privacy(Privacy::Public)
            .locality(Locality::All)
            .action(|_ctx| async { Ok(()) })
            .reply(|_upd| async { Ok(()) }, vec![flag.into()])
            .build()
            .unwrap()
    }

    #[test]
    fn duplicate_names_fail() {
        let err = Registry::new(vec![ability("ban"), ability("ban")]).unwrap_err();
        assert!(matches!(err, Error::DuplicateAbility(n) if n == "ban"));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let reg = Registry::new(vec![ability("test")]).unwrap();
        assert!(reg.resolve("test").is_some());
        assert!(reg.resolve("Test").is_none());
        assert!(reg.default_ability().is_none());
    }

    #[test]
    fn default_ability_is_found_by_reserved_name() {
        let reg = Registry::new(vec![ability(DEFAULT), ability("x")]).unwrap();
        assert_eq!(reg.default_ability().unwrap().name(), DEFAULT);
        assert_eq!(reg.names(), vec![DEFAULT, "x"]);
    }

    #[test]
    fn replies_are_flattened_in_declaration_order() {
        let reg = Registry::new(vec![
            with_reply("a", Flag::Document),
            ability("b"),
            with_reply("c", Flag::Photo),
        ])
        .unwrap();
        let flags: Vec<String> = reg
            .replies()
            .iter()
            .map(|r| format!("{:?}", r.conditions))
            .collect();
        assert_eq!(flags, vec!["[Flag(Document)]", "[Flag(Photo)]"]);
    }
}
