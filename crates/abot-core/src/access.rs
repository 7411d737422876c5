//! Access levels and chat locality.

use std::sync::Arc;

use crate::{
    domain::{ChatId, UserId},
    store::{group_name, Store, ADMINS},
    Result,
};

/// Minimum authorization level of an ability, and the effective level of a
/// caller. Ordered: `Public < Admin < Creator`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Privacy {
    Public,
    Admin,
    Creator,
}

/// Which chat kinds an ability may run in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Locality {
    /// One-to-one chats only.
    User,
    /// Group chats only.
    Group,
    All,
}

impl Locality {
    pub fn allows(self, is_private_chat: bool) -> bool {
        match self {
            Locality::All => true,
            Locality::User => is_private_chat,
            Locality::Group => !is_private_chat,
        }
    }
}

pub fn is_allowed_locality(is_private_chat: bool, ability_locality: Locality) -> bool {
    ability_locality.allows(is_private_chat)
}

/// Whether `ADMINS` is one global set or one set per chat.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AdminScope {
    #[default]
    Global,
    PerChat,
}

/// Identity checks against the configured creator and the stored admin set.
///
/// Admin membership is read from the store on every call so promotions and
/// demotions take effect on the very next update.
#[derive(Clone)]
pub struct AccessModel {
    creator_id: UserId,
    admin_scope: AdminScope,
    store: Arc<Store>,
}

impl AccessModel {
    pub fn new(creator_id: UserId, admin_scope: AdminScope, store: Arc<Store>) -> Self {
        Self {
            creator_id,
            admin_scope,
            store,
        }
    }

    pub fn creator_id(&self) -> UserId {
        self.creator_id
    }

    pub fn is_creator(&self, id: UserId) -> bool {
        id == self.creator_id
    }

    /// Name of the admin collection that applies in `chat_id`.
    pub fn admins_collection(&self, chat_id: ChatId) -> String {
        match self.admin_scope {
            AdminScope::Global => ADMINS.to_string(),
            AdminScope::PerChat => group_name(ADMINS, chat_id),
        }
    }

    pub fn is_admin(&self, id: UserId, chat_id: ChatId) -> Result<bool> {
        self.store
            .set::<UserId>(&self.admins_collection(chat_id))?
            .contains(&id)
    }

    pub fn effective_privacy(&self, id: UserId, chat_id: ChatId) -> Result<Privacy> {
        if self.is_creator(id) {
            return Ok(Privacy::Creator);
        }
        if self.is_admin(id, chat_id)? {
            return Ok(Privacy::Admin);
        }
        Ok(Privacy::Public)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BLACKLIST;

    const CREATOR: UserId = UserId(1337);
    const CHAT: ChatId = ChatId(10);

    fn model(scope: AdminScope) -> (Arc<Store>, AccessModel) {
        let store = Arc::new(Store::in_memory());
        (store.clone(), AccessModel::new(CREATOR, scope, store))
    }

    #[test]
    fn privacy_is_totally_ordered() {
        assert!(Privacy::Public < Privacy::Admin);
        assert!(Privacy::Admin < Privacy::Creator);
    }

    #[test]
    fn creator_is_always_creator() {
        let (store, access) = model(AdminScope::Global);
        store.set::<UserId>(ADMINS).unwrap().insert(&CREATOR).unwrap();
        store.set::<UserId>(BLACKLIST).unwrap().insert(&CREATOR).unwrap();
        assert_eq!(
            access.effective_privacy(CREATOR, CHAT).unwrap(),
            Privacy::Creator
        );
    }

    #[test]
    fn admin_membership_is_read_live() {
        let (store, access) = model(AdminScope::Global);
        let user = UserId(1);
        assert_eq!(access.effective_privacy(user, CHAT).unwrap(), Privacy::Public);
        store.set::<UserId>(ADMINS).unwrap().insert(&user).unwrap();
        assert_eq!(access.effective_privacy(user, CHAT).unwrap(), Privacy::Admin);
        store.set::<UserId>(ADMINS).unwrap().remove(&user).unwrap();
        assert_eq!(access.effective_privacy(user, CHAT).unwrap(), Privacy::Public);
    }

    #[test]
    fn per_chat_admins_do_not_leak_across_chats() {
        let (store, access) = model(AdminScope::PerChat);
        let user = UserId(1);
        store
            .set::<UserId>(&access.admins_collection(CHAT))
            .unwrap()
            .insert(&user)
            .unwrap();
        assert_eq!(access.effective_privacy(user, CHAT).unwrap(), Privacy::Admin);
        assert_eq!(
            access.effective_privacy(user, ChatId(11)).unwrap(),
            Privacy::Public
        );
    }

    #[test]
    fn locality_matrix() {
        assert!(is_allowed_locality(true, Locality::All));
        assert!(is_allowed_locality(false, Locality::All));
        assert!(is_allowed_locality(true, Locality::User));
        assert!(!is_allowed_locality(false, Locality::User));
        assert!(is_allowed_locality(false, Locality::Group));
        assert!(!is_allowed_locality(true, Locality::Group));
    }
}
