//! Access predicates.
//!
//! Each predicate is a plain function of the authenticated actor and the facts
//! about the target that the caller already looked up (is the site public,
//! does a `site_admin` row exist, who wrote the comment). `MegaAdmin` passes
//! every check.

use crate::Role;

/// The authenticated user behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_mega_admin(&self) -> bool {
        self.role.is_mega_admin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn from_name(name: &str) -> Option<Method> {
        Some(match name {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            _ => return None,
        })
    }

    /// GET, HEAD and OPTIONS.
    pub fn is_safe(&self) -> bool {
        matches!(self, Method::Get | Method::Head | Method::Options)
    }
}

/// What the caller knows about a site when checking access to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SiteAccess {
    pub is_public: bool,
    /// A `site_admin` row links the actor to the site.
    pub is_admin: bool,
}

/// Public sites are readable by anyone, including anonymous visitors.
/// Private sites only by their forest stewards and mega admins.
pub fn can_read_site(actor: Option<&Actor>, site: SiteAccess) -> bool {
    if site.is_public {
        return true;
    }
    match actor {
        Some(actor) if actor.is_mega_admin() => true,
        Some(actor) => actor.role == Role::ForestSteward && site.is_admin,
        None => false,
    }
}

pub fn can_manage_site(actor: &Actor, is_site_admin: bool) -> bool {
    actor.is_mega_admin() || is_site_admin
}

/// The author, an admin of the post's site, or a mega admin.
pub fn can_delete_comment(actor: &Actor, author_id: i64, is_site_admin: bool) -> bool {
    actor.is_mega_admin() || actor.user_id == author_id || is_site_admin
}

/// Safe methods pass for everyone; anything else needs a mega admin.
pub fn mega_admin_or_read_only(actor: Option<&Actor>, method: Method) -> bool {
    method.is_safe() || actor.is_some_and(Actor::is_mega_admin)
}

pub fn is_current_user(actor: &Actor, user_id: i64) -> bool {
    actor.is_mega_admin() || actor.user_id == user_id
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEWARD: Actor = Actor {
        user_id: 2,
        role: Role::ForestSteward,
    };
    const MEGA: Actor = Actor {
        user_id: 1,
        role: Role::MegaAdmin,
    };
    const VISITOR: Actor = Actor {
        user_id: 3,
        role: Role::User,
    };

    fn private(is_admin: bool) -> SiteAccess {
        SiteAccess {
            is_public: false,
            is_admin,
        }
    }

    #[test]
    fn steward_is_scoped_to_its_sites() {
        // admin row for site X, none for site Y
        assert!(can_read_site(Some(&STEWARD), private(true)));
        assert!(can_manage_site(&STEWARD, true));
        assert!(!can_read_site(Some(&STEWARD), private(false)));
        assert!(!can_manage_site(&STEWARD, false));
    }

    #[test]
    fn mega_admin_bypasses_everything() {
        assert!(can_read_site(Some(&MEGA), private(false)));
        assert!(can_manage_site(&MEGA, false));
        assert!(can_delete_comment(&MEGA, 42, false));
        assert!(is_current_user(&MEGA, 42));
        assert!(mega_admin_or_read_only(Some(&MEGA), Method::Delete));
    }

    #[test]
    fn public_sites_are_readable_by_anyone() {
        let public = SiteAccess {
            is_public: true,
            is_admin: false,
        };
        assert!(can_read_site(None, public));
        assert!(can_read_site(Some(&VISITOR), public));
        assert!(!can_read_site(None, private(false)));
    }

    #[test]
    fn regular_user_with_stale_admin_row_cannot_read_private_site() {
        assert!(!can_read_site(Some(&VISITOR), private(true)));
    }

    #[test]
    fn comment_deletion() {
        assert!(can_delete_comment(&VISITOR, VISITOR.user_id, false));
        assert!(!can_delete_comment(&VISITOR, 99, false));
        assert!(can_delete_comment(&STEWARD, 99, true));
        assert!(!can_delete_comment(&STEWARD, 99, false));
    }

    #[test]
    fn read_only_except_mega_admin() {
        for method in [Method::Get, Method::Head, Method::Options] {
            assert!(mega_admin_or_read_only(None, method));
        }
        for method in [Method::Post, Method::Put, Method::Patch, Method::Delete] {
            assert!(!mega_admin_or_read_only(None, method));
            assert!(!mega_admin_or_read_only(Some(&STEWARD), method));
            assert!(mega_admin_or_read_only(Some(&MEGA), method));
        }
    }

    #[test]
    fn method_names() {
        assert_eq!(Method::from_name("PATCH"), Some(Method::Patch));
        assert_eq!(Method::from_name("patch"), None);
    }

    #[test]
    fn current_user() {
        assert!(is_current_user(&VISITOR, 3));
        assert!(!is_current_user(&VISITOR, 4));
    }
}
