//! Current-user session resolved from an external key-value profile store.
//!
//! The core never manages login or logout. It reads whatever profile the
//! host environment stored and turns it into an explicit [`Session`] value
//! that the mutation controller and the comment reconciler receive, so role
//! checks never reach into ambient storage.

use serde_json::Value;

use crate::record::{int_at, string_at, USER_ID_KEYS};

/// Storage keys probed for the profile object, in order.
pub const PROFILE_KEYS: &[&str] = &["user", "usuario"];

/// Storage keys probed for a bearer token, in order.
pub const TOKEN_KEYS: &[&str] = &["authToken", "token"];

/// Read-only view of the host's key-value store.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Citizen,
}

impl Role {
    /// Admin iff a `role`/`rol` field (any key casing) holds `"admin"` in
    /// any value casing. Everything else, including a missing field, is an
    /// ordinary citizen.
    pub fn from_profile(profile: &Value) -> Role {
        let Some(obj) = profile.as_object() else {
            return Role::Citizen;
        };
        let admin = obj
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("role") || k.eq_ignore_ascii_case("rol"))
            .and_then(|(_, v)| v.as_str())
            .map(|v| v.trim().eq_ignore_ascii_case("admin"))
            .unwrap_or(false);
        if admin {
            Role::Admin
        } else {
            Role::Citizen
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: Option<i64>,
    pub name: Option<String>,
    pub role: Role,
    pub token: Option<String>,
}

impl Session {
    pub fn new(user_id: Option<i64>, name: Option<String>, role: Role) -> Self {
        Self {
            user_id,
            name,
            role,
            token: None,
        }
    }

    /// Session of a visitor with no stored profile.
    pub fn anonymous() -> Self {
        Self::new(None, None, Role::Citizen)
    }

    /// Resolve the current session from the store. Missing or unparseable
    /// profiles degrade to an anonymous citizen, never an error.
    pub fn resolve(store: &dyn SessionStore) -> Session {
        let token = TOKEN_KEYS
            .iter()
            .find_map(|k| store.get(k))
            .and_then(|v| v.as_str().map(str::to_string));

        for key in PROFILE_KEYS {
            if let Some(profile) = store.get(key) {
                if profile.is_object() {
                    return Session {
                        user_id: int_at(&profile, USER_ID_KEYS),
                        name: string_at(&profile, &["nombre", "name"]),
                        role: Role::from_profile(&profile),
                        token,
                    };
                }
            }
        }
        Session { token, ..Session::anonymous() }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// True when this session may mutate a record authored by `author_id`:
    /// admins always, ordinary users only for their own records.
    pub fn can_mutate(&self, author_id: Option<i64>) -> bool {
        if self.is_admin() {
            return true;
        }
        match (self.user_id, author_id) {
            (Some(me), Some(author)) => me == author,
            _ => false,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
