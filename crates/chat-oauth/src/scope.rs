//! Scope registry.
//!
//! Scopes are drawn from a closed registry. A [`ScopeSet`] keeps its members
//! unique and in insertion order; its textual form joins the names with
//! single spaces.

use std::fmt;
use std::str::FromStr;

use crate::error::ScopeError;

/// A registered access scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    OpenId,
    Profile,
    Read,
    Write,
    PrivateRead,
    PrivateWrite,
    Bot,
    ManageBot,
    Admin,
    ManageClients,
}

impl Scope {
    /// Every registered scope, in advertisement order.
    pub const ALL: [Self; 10] = [
        Self::OpenId,
        Self::Profile,
        Self::Read,
        Self::Write,
        Self::PrivateRead,
        Self::PrivateWrite,
        Self::Bot,
        Self::ManageBot,
        Self::Admin,
        Self::ManageClients,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenId => "openid",
            Self::Profile => "profile",
            Self::Read => "read",
            Self::Write => "write",
            Self::PrivateRead => "private_read",
            Self::PrivateWrite => "private_write",
            Self::Bot => "bot",
            Self::ManageBot => "manage_bot",
            Self::Admin => "admin",
            Self::ManageClients => "manage_clients",
        }
    }
}

impl FromStr for Scope {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| ScopeError::Unknown(s.to_string()))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Membership in the registry.
#[must_use]
pub fn valid(name: &str) -> bool {
    name.parse::<Scope>().is_ok()
}

/// Scope-token grammar: `%x21 / %x23-5B / %x5D-7E`.
fn is_scope_char(c: char) -> bool {
    matches!(c, '\x21' | '\x23'..='\x5B' | '\x5D'..='\x7E')
}

/// An insertion-ordered set of unique scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSet(Vec<Scope>);

impl ScopeSet {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse a whitespace-separated scope string.
    ///
    /// An empty or blank string yields the empty set.
    pub fn parse(text: &str) -> Result<Self, ScopeError> {
        let mut set = Self::new();
        for token in text.split_whitespace() {
            if !token.chars().all(is_scope_char) {
                return Err(ScopeError::IllegalCharacter(token.to_string()));
            }
            let scope: Scope = token.parse()?;
            if !set.insert(scope) {
                return Err(ScopeError::Duplicate(token.to_string()));
            }
        }
        Ok(set)
    }

    /// Add a scope. Returns false if it was already present.
    pub fn insert(&mut self, scope: Scope) -> bool {
        if self.contains(scope) {
            return false;
        }
        self.0.push(scope);
        true
    }

    #[must_use]
    pub fn contains(&self, scope: Scope) -> bool {
        self.0.contains(&scope)
    }

    /// Members of `self` also present in `allowed`, in `self`'s order.
    #[must_use]
    pub fn intersect(&self, allowed: &Self) -> Self {
        Self(self.0.iter().copied().filter(|s| allowed.contains(*s)).collect())
    }

    #[must_use]
    pub fn is_superset_of(&self, other: &Self) -> bool {
        other.0.iter().all(|s| self.contains(*s))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Scope> + '_ {
        self.0.iter().copied()
    }
}

/// Narrow a requested set against an allowed set.
///
/// An empty request means "everything allowed". A non-empty request that
/// shares nothing with `allowed` yields `None`.
#[must_use]
pub fn narrow(requested: &ScopeSet, allowed: &ScopeSet) -> Option<ScopeSet> {
    if requested.is_empty() {
        return Some(allowed.clone());
    }
    let valid = requested.intersect(allowed);
    (!valid.is_empty()).then_some(valid)
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        let mut set = Self::new();
        for scope in iter {
            set.insert(scope);
        }
        set
    }
}

impl<const N: usize> From<[Scope; N]> for ScopeSet {
    fn from(scopes: [Scope; N]) -> Self {
        scopes.into_iter().collect()
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, scope) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(scope.as_str())?;
        }
        Ok(())
    }
}
