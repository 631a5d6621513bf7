//! Package categories and per-category name sets.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A namespace of packages owned by one package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Third-party Homebrew source.
    Tap,
    /// CLI-oriented Homebrew package.
    Formula,
    /// GUI application distributed through Homebrew.
    Cask,
    /// Globally installed npm package.
    Npm,
}

impl Category {
    /// Install order: taps first so their formulae and casks resolve.
    pub const INSTALL_ORDER: [Category; 4] =
        [Category::Tap, Category::Formula, Category::Cask, Category::Npm];

    /// Removal order: a tap is untapped only after its packages are gone.
    pub const REMOVAL_ORDER: [Category; 4] =
        [Category::Formula, Category::Cask, Category::Npm, Category::Tap];

    /// Plural display name, as used in summaries.
    pub fn plural(&self) -> &'static str {
        match self {
            Category::Tap => "taps",
            Category::Formula => "formulae",
            Category::Cask => "casks",
            Category::Npm => "npm globals",
        }
    }

    /// Categories whose manager may legitimately be missing.
    pub fn is_optional(&self) -> bool {
        matches!(self, Category::Tap | Category::Npm)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Tap => "tap",
            Category::Formula => "formula",
            Category::Cask => "cask",
            Category::Npm => "npm",
        };
        write!(f, "{}", s)
    }
}

/// Unique package names per category.
///
/// Used both for the declared (desired) state and the live (installed) state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageState {
    pub taps: BTreeSet<String>,
    pub formulae: BTreeSet<String>,
    pub casks: BTreeSet<String>,
    pub npm: BTreeSet<String>,
}

/// What the user declared they want installed.
pub type DesiredState = PackageState;

/// What the package managers report as installed right now.
pub type InstalledState = PackageState;

impl PackageState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: Category) -> &BTreeSet<String> {
        match category {
            Category::Tap => &self.taps,
            Category::Formula => &self.formulae,
            Category::Cask => &self.casks,
            Category::Npm => &self.npm,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut BTreeSet<String> {
        match category {
            Category::Tap => &mut self.taps,
            Category::Formula => &mut self.formulae,
            Category::Cask => &mut self.casks,
            Category::Npm => &mut self.npm,
        }
    }

    /// Replace one category wholesale.
    pub fn set(&mut self, category: Category, names: BTreeSet<String>) {
        *self.get_mut(category) = names;
    }

    /// Builder-style insertion, mostly for tests and fixtures.
    pub fn with<I, S>(mut self, category: Category, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.get_mut(category)
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Total number of names across all categories.
    pub fn len(&self) -> usize {
        Category::INSTALL_ORDER
            .iter()
            .map(|c| self.get(*c).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate `(category, name)` pairs in install order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &str)> + '_ {
        Category::INSTALL_ORDER
            .into_iter()
            .flat_map(move |c| self.get(c).iter().map(move |n| (c, n.as_str())))
    }
}
