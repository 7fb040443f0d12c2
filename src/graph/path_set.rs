// PathSet - enumerated routes grouped by their (unordered) endpoint pair

use ethers::types::Address;
use std::collections::HashMap;

/// Ordered, duplicate-free token sequence; at least two tokens once recorded.
pub type Path = Vec<Address>;

/// Endpoint pair of a group of paths. The stored orientation is whichever direction was
/// recorded first; lookups accept both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub token0: Address,
    pub token1: Address,
}

impl PairKey {
    pub fn new(token0: Address, token1: Address) -> Self {
        Self { token0, token1 }
    }

    pub fn inverse(&self) -> Self {
        Self {
            token0: self.token1,
            token1: self.token0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathSet {
    paths: HashMap<PairKey, Vec<Path>>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a path under its endpoint pair. Paths shorter than two tokens are ignored.
    pub fn add_path(&mut self, path: Path) {
        let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
            return;
        };
        if path.len() < 2 {
            return;
        }

        let key = PairKey::new(first, last);
        if let Some(paths) = self.paths.get_mut(&key) {
            paths.push(path);
        } else if let Some(paths) = self.paths.get_mut(&key.inverse()) {
            paths.push(path);
        } else {
            self.paths.insert(key, vec![path]);
        }
    }

    pub fn add_paths(&mut self, paths: impl IntoIterator<Item = Path>) {
        for path in paths {
            self.add_path(path);
        }
    }

    /// All paths connecting the two tokens, each oriented to start at `from`.
    pub fn paths_between(&self, from: Address, to: Address) -> Vec<Path> {
        let key = PairKey::new(from, to);
        let stored = self
            .paths
            .get(&key)
            .or_else(|| self.paths.get(&key.inverse()));

        let Some(stored) = stored else {
            return Vec::new();
        };

        stored
            .iter()
            .map(|path| {
                if path.first() == Some(&from) {
                    path.clone()
                } else {
                    path.iter().rev().copied().collect()
                }
            })
            .collect()
    }

    /// Stored groups, in stored orientation.
    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &Vec<Path>)> {
        self.paths.iter()
    }

    /// Number of endpoint pairs.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of paths across all pairs.
    pub fn path_count(&self) -> usize {
        self.paths.values().map(Vec::len).sum()
    }
}
