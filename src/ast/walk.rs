//! Walking the member graph.
//!
//! After phase 3 every definition has a merged member table; walking it
//! recursively yields *member paths* rather than bare definitions, because
//! the same definition can be contained multiple times through different
//! members. The last element of a path is the reached definition.

use crate::ast::{Arena, DefId};
use crate::foundation::KindSet;

/// Depth-first iterator over all member paths below a definition.
///
/// For each member the path of the member itself is yielded before the
/// paths of its own members. The kind restriction applies to the final
/// element of a path only; intermediate containers are always traversed.
/// The root is not yielded.
pub struct ContainedPaths<'a> {
    arena: &'a Arena,
    kinds: KindSet,
    frames: Vec<(DefId, usize)>,
    path: Vec<DefId>,
}

impl<'a> ContainedPaths<'a> {
    fn new(arena: &'a Arena, root: DefId, kinds: KindSet) -> Self {
        Self {
            arena,
            kinds,
            frames: vec![(root, 0)],
            path: Vec::new(),
        }
    }
}

impl<'a> Iterator for ContainedPaths<'a> {
    type Item = Vec<DefId>;

    fn next(&mut self) -> Option<Vec<DefId>> {
        loop {
            let (node, index) = *self.frames.last()?;
            let member = self
                .arena
                .def(node)
                .members
                .get_index(index)
                .map(|(_, &id)| id);
            match member {
                Some(member) => {
                    self.frames.last_mut().expect("frame just read").1 += 1;
                    self.frames.push((member, 0));
                    self.path.push(member);
                    if self.kinds.contains(self.arena.def(member).kind) {
                        return Some(self.path.clone());
                    }
                }
                None => {
                    self.frames.pop();
                    // the root frame has no path entry
                    if !self.frames.is_empty() {
                        self.path.pop();
                    }
                }
            }
        }
    }
}

impl Arena {
    /// Iterate over every member path below `root`, restricted by kind.
    ///
    /// Reliable after phase 3.
    pub fn contained_paths(&self, root: DefId, kinds: KindSet) -> ContainedPaths<'_> {
        ContainedPaths::new(self, root, kinds)
    }

    /// True when `item` is reachable through the member graph of `root`.
    ///
    /// This is dynamic containment; for static containment use
    /// [`Arena::owns`].
    pub fn contains(&self, root: DefId, item: DefId) -> bool {
        self.contained_paths(root, KindSet::any())
            .any(|path| *path.last().expect("paths are non-empty") == item)
    }
}
