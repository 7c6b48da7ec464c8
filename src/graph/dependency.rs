// src/graph/dependency.rs

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, warn};

use crate::errors::{ParlessError, Result};
use crate::fs::FileSystem;
use crate::graph::imports::{parse_imports, ImportSpec};
use crate::graph::resolver::ImportResolver;

/// One node of the import graph.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Raw import statements, in source order.
    pub imports: Vec<ImportSpec>,
    /// Files that import this one.
    pub parents: BTreeSet<PathBuf>,
    /// Files this one imports.
    pub children: BTreeSet<PathBuf>,
    /// Discovered by the directory scan (as opposed to only via an import).
    pub scanned: bool,
}

impl SourceFile {
    fn new(path: PathBuf, scanned: bool) -> Self {
        Self {
            path,
            imports: Vec::new(),
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
            scanned,
        }
    }
}

/// Output of [`DependencyGraph::affected_targets`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AffectedTargets {
    /// Targets to compile, in discovery order.
    pub targets: Vec<PathBuf>,
    /// Every file a worker must hold in its cache to compile `targets`.
    pub files_to_read: BTreeSet<PathBuf>,
}

/// Import graph for one run.
///
/// Edges are always stored in both directions: if A imports B then
/// `A.children` contains B and `B.parents` contains A. Import cycles are
/// allowed; every traversal is guarded by a visited set.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    files: HashMap<PathBuf, SourceFile>,
    /// Scanned files in discovery order.
    discovery: Vec<PathBuf>,
}

impl DependencyGraph {
    /// Read every scanned file, follow its imports transitively, and wire
    /// parent/child edges.
    ///
    /// Imports that cannot be resolved are logged and left out of the graph;
    /// compiling the importing file reports them properly later. CSS imports
    /// never become nodes.
    pub fn build(
        fs: &dyn FileSystem,
        resolver: &mut ImportResolver,
        scanned: &[PathBuf],
    ) -> Result<Self> {
        let mut graph = DependencyGraph::default();
        let mut worklist: VecDeque<PathBuf> = VecDeque::new();

        for path in scanned {
            if graph.files.contains_key(path) {
                continue;
            }
            graph
                .files
                .insert(path.clone(), SourceFile::new(path.clone(), true));
            graph.discovery.push(path.clone());
            worklist.push_back(path.clone());
        }

        while let Some(path) = worklist.pop_front() {
            let contents = fs
                .read_to_string(&path)
                .map_err(|e| ParlessError::read_failed(&path, e))?;
            let imports = parse_imports(&contents);

            for spec in imports.iter().filter(|s| !s.is_css()) {
                let child = match resolver.resolve(&spec.path, &path) {
                    Ok(child) => child,
                    Err(err) => {
                        if spec.options.optional {
                            debug!(file = ?path, spec = %spec.path, "optional import not found");
                        } else {
                            warn!(file = ?path, error = %err, "unresolved import; leaving it out of the graph");
                        }
                        continue;
                    }
                };

                if !graph.files.contains_key(&child) {
                    debug!(parent = ?path, child = ?child, "discovered imported file");
                    graph
                        .files
                        .insert(child.clone(), SourceFile::new(child.clone(), false));
                    worklist.push_back(child.clone());
                }

                graph.link(&path, &child);
            }

            if let Some(file) = graph.files.get_mut(&path) {
                file.imports = imports;
            }
        }

        debug!(
            files = graph.files.len(),
            scanned = graph.discovery.len(),
            "dependency graph built"
        );
        Ok(graph)
    }

    fn link(&mut self, parent: &Path, child: &Path) {
        if let Some(p) = self.files.get_mut(parent) {
            p.children.insert(child.to_path_buf());
        }
        if let Some(c) = self.files.get_mut(child) {
            c.parents.insert(parent.to_path_buf());
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&SourceFile> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// All known files (scanned and imported), unordered.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    pub fn parents_of(&self, path: &Path) -> impl Iterator<Item = &PathBuf> {
        self.files.get(path).into_iter().flat_map(|f| f.parents.iter())
    }

    pub fn children_of(&self, path: &Path) -> impl Iterator<Item = &PathBuf> {
        self.files.get(path).into_iter().flat_map(|f| f.children.iter())
    }

    /// A target is a scanned file that no other known file imports.
    pub fn is_target(&self, path: &Path) -> bool {
        self.files
            .get(path)
            .map(|f| f.scanned && f.parents.is_empty())
            .unwrap_or(false)
    }

    /// Top-level targets in discovery order.
    pub fn targets(&self) -> Vec<PathBuf> {
        self.discovery
            .iter()
            .filter(|p| self.is_target(p))
            .cloned()
            .collect()
    }

    /// Transitive closure over child edges, excluding `path` itself unless
    /// it sits on a cycle.
    pub fn descendants(&self, path: &Path) -> BTreeSet<PathBuf> {
        self.closure(path, |f| &f.children)
    }

    /// Transitive closure over parent edges (the ancestor closure).
    pub fn ancestors(&self, path: &Path) -> BTreeSet<PathBuf> {
        self.closure(path, |f| &f.parents)
    }

    fn closure<F>(&self, start: &Path, next: F) -> BTreeSet<PathBuf>
    where
        F: Fn(&SourceFile) -> &BTreeSet<PathBuf>,
    {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&PathBuf> = match self.files.get(start) {
            Some(f) => next(f).iter().collect(),
            None => return seen,
        };

        while let Some(path) = stack.pop() {
            if !seen.insert(path.clone()) {
                continue;
            }
            if let Some(f) = self.files.get(path) {
                stack.extend(next(f).iter());
            }
        }

        seen
    }

    /// Decide what must be rebuilt for a set of changed files.
    ///
    /// With no changed files every target is rebuilt. Otherwise a target is
    /// rebuilt when it changed itself or when one of its descendants
    /// changed. `files_to_read` holds the targets, their full descendant
    /// closures, and for each changed file that is not a target the file
    /// itself plus its direct parents. Only one level of parents is added
    /// there; grandparents reach the set only through a target's closure.
    pub fn affected_targets(&self, changed: &[PathBuf]) -> AffectedTargets {
        let all_targets = self.targets();

        let targets: Vec<PathBuf> = if changed.is_empty() {
            all_targets
        } else {
            let changed_set: HashSet<&PathBuf> = changed
                .iter()
                .filter(|p| {
                    let known = self.contains(p);
                    if !known {
                        warn!(file = ?p, "changed file is not part of the import graph; ignoring");
                    }
                    known
                })
                .collect();

            all_targets
                .into_iter()
                .filter(|t| {
                    changed_set.contains(t)
                        || self.descendants(t).iter().any(|d| changed_set.contains(d))
                })
                .collect()
        };

        let mut files_to_read: BTreeSet<PathBuf> = BTreeSet::new();
        for target in &targets {
            files_to_read.insert(target.clone());
            files_to_read.extend(self.descendants(target));
        }

        for path in changed {
            if !self.contains(path) || self.is_target(path) {
                continue;
            }
            files_to_read.insert(path.clone());
            files_to_read.extend(self.parents_of(path).cloned());
        }

        AffectedTargets {
            targets,
            files_to_read,
        }
    }

    /// Groups of files that import each other, directly or indirectly.
    ///
    /// Each group is sorted; self-imports show up as single-element groups.
    pub fn import_cycles(&self) -> Vec<Vec<PathBuf>> {
        let mut graph: DiGraph<&Path, ()> = DiGraph::new();
        let mut index: HashMap<&Path, NodeIndex> = HashMap::new();

        for path in self.files.keys() {
            index.insert(path.as_path(), graph.add_node(path.as_path()));
        }
        for file in self.files.values() {
            for child in &file.children {
                if let (Some(&a), Some(&b)) =
                    (index.get(file.path.as_path()), index.get(child.as_path()))
                {
                    graph.add_edge(a, b, ());
                }
            }
        }

        let mut cycles: Vec<Vec<PathBuf>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut paths: Vec<PathBuf> =
                    scc.into_iter().map(|n| graph[n].to_path_buf()).collect();
                paths.sort();
                paths
            })
            .collect();
        cycles.sort();
        cycles
    }
}
