//! The build graph: nodes are files keyed by interned path, edges are build
//! steps connecting input nodes to output nodes via a rule.
//!
//! Nodes and edges refer to each other by typed index, never by pointer;
//! both live in dense arenas owned by the Graph.

use crate::eval::{self, Env};
use crate::hash::{self, Hash};
use crate::idvec::{Id, IdVec};
use crate::recipe::{DepsFormat, Rule};
use crate::smallmap::SmallMap;
use anyhow::bail;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(usize);
impl Id for FileId {
    fn from_index(index: usize) -> FileId {
        FileId(index)
    }
    fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(usize);
impl Id for EdgeId {
    fn from_index(index: usize) -> EdgeId {
        EdgeId(index)
    }
    fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(usize);
impl Id for RuleId {
    fn from_index(index: usize) -> RuleId {
        RuleId(index)
    }
    fn index(self) -> usize {
        self.0
    }
}

/// Freshness of a file, as determined by the state engine.  Within one build
/// session a node only moves toward UpToDate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NodeState {
    #[default]
    Unknown,
    NotExist,
    Dirty,
    UpToDate,
}

/// Progress of a build step.  States only ever advance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EdgeState {
    #[default]
    Unknown,
    MustBuild,
    Ready,
    InProgress,
    Completed,
}

/// A file in the graph.
#[derive(Debug)]
pub struct Node {
    pub name: String,
    /// The edge producing this file, if any.  At most one.
    pub in_edge: Option<EdgeId>,
    /// Edges consuming this file.
    pub out_edges: Vec<EdgeId>,
    pub state: NodeState,
    /// Nanosecond stamp recorded when the file was last found on disk.
    pub mtime: Option<u64>,
}

impl Node {
    fn new(name: String) -> Node {
        Node {
            name,
            in_edge: None,
            out_edges: Vec::new(),
            state: NodeState::default(),
            mtime: None,
        }
    }

    pub fn needs_rebuild(&self) -> bool {
        matches!(self.state, NodeState::NotExist | NodeState::Dirty)
    }
}

/// The variable-expanded snapshot of an edge's rule, handed to workers.
#[derive(Clone, Debug)]
pub struct CmdRule {
    pub name: String,
    pub desc: String,
    pub cmdline: String,
    pub depfile: Option<String>,
    pub deps: DepsFormat,
}

/// A build step.  Input and output ids are stored contiguously:
/// inputs as explicit ‖ implicit ‖ order-only, outputs as explicit ‖ implicit.
#[derive(Debug)]
pub struct Edge {
    pub rule: RuleId,
    pub jobs: usize,
    pub state: EdgeState,
    ins: Vec<FileId>,
    explicit_ins: usize,
    implicit_ins: usize,
    outs: Vec<FileId>,
    explicit_outs: usize,
    pub bindings: SmallMap<String, String>,
    translated: Option<CmdRule>,
}

impl Edge {
    pub fn new(
        rule: RuleId,
        jobs: usize,
        ins: [Vec<FileId>; 3],
        outs: [Vec<FileId>; 2],
        bindings: SmallMap<String, String>,
    ) -> Edge {
        let explicit_ins = ins[0].len();
        let implicit_ins = ins[1].len();
        let explicit_outs = outs[0].len();
        let [explicit, implicit, order_only] = ins;
        let [outs_explicit, outs_implicit] = outs;
        Edge {
            rule,
            jobs,
            state: EdgeState::default(),
            ins: explicit
                .into_iter()
                .chain(implicit)
                .chain(order_only)
                .collect(),
            explicit_ins,
            implicit_ins,
            outs: outs_explicit.into_iter().chain(outs_implicit).collect(),
            explicit_outs,
            bindings,
            translated: None,
        }
    }

    /// The inputs substituted for `$in`.
    pub fn explicit_ins(&self) -> &[FileId] {
        &self.ins[..self.explicit_ins]
    }

    /// Explicit and implicit inputs: the ones that participate in the
    /// dirty decision.  Order-only inputs are excluded.
    pub fn update_ins(&self) -> &[FileId] {
        &self.ins[..self.explicit_ins + self.implicit_ins]
    }

    pub fn all_ins(&self) -> &[FileId] {
        &self.ins
    }

    /// The outputs substituted for `$out`.
    pub fn explicit_outs(&self) -> &[FileId] {
        &self.outs[..self.explicit_outs]
    }

    pub fn all_outs(&self) -> &[FileId] {
        &self.outs
    }
}

#[derive(Debug)]
pub struct Graph {
    rules: IdVec<RuleId, Rule>,
    rules_by_name: HashMap<String, RuleId>,
    nodes: IdVec<FileId, Node>,
    by_name: HashMap<String, FileId>,
    edges: IdVec<EdgeId, Edge>,
    /// Recipe top-level bindings, the outermost variable scope.
    pub bindings: SmallMap<String, String>,
    pub cache_dir: PathBuf,
}

impl Graph {
    pub fn new(bindings: SmallMap<String, String>, cache_dir: PathBuf) -> Graph {
        Graph {
            rules: IdVec::new(),
            rules_by_name: HashMap::new(),
            nodes: IdVec::new(),
            by_name: HashMap::new(),
            edges: IdVec::new(),
            bindings,
            cache_dir,
        }
    }

    pub fn add_rule(&mut self, rule: Rule) -> RuleId {
        let name = rule.name.clone();
        let id = self.rules.push(rule);
        self.rules_by_name.insert(name, id);
        id
    }

    pub fn rule_id(&self, name: &str) -> Option<RuleId> {
        self.rules_by_name.get(name).copied()
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id]
    }

    /// Intern a path, creating its node on first sight.
    pub fn file_id(&mut self, name: &str) -> FileId {
        match self.by_name.get(name) {
            Some(&id) => id,
            None => {
                let id = self.nodes.push(Node::new(name.to_string()));
                self.by_name.insert(name.to_string(), id);
                id
            }
        }
    }

    pub fn lookup_file(&self, name: &str) -> Option<FileId> {
        self.by_name.get(name).copied()
    }

    pub fn node(&self, id: FileId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: FileId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        &mut self.edges[id]
    }

    pub fn node_ids(&self) -> impl Iterator<Item = FileId> {
        self.nodes.ids()
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> {
        self.edges.ids()
    }

    /// Nodes no edge consumes; the default build targets.
    pub fn sinks(&self) -> Vec<FileId> {
        self.nodes
            .ids()
            .filter(|&id| self.nodes[id].out_edges.is_empty())
            .collect()
    }

    /// Add an edge, wiring each referenced node's in/out relations.
    /// Fails if any output already has a producer.
    pub fn add_edge(&mut self, edge: Edge) -> anyhow::Result<EdgeId> {
        let id = self.edges.next_id();
        for &out in &edge.outs {
            let node = &mut self.nodes[out];
            if node.in_edge.is_some() {
                bail!("{} is produced by more than one build", node.name);
            }
            node.in_edge = Some(id);
        }
        for &input in &edge.ins {
            self.nodes[input].out_edges.push(id);
        }
        self.edges.push(edge);
        Ok(id)
    }

    /// Register deps discovered by a previous run (or a just-finished task)
    /// as additional implicit inputs of the producing edge.  New ids land
    /// after the implicit-inputs region, before the order-only region.
    pub fn insert_discovered_deps(&mut self, id: EdgeId, deps: &[String]) {
        for dep in deps {
            let fid = self.file_id(dep);
            let edge = &mut self.edges[id];
            if edge.ins.contains(&fid) {
                continue;
            }
            let at = edge.explicit_ins + edge.implicit_ins;
            edge.ins.insert(at, fid);
            edge.implicit_ins += 1;
            let node = &mut self.nodes[fid];
            if !node.out_edges.contains(&id) {
                node.out_edges.push(id);
            }
        }
    }

    /// The edge's rule with all templates expanded.  Expansion happens once,
    /// on first access, and is cached.
    pub fn translated(&mut self, id: EdgeId) -> anyhow::Result<&CmdRule> {
        if self.edges[id].translated.is_none() {
            let snapshot = self.translate(id)?;
            self.edges[id].translated = Some(snapshot);
        }
        Ok(self.edges[id].translated.as_ref().unwrap())
    }

    pub fn cmd_hash(&mut self, id: EdgeId) -> anyhow::Result<Hash> {
        let cmdline = &self.translated(id)?.cmdline;
        Ok(hash::hash_command(cmdline))
    }

    fn translate(&self, id: EdgeId) -> anyhow::Result<CmdRule> {
        let edge = &self.edges[id];
        let rule = &self.rules[edge.rule];
        let ins: Vec<&str> = edge
            .explicit_ins()
            .iter()
            .map(|&f| self.nodes[f].name.as_str())
            .collect();
        let outs: Vec<&str> = edge
            .explicit_outs()
            .iter()
            .map(|&f| self.nodes[f].name.as_str())
            .collect();
        let envs: [&dyn Env; 2] = [&edge.bindings, &self.bindings];
        let cmdline = eval::expand(&rule.command, &ins, &outs, &envs)?;
        let desc = eval::expand(&rule.description, &ins, &outs, &envs)?;
        let depfile = match &rule.depfile {
            Some(template) => Some(eval::expand(template, &ins, &outs, &envs)?),
            None => None,
        };
        Ok(CmdRule {
            name: rule.name.clone(),
            desc,
            cmdline,
            depfile,
            deps: rule.deps,
        })
    }
}
