//! Freshness decisions: classifying each node as missing, dirty, or up to
//! date by combining on-disk mtimes, the command log, and the command hash.

use crate::db;
use crate::fs::{self, MTime};
use crate::graph::{FileId, Graph, NodeState};
use anyhow::bail;

/// Classify a node unless it has already been classified this session.
pub fn check_state_if_needed(graph: &mut Graph, log: &db::Log, id: FileId) -> anyhow::Result<()> {
    if graph.node(id).state != NodeState::Unknown {
        return Ok(());
    }
    check_state(graph, log, id)
}

fn check_state(graph: &mut Graph, log: &db::Log, id: FileId) -> anyhow::Result<()> {
    let name = graph.node(id).name.clone();
    let in_edge = graph.node(id).in_edge;

    let edge = match in_edge {
        None => {
            // A primary input: it must exist on disk.
            match fs::stat(&name)? {
                MTime::Missing => bail!("input {} missing", name),
                MTime::Stamp(mtime) => {
                    let node = graph.node_mut(id);
                    node.mtime = Some(mtime);
                    node.state = NodeState::UpToDate;
                }
            }
            return Ok(());
        }
        Some(edge) => edge,
    };

    let mtime = match fs::stat(&name)? {
        MTime::Missing => {
            graph.node_mut(id).state = NodeState::NotExist;
            return Ok(());
        }
        MTime::Stamp(mtime) => mtime,
    };
    graph.node_mut(id).mtime = Some(mtime);

    // A prior run may have discovered extra inputs; they take part in the
    // decision below just like declared implicit inputs.
    if let Some(entry) = log.entry(&name) {
        if !entry.deps.is_empty() {
            let deps = entry.deps.clone();
            graph.insert_discovered_deps(edge, &deps);
        }
    }

    let inputs = graph.edge(edge).update_ins().to_vec();
    let mut dirty = false;
    let mut most_recent_input = 0u64;
    for input in inputs {
        check_state_if_needed(graph, log, input)?;
        let node = graph.node(input);
        if node.needs_rebuild() {
            dirty = true;
        } else if let Some(input_mtime) = node.mtime {
            if input_mtime > mtime {
                dirty = true;
            }
            if input_mtime > most_recent_input {
                most_recent_input = input_mtime;
            }
        }
    }

    if !dirty {
        match log.entry(&name) {
            None => dirty = true,
            Some(entry) => {
                let cmd_hash = graph.cmd_hash(edge)?;
                if cmd_hash != entry.cmd_hash || most_recent_input > entry.mtime {
                    dirty = true;
                }
            }
        }
    }

    graph.node_mut(id).state = if dirty {
        NodeState::Dirty
    } else {
        NodeState::UpToDate
    };
    Ok(())
}

/// Record a successfully rebuilt output: refresh its mtime, log the new
/// `{mtime, cmd_hash, deps}` entry, and mark it up to date.
pub fn post_build(
    graph: &mut Graph,
    log: &mut db::Log,
    id: FileId,
    deps: &[String],
) -> anyhow::Result<()> {
    let name = graph.node(id).name.clone();
    let mtime = match fs::stat(&name)? {
        MTime::Missing => bail!("output {} missing after successful build", name),
        MTime::Stamp(mtime) => mtime,
    };
    let edge = match graph.node(id).in_edge {
        Some(edge) => edge,
        None => bail!("{} has no producing build", name),
    };
    let cmd_hash = graph.cmd_hash(edge)?;
    log.set_entry(
        name,
        db::Entry {
            mtime,
            cmd_hash,
            deps: deps.to_vec(),
        },
    );
    let node = graph.node_mut(id);
    node.mtime = Some(mtime);
    node.state = NodeState::UpToDate;
    Ok(())
}
