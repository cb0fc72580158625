//! Removing everything a build produced: output files, their depfiles,
//! directories left empty, and the command log.

use crate::db;
use crate::graph::Graph;
use anyhow::Context;
use std::path::Path;

/// Delete every produced output and depfile plus the command log.
/// Returns the number of files removed.
pub fn clean(graph: &mut Graph) -> anyhow::Result<usize> {
    let mut removed = 0;
    for id in graph.node_ids().collect::<Vec<_>>() {
        if graph.node(id).in_edge.is_none() {
            continue;
        }
        let name = graph.node(id).name.clone();
        if remove_and_prune(Path::new(&name))? {
            removed += 1;
        }
    }
    for id in graph.edge_ids().collect::<Vec<_>>() {
        let depfile = graph.translated(id)?.depfile.clone();
        if let Some(depfile) = depfile {
            if remove_and_prune(Path::new(&depfile))? {
                removed += 1;
            }
        }
    }
    let log_path = graph.cache_dir.join(db::LOG_FILE_NAME);
    match std::fs::remove_file(&log_path) {
        Ok(()) => removed += 1,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("remove {}", log_path.display()));
        }
    }
    Ok(removed)
}

/// Delete a file; if that leaves its directory empty, delete the directory.
fn remove_and_prune(path: &Path) -> anyhow::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err).with_context(|| format!("remove {}", path.display())),
    }
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            if let Ok(mut entries) = std::fs::read_dir(dir) {
                if entries.next().is_none() {
                    let _ = std::fs::remove_dir(dir);
                }
            }
        }
    }
    Ok(true)
}
