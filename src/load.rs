//! Loading: recipe file -> Recipe -> path rebasing -> Graph.

use crate::graph::{Edge, FileId, Graph};
use crate::recipe::{self, Recipe};
use anyhow::{anyhow, bail};
use std::path::Path;

/// Read and parse a recipe file and construct its build graph.  Paths in
/// the recipe are relative to the recipe's directory and are rebased so
/// they stay correct from the process CWD.
pub fn read(path: &Path) -> anyhow::Result<Graph> {
    let mut bytes =
        std::fs::read(path).map_err(|err| anyhow!("read {}: {}", path.display(), err))?;
    if std::str::from_utf8(&bytes).is_err() {
        bail!("{} is not valid UTF-8", path.display());
    }
    bytes.push(0);
    let mut parser = recipe::Parser::new(&bytes);
    let mut recipe = parser
        .read_recipe()
        .map_err(|err| anyhow!(parser.format_parse_error(path, err)))?;
    if let Some(dir) = path.parent() {
        rebase(&mut recipe, dir);
    }
    build_graph(recipe)
}

fn rebase(recipe: &mut Recipe, dir: &Path) {
    if dir.as_os_str().is_empty() || dir == Path::new(".") {
        return;
    }
    fn rebase_path(dir: &Path, path: &mut String) {
        if !Path::new(path.as_str()).is_absolute() {
            *path = dir.join(path.as_str()).to_string_lossy().into_owned();
        }
    }
    for build in &mut recipe.builds {
        for path in build
            .ins
            .iter_mut()
            .chain(build.implicit_ins.iter_mut())
            .chain(build.order_only_ins.iter_mut())
            .chain(build.outs.iter_mut())
            .chain(build.implicit_outs.iter_mut())
        {
            rebase_path(dir, path);
        }
    }
    for rule in &mut recipe.rules {
        // A literal relative depfile resolves against the recipe's
        // directory; templates with variable references resolve through
        // the already-rebased paths they substitute.
        if let Some(depfile) = &mut rule.depfile {
            if !depfile.contains('$') {
                rebase_path(dir, depfile);
            }
        }
    }
    if !recipe.cache_dir.is_absolute() {
        recipe.cache_dir = dir.join(&recipe.cache_dir);
    }
}

/// Construct the graph in one pass over the recipe: index rules, intern
/// every path, and wire up one edge per build.
pub fn build_graph(recipe: Recipe) -> anyhow::Result<Graph> {
    fn intern(graph: &mut Graph, paths: &[String]) -> Vec<FileId> {
        paths.iter().map(|path| graph.file_id(path)).collect()
    }

    let mut graph = Graph::new(recipe.bindings, recipe.cache_dir);
    for rule in recipe.rules {
        graph.add_rule(rule);
    }
    for build in recipe.builds {
        let rule = graph
            .rule_id(&build.rule)
            .ok_or_else(|| anyhow!("unknown rule {:?}", build.rule))?;
        let jobs = build.jobs.unwrap_or_else(|| graph.rule(rule).jobs);
        if jobs == 0 {
            bail!("build of rule {:?} has zero jobs", build.rule);
        }
        let ins = [
            intern(&mut graph, &build.ins),
            intern(&mut graph, &build.implicit_ins),
            intern(&mut graph, &build.order_only_ins),
        ];
        let outs = [
            intern(&mut graph, &build.outs),
            intern(&mut graph, &build.implicit_outs),
        ];
        graph.add_edge(Edge::new(rule, jobs, ins, outs, build.bindings))?;
    }
    Ok(graph)
}
