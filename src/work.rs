//! Build scheduler, choosing and executing edges as determined by out of
//! date outputs.
//!
//! Planning walks back from the wanted targets marking edges MustBuild and
//! seeding the ready queue with edges whose inputs are all fresh.  The run
//! loop dispatches ready edges to workers under the jobs budget, then blocks
//! on the completion channel; each completion updates node state and may
//! promote downstream edges into the queue.

use crate::db;
use crate::graph::{EdgeId, EdgeState, FileId, Graph};
use crate::progress::Progress;
use crate::state;
use crate::task::{FinishedTask, Runner, Termination};
use anyhow::{anyhow, bail};
use std::collections::{HashSet, VecDeque};

pub struct Options {
    /// The global concurrency budget, in units of edge `jobs` cost.
    pub max_jobs: usize,
}

pub struct Work<'a> {
    graph: &'a mut Graph,
    log: &'a mut db::Log,
    progress: &'a Progress,
    options: Options,

    /// Edges eligible to run, FIFO by the order they became ready.
    /// An edge stays queued while InProgress and leaves on completion.
    queue: VecDeque<EdgeId>,
    runner: Runner,
    /// Sum of `jobs` over InProgress edges.
    running_jobs: usize,
    tasks_run: usize,
}

impl<'a> Work<'a> {
    pub fn new(
        graph: &'a mut Graph,
        log: &'a mut db::Log,
        progress: &'a Progress,
        options: Options,
    ) -> Self {
        Work {
            graph,
            log,
            progress,
            options,
            queue: VecDeque::new(),
            runner: Runner::new(),
            running_jobs: 0,
            tasks_run: 0,
        }
    }

    /// Request that a file be brought up to date, planning its producing
    /// edge and transitive ancestors as needed.
    pub fn want_file(&mut self, id: FileId) -> anyhow::Result<()> {
        state::check_state_if_needed(self.graph, self.log, id)?;
        if self.graph.node(id).needs_rebuild() {
            if let Some(edge) = self.graph.node(id).in_edge {
                self.add_edge_to_plan(edge)?;
            }
        }
        Ok(())
    }

    fn add_edge_to_plan(&mut self, id: EdgeId) -> anyhow::Result<()> {
        if self.graph.edge(id).state != EdgeState::Unknown {
            return Ok(());
        }
        self.graph.edge_mut(id).state = EdgeState::MustBuild;
        let inputs = self.graph.edge(id).all_ins().to_vec();
        let mut ready = true;
        for input in inputs {
            state::check_state_if_needed(self.graph, self.log, input)?;
            let node = self.graph.node(input);
            if node.needs_rebuild() {
                ready = false;
                if let Some(producer) = node.in_edge {
                    self.add_edge_to_plan(producer)?;
                }
            }
        }
        if ready {
            self.graph.edge_mut(id).state = EdgeState::Ready;
            self.queue.push_back(id);
        }
        Ok(())
    }

    /// Run the planned edges to completion.  Returns the number of tasks
    /// executed (zero means everything was already up to date).
    pub fn run(&mut self) -> anyhow::Result<usize> {
        let mut failure: Option<anyhow::Error> = None;
        loop {
            if failure.is_none() {
                self.dispatch()?;
            }
            if !self.runner.is_running() {
                break;
            }
            let finished = self.runner.wait();
            self.handle_finished(finished, &mut failure)?;
            while let Some(finished) = self.runner.try_wait() {
                self.handle_finished(finished, &mut failure)?;
            }
        }
        if let Some(err) = failure {
            return Err(err);
        }
        let stuck = self
            .graph
            .edge_ids()
            .filter(|&id| {
                matches!(
                    self.graph.edge(id).state,
                    EdgeState::MustBuild | EdgeState::Ready
                )
            })
            .count();
        if stuck > 0 {
            bail!(
                "no progress possible: {} build steps never became ready (dependency cycle?)",
                stuck
            );
        }
        Ok(self.tasks_run)
    }

    /// Start every ready edge that fits the remaining budget.  The scan
    /// restarts from the queue head so short jobs freed by a completion can
    /// slot in immediately.
    fn dispatch(&mut self) -> anyhow::Result<()> {
        let candidates: Vec<EdgeId> = self.queue.iter().copied().collect();
        for id in candidates {
            if self.graph.edge(id).state != EdgeState::Ready {
                continue;
            }
            let jobs = self.graph.edge(id).jobs;
            // An oversize edge may run, but only by itself.
            if self.running_jobs > 0 && self.running_jobs + jobs > self.options.max_jobs {
                continue;
            }
            let cmd = self.graph.translated(id)?.clone();
            log::debug!("dispatch {:?} jobs={}: {}", id, jobs, cmd.cmdline);
            self.progress.task_started(&cmd.desc, &cmd.cmdline);
            self.graph.edge_mut(id).state = EdgeState::InProgress;
            self.running_jobs += jobs;
            self.tasks_run += 1;
            self.runner.start(id, cmd);
        }
        Ok(())
    }

    fn handle_finished(
        &mut self,
        finished: FinishedTask,
        failure: &mut Option<anyhow::Error>,
    ) -> anyhow::Result<()> {
        let id = finished.edge;
        self.running_jobs -= self.graph.edge(id).jobs;
        self.queue.retain(|&queued| queued != id);
        let cmd = self.graph.translated(id)?.clone();
        match finished.result.termination {
            Termination::Success => {
                self.graph.edge_mut(id).state = EdgeState::Completed;
                self.progress.task_finished(&finished.result.output);
                let deps = finished.result.discovered_deps.unwrap_or_default();
                for out in self.graph.edge(id).all_outs().to_vec() {
                    state::post_build(self.graph, self.log, out, &deps)?;
                }
                self.ready_dependents(id);
            }
            Termination::Failure(code) => {
                self.progress.task_failed(&cmd.desc, &finished.result.output);
                if failure.is_none() {
                    *failure = Some(anyhow!(
                        "build failed: {}\ncommand: {}\nexit code: {}\n{}",
                        cmd.desc,
                        cmd.cmdline,
                        code,
                        String::from_utf8_lossy(&finished.result.output).trim_end()
                    ));
                }
            }
        }
        Ok(())
    }

    /// Given an edge that just finished, promote dependent edges whose
    /// inputs are now all fresh.
    fn ready_dependents(&mut self, id: EdgeId) {
        let mut dependents = HashSet::new();
        for &out in self.graph.edge(id).all_outs() {
            for &dependent in &self.graph.node(out).out_edges {
                if self.graph.edge(dependent).state == EdgeState::MustBuild {
                    dependents.insert(dependent);
                }
            }
        }
        for dependent in dependents {
            let fresh = self
                .graph
                .edge(dependent)
                .all_ins()
                .iter()
                .all(|&input| !self.graph.node(input).needs_rebuild());
            if fresh {
                self.graph.edge_mut(dependent).state = EdgeState::Ready;
                self.queue.push_back(dependent);
            }
        }
    }
}
