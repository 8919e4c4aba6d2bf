//! Worker pool: parallel shard evaluation over channels.
//!
//! Each worker is a long-lived thread owning a contiguous corpus shard, a
//! private oracle instance and a private passive cache. It processes commands
//! strictly in arrival order; only [`Command::Evaluate`] produces a reply.
//! The pool broadcasts a command to all workers and, for evaluations, blocks
//! until every worker has replied before aggregating (synchronous fan-out /
//! fan-in). There is no shared mutable state between the coordinator and the
//! workers: coefficient values travel only inside `SetCoefficient` commands.

use std::thread::JoinHandle;

use crossbeam_channel as chan;

use crate::backend::{apply_vector, EvalBackend, Evaluation};
use crate::corpus::{shard_ranges, TestRecord};
use crate::error::{TuneError, TuneResult};
use crate::oracle::Oracle;
use crate::residual::{evaluate_shard, PassiveCache};

/// Commands sent from the coordinator to a worker.
#[derive(Clone, Debug)]
pub enum Command {
    /// Apply a coefficient value to this worker's private oracle.
    SetCoefficient { index: usize, value: i64 },
    /// Evaluate the shard; replies with a [`ShardReport`].
    Evaluate { use_cache: bool },
    /// Promote the last evaluation's scores into the checkpoint baseline.
    Update,
    /// Rebuild the passive cache from the checkpoint baseline.
    Next,
    /// Terminate the worker. No further replies are expected.
    Stop,
}

/// Reply to [`Command::Evaluate`].
#[derive(Clone, Debug)]
pub struct ShardReport {
    pub sum_squared_errors: f64,
    pub len: usize,
    pub active: usize,
}

type Reply = Result<ShardReport, String>;

struct WorkerHandle {
    tx: chan::Sender<Command>,
    rx: chan::Receiver<Reply>,
    thread: JoinHandle<()>,
}

fn worker_main<O: Oracle>(
    mut oracle: O,
    records: Vec<TestRecord>,
    initial: Vec<i64>,
    depth: u32,
    rx: chan::Receiver<Command>,
    tx: chan::Sender<Reply>,
) {
    // A failed command poisons the worker; the fault is reported on the next
    // evaluation instead of being swallowed.
    let mut fault = apply_vector(&mut oracle, &initial)
        .err()
        .map(|e| e.to_string());
    let mut passive = PassiveCache::new();
    let mut last_scores: Vec<f64> = Vec::new();
    let mut best_scores: Option<Vec<f64>> = None;

    while let Ok(command) = rx.recv() {
        match command {
            Command::SetCoefficient { index, value } => {
                if fault.is_none() {
                    match oracle.set_coefficient(index, value) {
                        Ok(Some(_)) => {}
                        Ok(None) => {
                            fault = Some(format!("coefficient index {index} out of range"));
                        }
                        Err(e) => fault = Some(e.to_string()),
                    }
                }
            }
            Command::Evaluate { use_cache } => {
                let reply = match &fault {
                    Some(message) => Err(message.clone()),
                    None => match evaluate_shard(&mut oracle, &records, &mut passive, use_cache, depth)
                    {
                        Ok(eval) => {
                            let report = ShardReport {
                                sum_squared_errors: eval.sum_squared_errors,
                                len: records.len(),
                                active: eval.active,
                            };
                            last_scores = eval.scores;
                            Ok(report)
                        }
                        Err(e) => {
                            let message = e.to_string();
                            fault = Some(message.clone());
                            Err(message)
                        }
                    },
                };
                if tx.send(reply).is_err() {
                    break;
                }
            }
            Command::Update => best_scores = Some(last_scores.clone()),
            Command::Next => match &best_scores {
                Some(scores) => passive.rebuild(&records, scores),
                None => passive = PassiveCache::new(),
            },
            Command::Stop => break,
        }
    }
}

/// Fixed pool of worker threads spawned once per session.
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    corpus_len: usize,
}

impl WorkerPool {
    /// Spawn one worker per oracle. The corpus is partitioned once into
    /// contiguous shards; `initial` is applied to every worker's oracle
    /// before it accepts commands.
    pub fn spawn<O>(
        oracles: Vec<O>,
        records: &[TestRecord],
        initial: &[i64],
        depth: u32,
    ) -> TuneResult<Self>
    where
        O: Oracle + Send + 'static,
    {
        if oracles.is_empty() {
            return Err(TuneError::Config(
                "worker pool needs at least one oracle".to_string(),
            ));
        }
        if records.is_empty() {
            return Err(TuneError::Config("corpus is empty".to_string()));
        }

        let ranges = shard_ranges(records.len(), oracles.len());
        let mut workers = Vec::with_capacity(oracles.len());
        for (oracle, range) in oracles.into_iter().zip(ranges) {
            let shard = records[range].to_vec();
            let initial = initial.to_vec();
            let (cmd_tx, cmd_rx) = chan::unbounded::<Command>();
            let (reply_tx, reply_rx) = chan::unbounded::<Reply>();
            let thread = std::thread::spawn(move || {
                worker_main(oracle, shard, initial, depth, cmd_rx, reply_tx);
            });
            workers.push(WorkerHandle {
                tx: cmd_tx,
                rx: reply_rx,
                thread,
            });
        }

        Ok(Self {
            workers,
            corpus_len: records.len(),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    fn broadcast(&self, command: Command) -> TuneResult<()> {
        for (i, worker) in self.workers.iter().enumerate() {
            worker
                .tx
                .send(command.clone())
                .map_err(|_| TuneError::Worker(format!("worker {i} is gone")))?;
        }
        Ok(())
    }

    /// Send the stop command to every worker and join the threads.
    pub fn shutdown(self) -> TuneResult<()> {
        for worker in &self.workers {
            // A worker that already died is reported by join below.
            let _ = worker.tx.send(Command::Stop);
        }
        for (i, worker) in self.workers.into_iter().enumerate() {
            worker
                .thread
                .join()
                .map_err(|_| TuneError::Worker(format!("worker {i} panicked")))?;
        }
        Ok(())
    }
}

impl EvalBackend for WorkerPool {
    fn corpus_len(&self) -> usize {
        self.corpus_len
    }

    fn set_coefficient(&mut self, index: usize, value: i64) -> TuneResult<()> {
        self.broadcast(Command::SetCoefficient { index, value })
    }

    fn evaluate(&mut self, use_cache: bool) -> TuneResult<Evaluation> {
        self.broadcast(Command::Evaluate { use_cache })?;

        // Collect exactly one reply per worker before inspecting any of
        // them, so a failure cannot leave stale replies queued.
        let mut replies = Vec::with_capacity(self.workers.len());
        for (i, worker) in self.workers.iter().enumerate() {
            let reply = worker
                .rx
                .recv()
                .map_err(|_| TuneError::Worker(format!("worker {i} disconnected")))?;
            replies.push(reply);
        }

        let mut sum_squared_errors = 0.0;
        let mut total = 0;
        let mut active = 0;
        for reply in replies {
            let report = reply.map_err(TuneError::Oracle)?;
            sum_squared_errors += report.sum_squared_errors;
            total += report.len;
            active += report.active;
        }
        if total != self.corpus_len {
            return Err(TuneError::Worker(format!(
                "shard sizes sum to {total}, corpus has {} records",
                self.corpus_len
            )));
        }

        Ok(Evaluation {
            residual: (sum_squared_errors / total as f64).sqrt(),
            active,
        })
    }

    fn update(&mut self) -> TuneResult<()> {
        self.broadcast(Command::Update)
    }

    fn next(&mut self) -> TuneResult<()> {
        self.broadcast(Command::Next)
    }
}
