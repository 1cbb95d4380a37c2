//! Routine scheduler
//!
//! Splits a decoded command stream into lanes (one per routine segment) and
//! runs them concurrently on a local executor. Transactions on the same lane
//! run in declaration order; a forked lane starts once its parent lane has
//! completed every transaction declared before the fork point.
//!
//! Planning is a single synchronous pass so fork points capture the parent
//! lane's transaction count at declaration time. Redeclaring a routine ID
//! opens a fresh lane; the orphaned earlier segment still runs to
//! completion.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use smol::LocalExecutor;
use smol::channel::{Receiver, Sender, bounded};
use treewire_dom::{DomTree, NodeId};
use treewire_proto::{Command, RoutineId, Transaction};

use crate::interpreter;
use crate::once::OnceRegistry;

/// One routine segment, ready to run.
struct LanePlan {
    routine: RoutineId,
    /// Signalled by the parent lane when this fork may start.
    barrier: Option<Receiver<()>>,
    transactions: Vec<Transaction>,
    /// Forks hanging off this lane: (transactions completed before the
    /// fork counts as ready, signal).
    taps: Vec<(usize, Sender<()>)>,
}

pub(crate) async fn execute(
    tree: &Rc<RefCell<DomTree>>,
    registry: &Rc<RefCell<OnceRegistry>>,
    root: NodeId,
    commands: Vec<Command>,
) {
    let mut lanes: Vec<LanePlan> = Vec::new();
    let mut current: HashMap<RoutineId, usize> = HashMap::new();

    for command in commands {
        match command {
            Command::Start(start) => {
                let parent = lane_index(&mut lanes, &mut current, start.routine.unwrap_or(0));
                let position = lanes[parent].transactions.len();
                let (sender, receiver) = bounded(1);
                lanes[parent].taps.push((position, sender));
                lanes.push(LanePlan {
                    routine: start.start_routine,
                    barrier: Some(receiver),
                    transactions: Vec::new(),
                    taps: Vec::new(),
                });
                current.insert(start.start_routine, lanes.len() - 1);
            }
            Command::Transaction(transaction) => {
                let lane = lane_index(&mut lanes, &mut current, transaction.routine.unwrap_or(0));
                lanes[lane].transactions.push(transaction);
            }
            Command::Unknown(value) => {
                tracing::debug!(%value, "ignoring unrecognized command");
            }
        }
    }

    let executor = LocalExecutor::new();
    let tasks: Vec<_> = lanes
        .into_iter()
        .map(|lane| {
            let tree = tree.clone();
            let registry = registry.clone();
            executor.spawn(async move { run_lane(tree, registry, root, lane).await })
        })
        .collect();
    executor
        .run(async {
            for task in tasks {
                task.await;
            }
        })
        .await;
}

/// Lane currently accepting transactions for a routine ID, creating it on
/// first use.
fn lane_index(
    lanes: &mut Vec<LanePlan>,
    current: &mut HashMap<RoutineId, usize>,
    routine: RoutineId,
) -> usize {
    if let Some(index) = current.get(&routine) {
        return *index;
    }
    lanes.push(LanePlan {
        routine,
        barrier: None,
        transactions: Vec::new(),
        taps: Vec::new(),
    });
    let index = lanes.len() - 1;
    current.insert(routine, index);
    index
}

async fn run_lane(
    tree: Rc<RefCell<DomTree>>,
    registry: Rc<RefCell<OnceRegistry>>,
    root: NodeId,
    lane: LanePlan,
) {
    let LanePlan {
        routine,
        barrier,
        transactions,
        taps,
    } = lane;
    if let Some(barrier) = barrier {
        let _ = barrier.recv().await;
    }
    tracing::debug!(
        routine,
        transactions = transactions.len(),
        "routine lane started"
    );
    let mut done = 0;
    signal(&taps, done);
    for transaction in transactions {
        interpreter::run_transaction(&tree, &registry, root, transaction).await;
        done += 1;
        signal(&taps, done);
    }
}

fn signal(taps: &[(usize, Sender<()>)], position: usize) {
    for (at, sender) in taps {
        if *at == position {
            let _ = sender.try_send(());
        }
    }
}
