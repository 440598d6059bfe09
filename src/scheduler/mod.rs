//! Scheduler - external triggers, batching, and the flush loop.
//!
//! Every entry into the engine is an external trigger: the initial mount, a
//! [`dispatch`] call wrapping an event handler, or a lone update request
//! arriving from an async completion. A trigger opens a batch; every update
//! queued synchronously inside it is collected before any render executes.
//! When the trigger returns, the batch resolves into committed cell values
//! and exactly one render pass runs per affected instance.
//!
//! Update resolution order matters and is deliberate:
//!
//! - an `Apply` update receives the queued value of its *own* cell, so
//!   successive `Apply`s to one cell chain;
//! - reads of any *other* cell during resolution see its pre-batch value,
//!   because nothing commits until the whole queue has resolved.
//!
//! Effects run after the pass commits and may queue more updates; the flush
//! loop keeps running passes until the queue is empty, bounded by
//! `EngineConfig::max_passes`.

use std::cell::RefCell;
use std::collections::HashMap;

use tracing::{debug, error, trace};

use crate::config;
use crate::context::Channel;
use crate::effects;
use crate::error::EngineError;
use crate::runtime::instance::DirtyReason;
use crate::runtime::registry;
use crate::runtime::render;
use crate::runtime::InstanceId;
use crate::state::{CellHandle, UpdateRequest};
use crate::types::Value;

// =============================================================================
// Phases
// =============================================================================

/// Where the engine currently is in its cooperative cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Between external triggers.
    Idle,
    /// Collecting update requests for the open batch.
    Batch,
    /// Re-invoking component functions. State updates here are fatal.
    Render,
    /// Running post-commit effects. Updates queue into the next pass.
    Effects,
}

enum Trigger {
    Update {
        cell: CellHandle,
        request: UpdateRequest,
    },
    Provide {
        target: InstanceId,
        channel: Channel,
        value: Value,
    },
}

struct Sched {
    phase: Phase,
    queue: Vec<Trigger>,
}

thread_local! {
    static SCHED: RefCell<Sched> = RefCell::new(Sched {
        phase: Phase::Idle,
        queue: Vec::new(),
    });
}

pub(crate) fn current_phase() -> Phase {
    SCHED.with(|sched| sched.borrow().phase)
}

fn set_phase(phase: Phase) {
    SCHED.with(|sched| sched.borrow_mut().phase = phase);
}

fn take_queue() -> Vec<Trigger> {
    SCHED.with(|sched| std::mem::take(&mut sched.borrow_mut().queue))
}

fn push_trigger(trigger: Trigger) {
    SCHED.with(|sched| sched.borrow_mut().queue.push(trigger));
}

/// Guard for operations that only make sense between triggers.
pub(crate) fn ensure_idle(what: &str) -> Result<(), EngineError> {
    match current_phase() {
        Phase::Idle => Ok(()),
        phase => Err(EngineError::Mount(format!(
            "{what} is only valid between external triggers (currently {phase:?})"
        ))),
    }
}

/// Reset scheduler state (for testing).
pub fn reset_scheduler() {
    SCHED.with(|sched| {
        let mut sched = sched.borrow_mut();
        sched.phase = Phase::Idle;
        sched.queue.clear();
    });
}

// =============================================================================
// External triggers
// =============================================================================

/// Run `f` as one external trigger: open (or join) a batch, collect every
/// update it queues, then flush. Nested dispatches join the outer batch, so
/// one event handler produces one pass per affected instance no matter how
/// it is composed.
pub fn dispatch<T>(f: impl FnOnce() -> T) -> Result<T, EngineError> {
    match current_phase() {
        Phase::Render => {
            error!("dispatch during an active render pass");
            Err(EngineError::ReentrantUpdate)
        }
        // Joined: the outer trigger (or the flush loop) takes care of flushing.
        Phase::Batch | Phase::Effects => Ok(f()),
        Phase::Idle => {
            set_phase(Phase::Batch);
            let value = f();
            let result = flush_queue();
            set_phase(Phase::Idle);
            result.map(|_| value)
        }
    }
}

/// Queue a cell update against the current batch.
pub(crate) fn enqueue_update(
    cell: CellHandle,
    request: UpdateRequest,
) -> Result<(), EngineError> {
    match current_phase() {
        Phase::Render => {
            error!(
                index = cell.instance().index(),
                "state update requested during render, aborting the update"
            );
            Err(EngineError::ReentrantUpdate)
        }
        Phase::Batch | Phase::Effects => {
            if !registry::is_live(cell.instance()) {
                return Err(cell.instance().stale_error());
            }
            push_trigger(Trigger::Update { cell, request });
            Ok(())
        }
        // A bare update (an async completion, typically) is its own trigger.
        Phase::Idle => {
            if !registry::is_live(cell.instance()) {
                return Err(cell.instance().stale_error());
            }
            set_phase(Phase::Batch);
            push_trigger(Trigger::Update { cell, request });
            let result = flush_queue();
            set_phase(Phase::Idle);
            result
        }
    }
}

/// Queue a context provide against the current batch.
pub(crate) fn enqueue_provide(
    target: InstanceId,
    channel: Channel,
    value: Value,
) -> Result<(), EngineError> {
    match current_phase() {
        Phase::Render => {
            error!("provide during an active render pass");
            Err(EngineError::ReentrantUpdate)
        }
        Phase::Batch | Phase::Effects => {
            if !registry::is_live(target) {
                return Err(target.stale_error());
            }
            push_trigger(Trigger::Provide { target, channel, value });
            Ok(())
        }
        Phase::Idle => {
            if !registry::is_live(target) {
                return Err(target.stale_error());
            }
            set_phase(Phase::Batch);
            push_trigger(Trigger::Provide { target, channel, value });
            let result = flush_queue();
            set_phase(Phase::Idle);
            result
        }
    }
}

// =============================================================================
// Flush loop
// =============================================================================

/// Run passes until the queue settles.
fn flush_queue() -> Result<(), EngineError> {
    let limit = config::get().max_passes;
    let mut passes = 0usize;

    loop {
        let triggers = take_queue();
        if triggers.is_empty() {
            break;
        }
        debug!(triggers = triggers.len(), "resolve batch");

        set_phase(Phase::Batch);
        let scheduled = resolve(triggers);
        if scheduled.is_empty() {
            // Every trigger was stale or an equal-value provide.
            continue;
        }

        passes += 1;
        if passes > limit {
            error!(limit, "render passes did not settle, aborting flush");
            take_queue();
            return Err(EngineError::UpdateLoop { limit });
        }

        set_phase(Phase::Render);
        let rendered = match render::run_pass(&scheduled) {
            Ok(rendered) => rendered,
            Err(err) => {
                take_queue();
                return Err(err);
            }
        };
        debug!(pass = passes, roots = rendered.len(), "pass committed");

        set_phase(Phase::Effects);
        let callbacks = effects::collect_due(&rendered);
        trace!(count = callbacks.len(), "run effects");
        for callback in callbacks {
            callback();
        }
    }

    Ok(())
}

/// Initial pass for a fresh mount, then the normal loop for anything the
/// mount effects queued.
pub(crate) fn flush_mount(root: InstanceId) -> Result<(), EngineError> {
    let result = (|| {
        set_phase(Phase::Render);
        let mut scheduled = HashMap::new();
        scheduled.insert(root, DirtyReason::MOUNT);
        let rendered = render::run_pass(&scheduled)?;

        set_phase(Phase::Effects);
        let callbacks = effects::collect_due(&rendered);
        for callback in callbacks {
            callback();
        }

        set_phase(Phase::Batch);
        flush_queue()
    })();
    set_phase(Phase::Idle);
    if result.is_err() {
        take_queue();
    }
    result
}

// =============================================================================
// Batch resolution
// =============================================================================

/// Fold the queued triggers into committed cell values and a schedule of
/// instances to re-render.
///
/// An update that resolves to a value equal to the cell's current one still
/// schedules its instance: the render function re-executes and the diff
/// comes out empty. An equal-value provide schedules nothing.
fn resolve(triggers: Vec<Trigger>) -> HashMap<InstanceId, DirtyReason> {
    let mut pending: HashMap<CellHandle, Value> = HashMap::new();
    let mut order: Vec<CellHandle> = Vec::new();
    let mut scheduled: HashMap<InstanceId, DirtyReason> = HashMap::new();

    for trigger in triggers {
        match trigger {
            Trigger::Update { cell, request } => {
                if !registry::is_live(cell.instance()) {
                    debug!(
                        index = cell.instance().index(),
                        "dropping update for destroyed instance"
                    );
                    continue;
                }
                // Base value: the queued result for this same cell if one
                // exists, otherwise the committed (pre-batch) value.
                let base = match pending.get(&cell) {
                    Some(value) => value.clone(),
                    None => match crate::state::read(&cell) {
                        Ok(value) => value,
                        Err(_) => {
                            debug!("dropping update for missing cell slot");
                            continue;
                        }
                    },
                };
                let next = match request {
                    UpdateRequest::Set(value) => value,
                    UpdateRequest::Apply(f) => f(&base),
                };
                if !pending.contains_key(&cell) {
                    order.push(cell);
                }
                pending.insert(cell, next);
                *scheduled
                    .entry(cell.instance())
                    .or_insert(DirtyReason::empty()) |= DirtyReason::CELLS;
            }
            Trigger::Provide { target, channel, value } => {
                if !registry::is_live(target) {
                    debug!(
                        index = target.index(),
                        "dropping provide for destroyed instance"
                    );
                    continue;
                }
                let changed = registry::with_mut(target, |instance| {
                    if instance.provided.get(&channel.id) == Some(&value) {
                        false
                    } else {
                        instance.provided.insert(channel.id, value.clone());
                        true
                    }
                })
                .unwrap_or(false);
                if changed {
                    *scheduled.entry(target).or_insert(DirtyReason::empty()) |=
                        DirtyReason::CONTEXT;
                } else {
                    trace!(index = target.index(), "provide with equal value, skipped");
                }
            }
        }
    }

    // Commit resolved values in first-touch order.
    for cell in order {
        let Some(value) = pending.remove(&cell) else {
            continue;
        };
        let _ = registry::with_mut(cell.instance(), |instance| {
            if let Some(state_cell) = instance.cells.get_mut(cell.slot()) {
                let changed = !state_cell.equals(&value);
                trace!(
                    index = cell.instance().index(),
                    slot = cell.slot(),
                    changed,
                    "commit cell"
                );
                state_cell.value = value;
            }
        });
    }

    scheduled
}
