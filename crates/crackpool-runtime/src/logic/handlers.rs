//! Scheduler Command and Event Handlers
//!
//! Every entry point takes the scheduler state by mutable reference, runs to
//! completion and returns the effects for the transports and the app events
//! for the operator. Handlers never touch channels, which keeps them directly
//! testable with a manual clock.

use crackpool_core::{
    message::{Message, MessageType},
    AppEvent, ConnectionId, CrackpoolResult, Effect, HashTask, Round, RoundError, ServerEvent,
    TimeSource, Timestamp, TransportType,
};
use tracing::{debug, info, warn};

use super::state::SchedulerState;

/// Effects for transports and app events for the operator
pub type HandlerOutput = (Vec<Effect>, Vec<AppEvent>);

/// Sent to a submitter whose hash was accepted
pub const HASH_QUEUED_NOTICE: &str = "Hash added to queue";

pub fn success_report(task: &HashTask, solution: &str) -> String {
    format!(
        "We cracked your hash!\n{}:{}\n\n{}",
        task.algorithm, task.hash, solution
    )
}

pub fn courtesy_report(task: &HashTask, solution: &str) -> String {
    format!(
        "You cracked a hash for another worker!\n{}\n\n{}",
        task.hash, solution
    )
}

pub fn exhaustion_report(task: &HashTask) -> String {
    format!("We could not crack your hash: {}", task.hash)
}

/// What the next tick does with the active round
enum RoundStep {
    Start,
    Discard,
    ReportSolved,
    ReportExhausted,
    Distribute,
    Nothing,
}

/// Command and event handlers for the scheduler task
pub struct SchedulerHandlers;

impl SchedulerHandlers {
    // ------------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------------

    /// Handle a newly connected worker
    pub fn handle_worker_connected<T: TimeSource>(
        state: &mut SchedulerState<T>,
        connection_id: ConnectionId,
        transport: TransportType,
    ) -> CrackpoolResult<HandlerOutput> {
        let now = state.now();
        if !state.membership.join(connection_id, transport, now) {
            debug!(worker = %connection_id, "Worker already connected");
            return Ok((Vec::new(), Vec::new()));
        }
        state.liveness.register(connection_id, now);
        info!(worker = %connection_id, %transport, workers = state.membership.len(), "Worker joined");

        Ok((Vec::new(), vec![AppEvent::WorkerJoined { connection_id }]))
    }

    /// Handle a closed worker connection, then run a scheduling tick
    pub fn handle_worker_disconnected<T: TimeSource>(
        state: &mut SchedulerState<T>,
        connection_id: ConnectionId,
        reason: String,
    ) -> CrackpoolResult<HandlerOutput> {
        let mut app_events = Vec::new();
        if let Some(event) = Self::remove_worker(state, connection_id, reason) {
            app_events.push(event);
        }

        let (effects, tick_events) = Self::handle_tick(state)?;
        app_events.extend(tick_events);
        Ok((effects, app_events))
    }

    /// Handle a worker (or the operator) asking for a connection to be dropped
    pub fn handle_disconnect_requested<T: TimeSource>(
        state: &mut SchedulerState<T>,
        connection_id: ConnectionId,
        reason: &str,
    ) -> CrackpoolResult<HandlerOutput> {
        let (mut effects, app_events) =
            Self::handle_worker_disconnected(state, connection_id, reason.to_string())?;
        effects.insert(0, Effect::CloseConnection { connection_id });
        Ok((effects, app_events))
    }

    /// Handle a heartbeat acknowledgement
    pub fn handle_lifecheck_acknowledged<T: TimeSource>(
        state: &mut SchedulerState<T>,
        connection_id: ConnectionId,
    ) -> CrackpoolResult<HandlerOutput> {
        if !state.liveness.acknowledge(&connection_id) {
            debug!(worker = %connection_id, "Ignoring lifecheck with no probe outstanding");
        }
        Ok((Vec::new(), Vec::new()))
    }

    /// Forget a worker: membership, liveness, queued hashes and its job.
    ///
    /// The job goes back to the pool; it is not marked done.
    fn remove_worker<T: TimeSource>(
        state: &mut SchedulerState<T>,
        connection_id: ConnectionId,
        reason: String,
    ) -> Option<AppEvent> {
        state.liveness.remove(&connection_id);
        let dropped = state.queue.remove_by_submitter(&connection_id);
        if dropped > 0 {
            info!(worker = %connection_id, dropped, "Dropped queued hash of departed worker");
        }
        if let Some(round) = state.round.as_mut() {
            if let Some(job_id) = round.release_worker(&connection_id) {
                debug!(round = round.number(), worker = %connection_id, job = %job_id, "Released job of departed worker");
            }
        }

        state.membership.leave(&connection_id)?;
        info!(worker = %connection_id, reason = %reason, workers = state.membership.len(), "Worker left");
        Some(AppEvent::WorkerLeft {
            connection_id,
            reason,
        })
    }

    // ------------------------------------------------------------------------
    // Worker Messages
    // ------------------------------------------------------------------------

    /// Handle a raw `data` message from a worker
    pub fn handle_worker_message<T: TimeSource>(
        state: &mut SchedulerState<T>,
        connection_id: ConnectionId,
        data: &str,
    ) -> CrackpoolResult<HandlerOutput> {
        let message = match Message::decode(data, connection_id, state.now()) {
            Ok(message) => message,
            Err(e) => {
                state.stats.malformed_messages += 1;
                warn!(worker = %connection_id, "Rejected message: {}", e);
                return Ok((vec![Effect::send(connection_id, ServerEvent::error(e))], Vec::new()));
            }
        };

        match message.message_type {
            MessageType::SubmitHash => Self::handle_submit(state, message),
            MessageType::SolveHash => Self::handle_solve(state, message),
        }
    }

    /// Validate a submitted hash and queue it
    pub fn handle_submit<T: TimeSource>(
        state: &mut SchedulerState<T>,
        message: Message,
    ) -> CrackpoolResult<HandlerOutput> {
        let submitter_id = message.sender_id;
        let in_round = state.round.as_ref().map(Round::hash_task);

        let queued = state
            .queue
            .submit(
                &message.algorithm,
                &message.payload,
                submitter_id,
                message.received_at,
                in_round,
            )
            .map(|task| (task.algorithm, task.hash));

        match queued {
            Ok((algorithm, hash)) => {
                let position = state.queue.len() - 1;
                state.stats.hashes_queued += 1;
                info!(worker = %submitter_id, %algorithm, %hash, position, "Hash queued");
                Ok((
                    vec![Effect::send(
                        submitter_id,
                        ServerEvent::Log(HASH_QUEUED_NOTICE.to_string()),
                    )],
                    vec![AppEvent::HashQueued {
                        submitter_id,
                        algorithm,
                        hash,
                        position,
                    }],
                ))
            }
            Err(e) => {
                state.stats.intake_rejections += 1;
                warn!(worker = %submitter_id, "Rejected hash submission: {}", e);
                Ok((vec![Effect::send(submitter_id, ServerEvent::error(e))], Vec::new()))
            }
        }
    }

    /// Record a worker's job result.
    ///
    /// An empty payload means the worker searched its job without success.
    pub fn handle_solve<T: TimeSource>(
        state: &mut SchedulerState<T>,
        message: Message,
    ) -> CrackpoolResult<HandlerOutput> {
        let worker = message.sender_id;
        let now = message.received_at;

        let Some(round) = state.round.as_mut() else {
            warn!(worker = %worker, "Solve reported with no round running");
            return Ok((
                vec![Effect::send(worker, ServerEvent::error(RoundError::NoActiveRound))],
                Vec::new(),
            ));
        };

        if message.payload.is_empty() {
            match round.complete_job_of(&worker, now) {
                Some(job_id) => {
                    state.stats.jobs_completed += 1;
                    debug!(round = round.number(), worker = %worker, job = %job_id, "Job searched without a match");
                }
                None => debug!(round = round.number(), worker = %worker, "Ignoring empty result from worker without a job"),
            }
            return Ok((Vec::new(), Vec::new()));
        }

        if round.is_solved() {
            debug!(round = round.number(), worker = %worker, "Round already solved, ignoring solution");
            return Ok((Vec::new(), Vec::new()));
        }

        match round.record_solution(&message.payload, worker, now) {
            Ok(()) => {
                state.stats.jobs_completed += 1;
                info!(round = round.number(), worker = %worker, "Solution verified");
                Ok((Vec::new(), Vec::new()))
            }
            Err(e) => {
                warn!(round = round.number(), worker = %worker, "Rejected solution: {}", e);
                Ok((vec![Effect::send(worker, ServerEvent::error(e))], Vec::new()))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Scheduling Tick
    // ------------------------------------------------------------------------

    /// One scheduling pass: heartbeats first, then exactly one round step
    pub fn handle_tick<T: TimeSource>(
        state: &mut SchedulerState<T>,
    ) -> CrackpoolResult<HandlerOutput> {
        state.stats.ticks += 1;
        let now = state.now();
        let mut effects = Vec::new();
        let mut app_events = Vec::new();

        let sweep = state.liveness.poll(now);
        for connection_id in sweep.probe {
            effects.push(Effect::send(connection_id, ServerEvent::Lifecheck));
        }
        for connection_id in sweep.expired {
            warn!(worker = %connection_id, "Worker missed its lifecheck");
            state.stats.workers_expired += 1;
            effects.push(Effect::CloseConnection { connection_id });
            if let Some(event) =
                Self::remove_worker(state, connection_id, "missed lifecheck".to_string())
            {
                app_events.push(event);
            }
        }

        Self::step_round(state, now, &mut effects, &mut app_events);
        Ok((effects, app_events))
    }

    fn next_step<T: TimeSource>(state: &SchedulerState<T>) -> RoundStep {
        match &state.round {
            None if state.queue.is_empty() => RoundStep::Nothing,
            None => RoundStep::Start,
            Some(round) if !state.membership.contains(&round.hash_task().submitter_id) => {
                RoundStep::Discard
            }
            Some(round) if round.is_solved() => RoundStep::ReportSolved,
            Some(round) if round.all_done() => RoundStep::ReportExhausted,
            Some(_) => RoundStep::Distribute,
        }
    }

    fn step_round<T: TimeSource>(
        state: &mut SchedulerState<T>,
        now: Timestamp,
        effects: &mut Vec<Effect>,
        app_events: &mut Vec<AppEvent>,
    ) {
        match Self::next_step(state) {
            RoundStep::Nothing => {}
            RoundStep::Start => Self::start_round(state, now, app_events),
            RoundStep::Discard => {
                if let Some(round) = state.round.take() {
                    state.stats.rounds_discarded += 1;
                    info!(round = round.number(), hash = %round.hash_task().hash, "Submitter left, discarding round");
                    app_events.push(AppEvent::RoundDiscarded {
                        round: round.number(),
                        hash: round.hash_task().hash.clone(),
                    });
                }
            }
            RoundStep::ReportSolved => {
                if let Some(round) = state.round.take() {
                    Self::report_solved(state, round, effects, app_events);
                }
            }
            RoundStep::ReportExhausted => {
                if let Some(round) = state.round.take() {
                    let task = round.hash_task();
                    state.stats.rounds_exhausted += 1;
                    info!(round = round.number(), hash = %task.hash, "Round exhausted without a solution");
                    effects.push(Effect::send(
                        task.submitter_id,
                        ServerEvent::HashComplete(exhaustion_report(task)),
                    ));
                    app_events.push(AppEvent::RoundExhausted {
                        round: round.number(),
                        hash: task.hash.clone(),
                    });
                }
            }
            RoundStep::Distribute => Self::distribute_jobs(state, now, effects, app_events),
        }
    }

    fn start_round<T: TimeSource>(
        state: &mut SchedulerState<T>,
        now: Timestamp,
        app_events: &mut Vec<AppEvent>,
    ) {
        let Some(task) = state.queue.pop_front() else {
            return;
        };
        let number = state.rounds_started + 1;
        let round = Round::build(
            number,
            task,
            state.config.round_plan(),
            state.corpus.as_ref(),
            state.cache.as_ref(),
            now,
        );
        state.rounds_started = number;
        state.stats.rounds_started += 1;

        let task = round.hash_task();
        info!(round = number, algorithm = %task.algorithm, hash = %task.hash, jobs = round.jobs().len(), "Round started");
        app_events.push(AppEvent::RoundStarted {
            round: number,
            algorithm: task.algorithm,
            hash: task.hash.clone(),
            jobs: round.jobs().len(),
        });
        state.round = Some(round);
    }

    fn report_solved<T: TimeSource>(
        state: &mut SchedulerState<T>,
        round: Round,
        effects: &mut Vec<Effect>,
        app_events: &mut Vec<AppEvent>,
    ) {
        let (Some(solution), Some(solver)) = (round.solution(), round.solved_by()) else {
            return;
        };
        let task = round.hash_task();
        state.stats.rounds_solved += 1;
        info!(round = round.number(), hash = %task.hash, solver = %solver, "Round solved");

        effects.push(Effect::send(
            task.submitter_id,
            ServerEvent::HashComplete(success_report(task, solution)),
        ));
        if solver != task.submitter_id && state.membership.contains(&solver) {
            effects.push(Effect::send(
                solver,
                ServerEvent::HashComplete(courtesy_report(task, solution)),
            ));
        }
        app_events.push(AppEvent::RoundSolved {
            round: round.number(),
            hash: task.hash.clone(),
            solution: solution.to_string(),
            solved_by: solver,
        });
    }

    /// Reclaim expired jobs, then hand the first free job to each idle worker,
    /// steering reclaimed jobs away from the worker that let them lapse
    fn distribute_jobs<T: TimeSource>(
        state: &mut SchedulerState<T>,
        now: Timestamp,
        effects: &mut Vec<Effect>,
        app_events: &mut Vec<AppEvent>,
    ) {
        let timeout = state.config.job_timeout;
        let Some(round) = state.round.as_mut() else {
            return;
        };
        let number = round.number();

        let reclaimed = round.reclaim_timed_out(now);
        if !reclaimed.is_empty() {
            for (job_id, worker) in &reclaimed {
                warn!(round = number, worker = %worker, job = %job_id, "Job timed out");
            }
            state.stats.jobs_reclaimed += reclaimed.len() as u64;
            app_events.push(AppEvent::JobsReclaimed {
                round: number,
                count: reclaimed.len(),
            });
        }

        let idle: Vec<ConnectionId> = state
            .membership
            .ids()
            .filter(|worker| !round.has_job(worker))
            .collect();

        // A job taken back from a worker only returns to it when no other
        // idle worker picked it up.
        let mut still_idle = Vec::new();
        for worker in idle {
            match round.assign_next(worker, now, timeout) {
                Some(job) => {
                    debug!(round = number, worker = %worker, job = %job.id, kind = job.job_information.kind(), "Assigned job");
                    effects.push(Effect::send(worker, ServerEvent::Job(job.clone())));
                    state.stats.jobs_assigned += 1;
                }
                None => still_idle.push(worker),
            }
        }
        for worker in still_idle {
            let Some(job) = round.retry_next(worker, now, timeout) else {
                break;
            };
            debug!(round = number, worker = %worker, job = %job.id, kind = job.job_information.kind(), "Retrying job");
            effects.push(Effect::send(worker, ServerEvent::Job(job.clone())));
            state.stats.jobs_assigned += 1;
        }
    }

    // ------------------------------------------------------------------------
    // Operator Commands
    // ------------------------------------------------------------------------

    /// Drop every cached job
    pub fn handle_clear_cache<T: TimeSource>(
        state: &mut SchedulerState<T>,
    ) -> CrackpoolResult<HandlerOutput> {
        match state.cache.clear_all() {
            Ok(()) => {
                info!("Job cache cleared");
                Ok((Vec::new(), Vec::new()))
            }
            Err(e) => {
                warn!("Could not clear job cache: {}", e);
                Ok((
                    Vec::new(),
                    vec![AppEvent::SystemError {
                        error: format!("Could not clear job cache: {}", e),
                    }],
                ))
            }
        }
    }

    /// Report workers, queue depth and round progress
    pub fn handle_get_status<T: TimeSource>(
        state: &mut SchedulerState<T>,
    ) -> CrackpoolResult<HandlerOutput> {
        Ok((
            Vec::new(),
            vec![AppEvent::StatusReport {
                workers: state.membership.len(),
                queued: state.queue.len(),
                round: state.round_status(),
                uptime_seconds: state.uptime_seconds(),
            }],
        ))
    }

    /// Surface a transport failure to the operator
    pub fn handle_transport_error(
        transport: TransportType,
        error: String,
    ) -> CrackpoolResult<HandlerOutput> {
        warn!(%transport, "Transport error: {}", error);
        Ok((
            Vec::new(),
            vec![AppEvent::SystemError {
                error: format!("{} transport: {}", transport, error),
            }],
        ))
    }
}
