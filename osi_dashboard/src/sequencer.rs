use crate::sinks::StageSink;
use crate::timer::{TimerKind, TimerOwner, TimerQueue};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const ENCAPSULATION: &str = "encapsulation";

pub const DATA: TargetId = TargetId(0);
pub const TCP: TargetId = TargetId(1);
pub const IP: TargetId = TargetId(2);
pub const ETH: TargetId = TargetId(3);

const APPEAR_HOLD: Duration = Duration::from_millis(600);
const HEADER_GAP: Duration = Duration::from_millis(800);
const BASELINE_TOP: i32 = 20;

/// Index into the sequencer's target arena.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub usize);

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct VisualState {
    pub opacity: f32,
    pub top: i32,
    pub scale: f32,
    /// The target this one is drawn inside of.
    pub wrapped_by: Option<TargetId>,
}

impl VisualState {
    pub const fn hidden(top: i32) -> Self {
        Self {
            opacity: 0.0,
            top,
            scale: 1.0,
            wrapped_by: None,
        }
    }

    pub const fn shown(top: i32) -> Self {
        Self {
            opacity: 1.0,
            top,
            scale: 1.0,
            wrapped_by: None,
        }
    }

    pub const fn nested(top: i32, parent: TargetId) -> Self {
        Self {
            opacity: 1.0,
            top,
            scale: 1.0,
            wrapped_by: Some(parent),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct TargetUpdate {
    pub target: TargetId,
    pub visual: VisualState,
}

#[derive(Debug, Clone)]
pub struct StageTarget {
    pub id: TargetId,
    pub label: String,
    pub baseline: VisualState,
}

#[derive(Debug, Clone)]
pub struct AnimationStep {
    /// Pause after the previous step's hold before this step applies.
    pub delay_before: Duration,
    pub hold: Duration,
    pub updates: Vec<TargetUpdate>,
}

#[derive(Debug, Clone)]
pub struct Sequence {
    pub id: String,
    pub steps: Vec<AnimationStep>,
}

impl Sequence {
    pub fn duration(&self) -> Duration {
        self.steps.iter().map(|s| s.delay_before + s.hold).sum()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("unknown sequence: {0}")]
    UnknownSequence(String),
    #[error("sequence {0} has no steps")]
    Empty(String),
    #[error("sequence {sequence} references unknown target {target:?}")]
    UnknownTarget { sequence: String, target: TargetId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Running { sequence: usize, step: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug)]
pub struct AnimationSequencer {
    targets: Vec<StageTarget>,
    sequences: Vec<Sequence>,
    state: SequencerState,
    run_token: u64,
    completed_runs: u64,
}

impl AnimationSequencer {
    pub fn new(targets: Vec<StageTarget>) -> Self {
        Self {
            targets,
            sequences: Vec::new(),
            state: SequencerState::Idle,
            run_token: 0,
            completed_runs: 0,
        }
    }

    /// The four-box L7 -> L2 encapsulation stack with its single sequence.
    pub fn encapsulation() -> Self {
        let mut seq = Self::new(encapsulation_targets());
        // Static definition; only fails if the tables above disagree.
        if let Err(e) = seq.add_sequence(encapsulation_sequence()) {
            debug!("encapsulation sequence rejected: {e}");
        }
        seq
    }

    pub fn add_sequence(&mut self, sequence: Sequence) -> Result<(), SequenceError> {
        if sequence.steps.is_empty() {
            return Err(SequenceError::Empty(sequence.id));
        }
        let known = |id: TargetId| self.targets.iter().any(|t| t.id == id);
        for u in sequence.steps.iter().flat_map(|s| s.updates.iter()) {
            for id in std::iter::once(u.target).chain(u.visual.wrapped_by) {
                if !known(id) {
                    return Err(SequenceError::UnknownTarget {
                        sequence: sequence.id,
                        target: id,
                    });
                }
            }
        }
        self.sequences.retain(|s| s.id != sequence.id);
        self.sequences.push(sequence);
        Ok(())
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SequencerState::Running { .. })
    }

    pub fn completed_runs(&self) -> u64 {
        self.completed_runs
    }

    pub fn targets(&self) -> &[StageTarget] {
        &self.targets
    }

    pub fn play(
        &mut self,
        sequence_id: &str,
        timers: &mut TimerQueue,
        stage: &mut dyn StageSink,
    ) -> Result<PlayOutcome, SequenceError> {
        if self.is_running() {
            debug!(sequence_id, "sequence already running; play ignored");
            return Ok(PlayOutcome::AlreadyRunning);
        }
        let sequence = self
            .sequences
            .iter()
            .position(|s| s.id == sequence_id)
            .ok_or_else(|| SequenceError::UnknownSequence(sequence_id.to_string()))?;

        self.apply_baseline(stage);
        self.run_token += 1;
        debug!(sequence_id, run = self.run_token, "sequence started");

        let first_delay = self.sequences[sequence].steps[0].delay_before;
        self.state = SequencerState::Running { sequence, step: 0 };
        if first_delay.is_zero() {
            self.run_step(sequence, 0, timers, stage);
        } else {
            timers.schedule(
                TimerOwner::Sequencer,
                self.run_token,
                first_delay,
                TimerKind::SequenceStep { step: 0 },
            );
        }
        Ok(PlayOutcome::Started)
    }

    /// Handles a fired sequencer timer. Returns true when a run just completed.
    pub fn on_timer(
        &mut self,
        token: u64,
        kind: TimerKind,
        timers: &mut TimerQueue,
        stage: &mut dyn StageSink,
    ) -> bool {
        if token != self.run_token {
            debug!(token, current = self.run_token, "timer from cancelled run ignored");
            return false;
        }
        let SequencerState::Running { sequence, .. } = self.state else {
            return false;
        };
        match kind {
            TimerKind::SequenceStep { step } => {
                self.run_step(sequence, step, timers, stage);
                false
            }
            TimerKind::SequenceDone => {
                self.state = SequencerState::Idle;
                self.completed_runs += 1;
                debug!(run = self.run_token, "sequence complete");
                true
            }
            TimerKind::OverlayTick => false,
        }
    }

    /// Cancels the current run (if any) and returns every target to baseline.
    pub fn stop(&mut self, timers: &mut TimerQueue, stage: &mut dyn StageSink) {
        let dropped = timers.cancel(TimerOwner::Sequencer);
        self.run_token += 1;
        self.state = SequencerState::Idle;
        self.apply_baseline(stage);
        debug!(dropped, "sequencer reset");
    }

    fn run_step(
        &mut self,
        sequence: usize,
        step: usize,
        timers: &mut TimerQueue,
        stage: &mut dyn StageSink,
    ) {
        let steps = &self.sequences[sequence].steps;
        let Some(current) = steps.get(step) else {
            return;
        };
        apply_available(&current.updates, stage);

        let (delay, kind) = match steps.get(step + 1) {
            Some(next) => (
                current.hold + next.delay_before,
                TimerKind::SequenceStep { step: step + 1 },
            ),
            None => (current.hold, TimerKind::SequenceDone),
        };
        timers.schedule(TimerOwner::Sequencer, self.run_token, delay, kind);
        self.state = SequencerState::Running { sequence, step };
    }

    fn apply_baseline(&self, stage: &mut dyn StageSink) {
        let updates: Vec<TargetUpdate> = self
            .targets
            .iter()
            .map(|t| TargetUpdate {
                target: t.id,
                visual: t.baseline,
            })
            .collect();
        apply_available(&updates, stage);
    }
}

fn apply_available(updates: &[TargetUpdate], stage: &mut dyn StageSink) {
    let available: Vec<TargetUpdate> = updates
        .iter()
        .filter(|u| {
            let ok = stage.has_target(u.target);
            if !ok {
                debug!(stage_target = u.target.0, "stage target unavailable; skipping");
            }
            ok
        })
        .copied()
        .collect();
    if !available.is_empty() {
        stage.apply(&available);
    }
}

pub fn encapsulation_targets() -> Vec<StageTarget> {
    [
        (DATA, "DATA (L7)"),
        (TCP, "TCP Header (L4)"),
        (IP, "IP Header (L3)"),
        (ETH, "Ethernet (L2)"),
    ]
    .into_iter()
    .map(|(id, label)| StageTarget {
        id,
        label: label.to_string(),
        baseline: VisualState::hidden(BASELINE_TOP),
    })
    .collect()
}

/// Each header appears below the stack, then everything above it nests inside.
pub fn encapsulation_sequence() -> Sequence {
    let step = |delay_before: Duration, hold: Duration, updates: &[(TargetId, VisualState)]| {
        AnimationStep {
            delay_before,
            hold,
            updates: updates
                .iter()
                .map(|&(target, visual)| TargetUpdate { target, visual })
                .collect(),
        }
    };
    let zero = Duration::ZERO;

    Sequence {
        id: ENCAPSULATION.to_string(),
        steps: vec![
            step(zero, APPEAR_HOLD, &[(DATA, VisualState::shown(40))]),
            step(HEADER_GAP, APPEAR_HOLD, &[(TCP, VisualState::shown(100))]),
            step(zero, zero, &[(DATA, VisualState::nested(110, TCP))]),
            step(HEADER_GAP, APPEAR_HOLD, &[(IP, VisualState::shown(180))]),
            step(
                zero,
                zero,
                &[
                    (TCP, VisualState::nested(190, IP)),
                    (DATA, VisualState::nested(200, TCP)),
                ],
            ),
            step(HEADER_GAP, APPEAR_HOLD, &[(ETH, VisualState::shown(280))]),
            step(
                zero,
                zero,
                &[
                    (IP, VisualState::nested(290, ETH)),
                    (TCP, VisualState::nested(300, IP)),
                    (DATA, VisualState::nested(310, TCP)),
                ],
            ),
        ],
    }
}
