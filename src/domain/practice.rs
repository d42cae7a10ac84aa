//! Timed practice of a flow: a 3-2-1 countdown, then each pose for its
//! duration, driven by one-second ticks from the event loop.

use tracing::{debug, info};

use super::errors::{FlowError, FlowResult};
use super::models::{Flow, Pose};

/// Seconds of the starting countdown.
pub const DEFAULT_COUNTDOWN: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PracticeState {
    Idle,
    /// Seconds left before the first pose.
    Countdown(u32),
    PoseActive(usize),
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Countdown,
    Pose,
}

/// The single outstanding timer of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub kind: TimerKind,
    pub remaining: u32,
}

/// What a tick or a manual step changed, for the caller to announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PracticeEvent {
    Nothing,
    Countdown(u32),
    PoseStarted(usize),
    Tick(u32),
    Completed,
}

#[derive(Debug)]
pub struct PracticeSession {
    state: PracticeState,
    poses: Vec<Pose>,
    timer: Option<Timer>,
    paused: bool,
    countdown: u32,
}

impl Default for PracticeSession {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTDOWN)
    }
}

impl PracticeSession {
    pub fn new(countdown: u32) -> Self {
        Self {
            state: PracticeState::Idle,
            poses: Vec::new(),
            timer: None,
            paused: false,
            countdown,
        }
    }

    pub fn state(&self) -> PracticeState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn timer(&self) -> Option<Timer> {
        self.timer
    }

    /// Whether a countdown or pose is in progress.
    pub fn is_running(&self) -> bool {
        matches!(
            self.state,
            PracticeState::Countdown(_) | PracticeState::PoseActive(_)
        )
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    pub fn current_pose(&self) -> Option<&Pose> {
        match self.state {
            PracticeState::PoseActive(index) => self.poses.get(index),
            _ => None,
        }
    }

    pub fn upcoming_pose(&self) -> Option<&Pose> {
        match self.state {
            PracticeState::Countdown(_) => self.poses.first(),
            PracticeState::PoseActive(index) => self.poses.get(index + 1),
            _ => None,
        }
    }

    pub fn remaining(&self) -> Option<u32> {
        self.timer.map(|t| t.remaining)
    }

    /// Seconds left in the whole flow, including the current pose.
    pub fn remaining_total(&self) -> u32 {
        match self.state {
            PracticeState::Countdown(_) => self.poses.iter().map(|p| p.duration.max(1)).sum(),
            PracticeState::PoseActive(index) => {
                let rest: u32 = self.poses[index + 1..].iter().map(|p| p.duration.max(1)).sum();
                self.remaining().unwrap_or(0) + rest
            }
            _ => 0,
        }
    }

    /// Snapshots the flow's poses and starts the countdown. Any session in
    /// progress is torn down first.
    pub fn start(&mut self, flow: &Flow) -> FlowResult<PracticeEvent> {
        if flow.is_empty() {
            return Err(FlowError::EmptyFlow);
        }
        self.cancel();
        self.poses = flow.poses().to_vec();
        info!(flow = %flow.name, poses = self.poses.len(), "practice started");

        if self.countdown == 0 {
            return Ok(self.begin_pose(0));
        }
        self.state = PracticeState::Countdown(self.countdown);
        self.replace_timer(TimerKind::Countdown, self.countdown);
        Ok(PracticeEvent::Countdown(self.countdown))
    }

    fn replace_timer(&mut self, kind: TimerKind, seconds: u32) {
        if let Some(old) = self.timer.take() {
            debug!(?old, "timer replaced");
        }
        self.timer = Some(Timer {
            kind,
            remaining: seconds,
        });
    }

    fn begin_pose(&mut self, index: usize) -> PracticeEvent {
        if index >= self.poses.len() {
            return self.complete();
        }
        self.state = PracticeState::PoseActive(index);
        let seconds = self.poses[index].duration.max(1);
        self.replace_timer(TimerKind::Pose, seconds);
        PracticeEvent::PoseStarted(index)
    }

    fn complete(&mut self) -> PracticeEvent {
        self.timer = None;
        self.paused = false;
        self.state = PracticeState::Complete;
        info!("practice complete");
        PracticeEvent::Completed
    }

    /// Advances the outstanding timer by one second.
    pub fn tick(&mut self) -> PracticeEvent {
        if self.paused {
            return PracticeEvent::Nothing;
        }
        let Some(timer) = self.timer.as_mut() else {
            return PracticeEvent::Nothing;
        };
        timer.remaining = timer.remaining.saturating_sub(1);
        let remaining = timer.remaining;

        match self.state {
            PracticeState::Countdown(_) if remaining == 0 => self.begin_pose(0),
            PracticeState::Countdown(_) => {
                self.state = PracticeState::Countdown(remaining);
                PracticeEvent::Countdown(remaining)
            }
            PracticeState::PoseActive(index) if remaining == 0 => self.begin_pose(index + 1),
            PracticeState::PoseActive(_) => PracticeEvent::Tick(remaining),
            PracticeState::Idle | PracticeState::Complete => PracticeEvent::Nothing,
        }
    }

    /// Pauses or resumes; returns the new paused flag.
    pub fn toggle_pause(&mut self) -> bool {
        if self.is_running() {
            self.paused = !self.paused;
        }
        self.paused
    }

    /// Skips to the next pose, completing after the last one.
    pub fn next(&mut self) -> PracticeEvent {
        match self.state {
            PracticeState::Countdown(_) => self.begin_pose(0),
            PracticeState::PoseActive(index) => self.begin_pose(index + 1),
            _ => PracticeEvent::Nothing,
        }
    }

    /// Goes back one pose, or restarts the first pose.
    pub fn previous(&mut self) -> PracticeEvent {
        match self.state {
            PracticeState::PoseActive(index) => self.begin_pose(index.saturating_sub(1)),
            _ => PracticeEvent::Nothing,
        }
    }

    /// Ends the flow early.
    pub fn end(&mut self) -> PracticeEvent {
        if self.is_running() {
            self.complete()
        } else {
            PracticeEvent::Nothing
        }
    }

    /// Tears the session down. Safe to call in any state, any number of times.
    pub fn cancel(&mut self) {
        self.timer = None;
        self.paused = false;
        self.poses.clear();
        self.state = PracticeState::Idle;
    }
}
