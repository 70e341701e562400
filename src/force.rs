//! Force-recompute, immediate-wake, and the cross-iteration flags a main loop polls
//! to decide whether to schedule another iteration (§4.F).

use log::info;

use crate::engine::Engine;

impl Engine {
    /// Sets the sticky force-recompute flag: the next iteration treats every reachable
    /// node as if its handlers all returned `UNHANDLED`, forcing a full recompute.
    pub fn set_force_recompute(&mut self) {
        info!("set_force_recompute");
        self.force_recompute = true;
    }

    /// As [`Engine::set_force_recompute`], additionally requesting that the main loop
    /// not wait out its usual backoff before the next iteration.
    pub fn set_force_recompute_immediate(&mut self) {
        info!("set_force_recompute_immediate");
        self.force_recompute = true;
        self.immediate_wake = true;
    }

    /// Clears the sticky force-recompute flag without running an iteration.
    pub fn clear_force_recompute(&mut self) {
        self.force_recompute = false;
    }

    /// True if a force-recompute is pending for the next iteration.
    pub fn force_recompute_pending(&self) -> bool {
        self.force_recompute
    }

    /// True if the last call requested the main loop skip its backoff.
    pub fn immediate_wake_pending(&self) -> bool {
        self.immediate_wake
    }

    /// Clears the immediate-wake request; the main loop consumes it once per wake.
    pub fn clear_immediate_wake(&mut self) {
        self.immediate_wake = false;
    }

    /// Public synonym of [`Engine::set_force_recompute`] for callers with no finer hook
    /// into why a recompute is needed (e.g. a generic "something external changed").
    pub fn trigger_recompute(&mut self) {
        self.set_force_recompute();
    }

    /// True if the engine's last iteration ended with a recompute required but not
    /// permitted, canceling the walk from that point on.
    pub fn canceled(&self) -> bool {
        self.canceled
    }

    /// True if the last [`Engine::run`]/[`Engine::run_from`] call actually advanced any
    /// node (ran a `run`/handler on it).
    pub fn has_run(&self) -> bool {
        self.has_run
    }

    /// True if any reachable node ended the last iteration in state `UPDATED`.
    pub fn has_updated(&self) -> bool {
        self.has_updated
    }

    /// True if a force-recompute is pending, or the last iteration was canceled — in
    /// either case the main loop should schedule another iteration.
    pub fn need_run(&self) -> bool {
        self.force_recompute || self.canceled
    }
}
