//! Explicit connection lifecycle state machine.
//!
//! Each transition is a pure function of `(state, event)`; the supervisor
//! interprets the returned effects against live resources. `Stopped` is
//! terminal and absorbs every event.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum LinkState {
    /// Waiting for the (zero-delay) initial connect timer.
    Idle,
    /// A connect attempt is in flight.
    Starting,
    /// The physical connection is established and registered.
    Connected,
    /// The peer shut down cleanly; teardown before scheduling a retry.
    Disconnecting,
    /// Waiting out the rate-limit window before the next attempt.
    ReconnectScheduled,
    /// Terminal; reachable only through an explicit stop.
    Stopped,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum LinkEvent {
    /// A connect attempt succeeded.
    Connected,
    /// A connect attempt, read or write failed.
    Failed,
    /// The peer closed the connection cleanly.
    ShutdownRequested,
    /// The pending (re)connect timer fired.
    TimerFired,
    /// An explicit stop was requested.
    StopRequested,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum LinkEffect {
    /// Bind the new connection's send capability into the source.
    Register,
    /// Remove the connection's send capability from the source and tear the
    /// transport down.
    Unregister,
    /// Compute the rate-limited reconnect wait and arm the timer.
    ScheduleRetry,
    /// Final cleanup; the driver exits.
    Halt,
}

pub(crate) fn transition(state: LinkState, event: LinkEvent) -> (LinkState, &'static [LinkEffect]) {
    use LinkEffect::*;
    use LinkEvent as Ev;
    use LinkState as St;

    match (state, event) {
        (St::Stopped, _) => (St::Stopped, &[]),
        (St::Connected, Ev::StopRequested) => (St::Stopped, &[Unregister, Halt]),
        (_, Ev::StopRequested) => (St::Stopped, &[Halt]),

        (St::Idle, Ev::TimerFired) => (St::Starting, &[]),
        (St::Starting, Ev::Connected) => (St::Connected, &[Register]),
        (St::Starting, Ev::Failed) => (St::ReconnectScheduled, &[ScheduleRetry]),
        (St::Connected, Ev::Failed) => (St::ReconnectScheduled, &[Unregister, ScheduleRetry]),
        (St::Connected, Ev::ShutdownRequested) => (St::Disconnecting, &[Unregister]),
        // Clean shutdown funnels into the same retry scheduling as a failure.
        (St::Disconnecting, Ev::Failed) => (St::ReconnectScheduled, &[ScheduleRetry]),
        (St::ReconnectScheduled, Ev::TimerFired) => (St::Starting, &[]),

        (state, _) => (state, &[]),
    }
}
