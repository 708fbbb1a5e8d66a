/// Lifecycle of the external owner a [`PlaybackManager`] is bound to.
///
/// External lifecycle notifications are delivered as plain transitions to this
/// enum; there is no observer registration. `Destroyed` is terminal and
/// cascades a full manager teardown.
///
/// [`PlaybackManager`]: crate::manager::PlaybackManager
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    Initialized,
    Created,
    Started,
    Stopped,
    Destroyed,
}

impl LifecycleState {
    /// Playbacks may only be activated while the owner is started.
    pub fn allows_activation(self) -> bool {
        self == LifecycleState::Started
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleState::Initialized => "initialized",
            LifecycleState::Created => "created",
            LifecycleState::Started => "started",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}
