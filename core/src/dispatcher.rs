use anyhow::Error;

use crate::playback::PlayableId;

/// The actual media primitive the master dispatches final decisions to.
///
/// The master only invokes these on state changes, so implementations do not
/// need their own idempotence guard.
pub trait PlaybackDispatcher: Send + Sync {
    fn play(&self, playable: PlayableId) -> Result<(), Error>;
    fn pause(&self, playable: PlayableId) -> Result<(), Error>;
}

/// Dispatcher that drops every call; a stand-in during wiring and tests.
pub struct NoopDispatcher;

impl PlaybackDispatcher for NoopDispatcher {
    fn play(&self, _playable: PlayableId) -> Result<(), Error> {
        Ok(())
    }

    fn pause(&self, _playable: PlayableId) -> Result<(), Error> {
        Ok(())
    }
}
