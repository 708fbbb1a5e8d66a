// Copyright 2025 HEM Sp. z o.o.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use futures::channel::mpsc;
use futures::StreamExt;
use log::{error, info, warn};
use tokio::select;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::SelectionError;
use crate::events::SelectionEvent;
use crate::master::Master;

/// Sender half handed to event producers (container observers, lifecycle
/// adapters, user controls).
pub type SelectionEventSender = mpsc::Sender<SelectionEvent>;

/// Handle to control the selection service task.
pub struct ServiceHandle {
    join: JoinHandle<()>,
    shutdown_tx: oneshot::Sender<()>,
}

impl ServiceHandle {
    pub async fn shutdown(self) -> Result<(), tokio::task::JoinError> {
        let _ = self.shutdown_tx.send(());
        self.join.await
    }

    pub fn abort(self) {
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Single-threaded owner of the master; serializes all external events into
/// selection passes. Event producers keep sender clones and never touch the
/// hierarchy directly.
pub struct SelectionService {
    master: Master,
    event_rx: mpsc::Receiver<SelectionEvent>,
}

impl SelectionService {
    /// Wraps a master and returns the service with a sender for producers.
    pub fn new(master: Master, buffer: usize) -> (Self, SelectionEventSender) {
        let (event_tx, event_rx) = mpsc::channel(buffer);
        (Self { master, event_rx }, event_tx)
    }

    /// Spawns the event loop in background and returns a handle.
    ///
    /// Addressing errors (stale manager or group ids) are logged and skipped;
    /// consistency violations stop the loop, because the hierarchy can no
    /// longer be trusted after one.
    pub fn run(mut self) -> ServiceHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            loop {
                select! {
                    biased;
                    _ = &mut shutdown_rx => {
                        info!("selection service shutdown requested");
                        break;
                    }
                    event = self.event_rx.next() => {
                        match event {
                            Some(event) => {
                                if let Err(e) = self.apply(event) {
                                    if e.is_consistency_violation() {
                                        error!("consistency violation, stopping selection service: {e}");
                                        break;
                                    }
                                    warn!("event dropped: {e}");
                                }
                            }
                            None => {
                                info!("event channel closed; stopping selection service");
                                break;
                            }
                        }
                    }
                }
            }
        });
        ServiceHandle { join, shutdown_tx }
    }

    fn apply(&mut self, event: SelectionEvent) -> Result<(), SelectionError> {
        match event {
            SelectionEvent::RegisterPlayback { manager, slot, playable, config } => {
                self.master.register_playback(manager, slot, playable, config)
            }
            SelectionEvent::UnregisterPlayback { manager, container } => {
                self.master.unregister_playback(manager, container)
            }
            SelectionEvent::AddBucket { manager, root, axis } => {
                self.master.add_bucket(manager, root, axis)
            }
            SelectionEvent::RemoveBucket { manager, root } => {
                self.master.remove_bucket(manager, root)
            }
            SelectionEvent::ContainerAttached { manager, container } => {
                self.master.on_container_attached(manager, container)
            }
            SelectionEvent::ContainerDetached { manager, container } => {
                self.master.on_container_detached(manager, container)
            }
            SelectionEvent::ContainerLayoutChanged { manager, container } => {
                self.master.on_container_layout_changed(manager, container)
            }
            SelectionEvent::LifecycleTransition { manager, state } => {
                self.master.on_lifecycle_transition(manager, state)
            }
            SelectionEvent::SetLock { manager, lock } => self.master.set_lock(manager, lock),
            SelectionEvent::SetGroupLock { group, lock } => {
                self.master.set_group_lock(group, lock)
            }
            SelectionEvent::Stick { manager, root } => self.master.stick(manager, root),
            SelectionEvent::Unstick { manager, root } => self.master.unstick(manager, root),
            SelectionEvent::Play { playable } => self.master.play(playable),
            SelectionEvent::Pause { playable } => self.master.pause(playable),
            SelectionEvent::ApplyVolume { volume, target, scope } => {
                self.master.apply_volume(volume, target, scope)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::Axis;
    use crate::dispatcher::PlaybackDispatcher;
    use crate::lifecycle::LifecycleState;
    use crate::manager::ManagerId;
    use crate::playback::{
        AxisOffset, ContainerSlot, EligibilitySource, PlayableId, Playback, PlaybackConfig,
    };
    use futures::SinkExt;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use uuid::Uuid;

    struct RecordingDispatcher {
        calls: Mutex<Vec<(&'static str, PlayableId)>>,
    }

    impl RecordingDispatcher {
        fn new() -> Arc<Self> {
            Arc::new(Self { calls: Mutex::new(Vec::new()) })
        }

        fn calls(&self) -> Vec<(&'static str, PlayableId)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PlaybackDispatcher for RecordingDispatcher {
        fn play(&self, playable: PlayableId) -> Result<(), anyhow::Error> {
            self.calls.lock().unwrap().push(("play", playable));
            Ok(())
        }

        fn pause(&self, playable: PlayableId) -> Result<(), anyhow::Error> {
            self.calls.lock().unwrap().push(("pause", playable));
            Ok(())
        }
    }

    struct AlwaysEligible;

    impl EligibilitySource for AlwaysEligible {
        fn should_prepare(&self, _playback: &Playback) -> bool {
            true
        }
    }

    async fn short_wait() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    fn service_with_manager(
        dispatcher: Arc<dyn PlaybackDispatcher>,
    ) -> (SelectionService, SelectionEventSender, ManagerId) {
        let mut master = Master::new(dispatcher);
        let group = master.add_group();
        let manager = master
            .attach_manager(group, None, Arc::new(AlwaysEligible))
            .unwrap();
        let (service, tx) = SelectionService::new(master, 16);
        (service, tx, manager)
    }

    #[tokio::test]
    async fn events_drive_selection_and_dispatch() {
        let dispatcher = RecordingDispatcher::new();
        let (service, mut tx, manager) = service_with_manager(dispatcher.clone());
        let handle = service.run();

        let root = Uuid::new_v4();
        let slot = ContainerSlot::new(Uuid::new_v4(), root, AxisOffset::default());
        let playable = Uuid::new_v4();

        tx.send(SelectionEvent::LifecycleTransition {
            manager,
            state: LifecycleState::Started,
        })
        .await
        .unwrap();
        tx.send(SelectionEvent::AddBucket { manager, root, axis: Axis::Vertical })
            .await
            .unwrap();
        tx.send(SelectionEvent::RegisterPlayback {
            manager,
            slot,
            playable,
            config: PlaybackConfig::default(),
        })
        .await
        .unwrap();
        tx.send(SelectionEvent::ContainerAttached { manager, container: slot.container })
            .await
            .unwrap();
        short_wait().await;

        assert_eq!(dispatcher.calls(), vec![("play", playable)]);

        tx.send(SelectionEvent::SetLock { manager, lock: true }).await.unwrap();
        short_wait().await;
        assert_eq!(
            dispatcher.calls(),
            vec![("play", playable), ("pause", playable)]
        );

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn addressing_error_is_skipped() {
        let dispatcher = RecordingDispatcher::new();
        let (service, mut tx, manager) = service_with_manager(dispatcher.clone());
        let handle = service.run();

        // Unknown manager id: logged and skipped, the loop keeps serving.
        tx.send(SelectionEvent::SetLock { manager: Uuid::new_v4(), lock: true })
            .await
            .unwrap();
        tx.send(SelectionEvent::LifecycleTransition {
            manager,
            state: LifecycleState::Started,
        })
        .await
        .unwrap();
        short_wait().await;

        assert!(!handle.is_finished());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn consistency_violation_stops_the_service() {
        let dispatcher = RecordingDispatcher::new();
        let (service, mut tx, manager) = service_with_manager(dispatcher);
        let handle = service.run();

        let slot = ContainerSlot::new(Uuid::new_v4(), Uuid::new_v4(), AxisOffset::default());
        tx.send(SelectionEvent::RegisterPlayback {
            manager,
            slot,
            playable: Uuid::new_v4(),
            config: PlaybackConfig::default(),
        })
        .await
        .unwrap();
        tx.send(SelectionEvent::RegisterPlayback {
            manager,
            slot,
            playable: Uuid::new_v4(),
            config: PlaybackConfig::default(),
        })
        .await
        .unwrap();
        short_wait().await;

        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn closing_the_sender_stops_the_service() {
        let dispatcher = RecordingDispatcher::new();
        let (service, tx, _manager) = service_with_manager(dispatcher);
        let handle = service.run();

        drop(tx);
        short_wait().await;
        assert!(handle.is_finished());
    }
}
