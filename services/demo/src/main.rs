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

//! Scripted walkthrough of the selection service: registers a few playback
//! candidates in two buckets, then exercises sticky promotion and locking
//! while a logging dispatcher prints every play/pause decision.

use anyhow::Result;
use futures::SinkExt;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use selection_core::{
    Axis, AxisOffset, ContainerId, ContainerSlot, EligibilitySource, LifecycleState, Master,
    Playback, PlaybackConfig, PlaybackDispatcher, PlayableId, SelectionEvent, SelectionService,
};

struct LogDispatcher;

impl PlaybackDispatcher for LogDispatcher {
    fn play(&self, playable: PlayableId) -> Result<(), anyhow::Error> {
        info!("PLAY  {playable}");
        Ok(())
    }

    fn pause(&self, playable: PlayableId) -> Result<(), anyhow::Error> {
        info!("PAUSE {playable}");
        Ok(())
    }
}

struct AlwaysEligible;

impl EligibilitySource for AlwaysEligible {
    fn should_prepare(&self, _playback: &Playback) -> bool {
        true
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();

    let mut master = Master::new(Arc::new(LogDispatcher));
    let group = master.add_group();
    let manager = master.attach_manager(group, None, Arc::new(AlwaysEligible))?;
    info!("group {group}, manager {manager}");

    let (service, mut tx) = SelectionService::new(master, 32);
    let handle = service.run();

    let feed = Uuid::new_v4();
    let sidebar = Uuid::new_v4();
    tx.send(SelectionEvent::LifecycleTransition { manager, state: LifecycleState::Started })
        .await?;
    tx.send(SelectionEvent::AddBucket { manager, root: feed, axis: Axis::Vertical }).await?;
    tx.send(SelectionEvent::AddBucket { manager, root: sidebar, axis: Axis::None }).await?;

    // Two candidates in the feed, one in the sidebar.
    let register = |root: ContainerId, y: i32| -> (ContainerSlot, PlayableId) {
        let slot = ContainerSlot::new(Uuid::new_v4(), root, AxisOffset::new(0, y));
        (slot, Uuid::new_v4())
    };
    let (near_slot, near) = register(feed, 10);
    let (far_slot, far) = register(feed, 300);
    let (side_slot, side) = register(sidebar, 0);
    info!("candidates: near={near} far={far} side={side}");

    for (slot, playable) in [(near_slot, near), (far_slot, far), (side_slot, side)] {
        tx.send(SelectionEvent::RegisterPlayback {
            manager,
            slot,
            playable,
            config: PlaybackConfig::default(),
        })
        .await?;
        tx.send(SelectionEvent::ContainerAttached { manager, container: slot.container })
            .await?;
    }

    // The sidebar takes over while sticky, then the feed wins again.
    tx.send(SelectionEvent::Stick { manager, root: sidebar }).await?;
    tx.send(SelectionEvent::Unstick { manager, root: Some(sidebar) }).await?;

    // Lock pauses everything; unlock restores the previous winner.
    tx.send(SelectionEvent::SetLock { manager, lock: true }).await?;
    tx.send(SelectionEvent::SetLock { manager, lock: false }).await?;

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    handle.shutdown().await?;
    Ok(())
}
