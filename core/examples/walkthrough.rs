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

//! Drives the master directly, without the async service: two buckets, three
//! candidates, sticky promotion, locking and a manual pause. Run with
//! `RUST_LOG=info` to see each play/pause decision.

use std::sync::Arc;

use log::info;
use uuid::Uuid;

use selection_core::{
    Axis, AxisOffset, ContainerSlot, EligibilitySource, LifecycleState, Master, Playback,
    PlaybackConfig, PlaybackDispatcher, PlayableId,
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

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut master = Master::new(Arc::new(LogDispatcher));
    let group = master.add_group();
    let manager = master.attach_manager(group, None, Arc::new(AlwaysEligible))?;
    master.on_lifecycle_transition(manager, LifecycleState::Started)?;

    let feed = Uuid::new_v4();
    let sidebar = Uuid::new_v4();
    master.add_bucket(manager, feed, Axis::Vertical)?;
    master.add_bucket(manager, sidebar, Axis::None)?;

    let mut candidate = |root, y| -> (ContainerSlot, PlayableId) {
        let slot = ContainerSlot::new(Uuid::new_v4(), root, AxisOffset::new(0, y));
        let playable = Uuid::new_v4();
        master
            .register_playback(manager, slot, playable, PlaybackConfig::default())
            .expect("fresh container slot");
        (slot, playable)
    };
    let (near_slot, near) = candidate(feed, 10);
    let (far_slot, _far) = candidate(feed, 300);
    let (side_slot, side) = candidate(sidebar, 0);
    info!("near={near} side={side}");

    // Attaching the candidates picks the feed's nearest one.
    for slot in [near_slot, far_slot, side_slot] {
        master.on_container_attached(manager, slot.container)?;
    }

    // The sidebar takes over while sticky, then the feed wins again.
    master.stick(manager, sidebar)?;
    master.unstick(manager, Some(sidebar))?;

    // Lock pauses everything; unlock restores the winner.
    master.set_lock(manager, true)?;
    master.set_lock(manager, false)?;

    // A manual pause outlasts unrelated refreshes until played again.
    master.pause(near)?;
    master.on_container_layout_changed(manager, near_slot.container)?;
    master.play(near)?;

    Ok(())
}
