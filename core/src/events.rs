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

use crate::bucket::Axis;
use crate::group::GroupId;
use crate::lifecycle::LifecycleState;
use crate::manager::ManagerId;
use crate::playback::{ContainerId, ContainerSlot, PlayableId, PlaybackConfig};
use crate::scope::{Scope, VolumeInfo, VolumeTarget};

/// External events the selection service consumes. Each maps to one master
/// operation; ordering within the channel is preserved.
#[derive(Debug, Clone)]
pub enum SelectionEvent {
    RegisterPlayback {
        manager: ManagerId,
        slot: ContainerSlot,
        playable: PlayableId,
        config: PlaybackConfig,
    },
    UnregisterPlayback {
        manager: ManagerId,
        container: ContainerId,
    },
    AddBucket {
        manager: ManagerId,
        root: ContainerId,
        axis: Axis,
    },
    RemoveBucket {
        manager: ManagerId,
        root: ContainerId,
    },
    ContainerAttached {
        manager: ManagerId,
        container: ContainerId,
    },
    ContainerDetached {
        manager: ManagerId,
        container: ContainerId,
    },
    ContainerLayoutChanged {
        manager: ManagerId,
        container: ContainerId,
    },
    LifecycleTransition {
        manager: ManagerId,
        state: LifecycleState,
    },
    SetLock {
        manager: ManagerId,
        lock: bool,
    },
    SetGroupLock {
        group: GroupId,
        lock: bool,
    },
    Stick {
        manager: ManagerId,
        root: ContainerId,
    },
    Unstick {
        manager: ManagerId,
        root: Option<ContainerId>,
    },
    Play {
        playable: PlayableId,
    },
    Pause {
        playable: PlayableId,
    },
    ApplyVolume {
        volume: VolumeInfo,
        target: VolumeTarget,
        scope: Scope,
    },
}
