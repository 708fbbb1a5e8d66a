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

use log::debug;
use uuid::Uuid;

use crate::lifecycle::LifecycleState;
use crate::scope::VolumeInfo;

/// Unique identifier for a playable unit.
pub type PlayableId = Uuid;

/// Unique identifier for a container slot (and for bucket roots, which are
/// containers themselves).
pub type ContainerId = Uuid;

/// Signed distance of a container from its bucket's reference axis.
///
/// Computed externally from viewport geometry; the core only orders by it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisOffset {
    pub x: i32,
    pub y: i32,
}

impl AxisOffset {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Descriptor of the container slot a playable is bound to.
///
/// `root` names the bucket the container lives under; container classification
/// happens outside the core, so it arrives here as plain data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerSlot {
    pub container: ContainerId,
    pub root: ContainerId,
    pub offset: AxisOffset,
}

impl ContainerSlot {
    pub fn new(container: ContainerId, root: ContainerId, offset: AxisOffset) -> Self {
        Self { container, root, offset }
    }
}

/// Per-binding configuration supplied at registration.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaybackConfig {
    /// Whether the binding is under explicit manual control (started or pinned
    /// by the caller) rather than automatic selection.
    pub manual: bool,
    /// Initial volume override; defaults to the owning bucket's volume.
    pub volume: Option<VolumeInfo>,
}

/// One binding of a playable unit to a container slot.
///
/// Attached/Detached and Active/Inactive toggle independently while the
/// binding is registered; removal is terminal. A playback may only be
/// activated while it is attached.
#[derive(Debug)]
pub struct Playback {
    playable: PlayableId,
    slot: ContainerSlot,
    config: PlaybackConfig,
    attached: bool,
    active: bool,
    lifecycle: LifecycleState,
    volume: VolumeInfo,
}

impl Playback {
    pub(crate) fn new(
        playable: PlayableId,
        slot: ContainerSlot,
        config: PlaybackConfig,
        inherited_volume: VolumeInfo,
        lifecycle: LifecycleState,
    ) -> Self {
        let volume = config.volume.unwrap_or(inherited_volume);
        Self {
            playable,
            slot,
            config,
            attached: false,
            active: false,
            lifecycle,
            volume,
        }
    }

    pub fn playable(&self) -> PlayableId {
        self.playable
    }

    pub fn container(&self) -> ContainerId {
        self.slot.container
    }

    pub fn slot(&self) -> &ContainerSlot {
        &self.slot
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    pub fn volume(&self) -> VolumeInfo {
        self.volume
    }

    pub(crate) fn on_attached(&mut self) {
        if !self.attached {
            self.attached = true;
            debug!("playback {} attached in container {}", self.playable, self.slot.container);
        }
    }

    pub(crate) fn on_detached(&mut self) {
        if self.attached {
            // An active playback must pass through inactive first.
            self.on_inactive();
            self.attached = false;
            debug!("playback {} detached from container {}", self.playable, self.slot.container);
        }
    }

    pub(crate) fn on_active(&mut self) {
        if self.attached && !self.active {
            self.active = true;
        }
    }

    pub(crate) fn on_inactive(&mut self) {
        if self.active {
            self.active = false;
        }
    }

    pub(crate) fn on_removed(&mut self) {
        self.on_detached();
        debug!("playback {} removed from container {}", self.playable, self.slot.container);
    }

    /// Stamped from the owning lifecycle on every transition, independent of
    /// attach state.
    pub(crate) fn set_lifecycle(&mut self, state: LifecycleState) {
        self.lifecycle = state;
    }

    pub(crate) fn set_volume(&mut self, volume: VolumeInfo) {
        if self.volume == volume {
            return;
        }
        self.volume = volume;
    }
}

/// Externally computed answer to "should this playback be prepared to play".
///
/// Visibility percentage, viewport intersection and similar geometry stay with
/// the caller; the core re-consults this source on every refresh.
pub trait EligibilitySource: Send + Sync {
    fn should_prepare(&self, playback: &Playback) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playback() -> Playback {
        let slot = ContainerSlot::new(Uuid::new_v4(), Uuid::new_v4(), AxisOffset::default());
        Playback::new(
            Uuid::new_v4(),
            slot,
            PlaybackConfig::default(),
            VolumeInfo::default(),
            LifecycleState::Created,
        )
    }

    #[test]
    fn starts_detached_and_inactive() {
        let pb = playback();
        assert!(!pb.is_attached());
        assert!(!pb.is_active());
    }

    #[test]
    fn activation_requires_attachment() {
        let mut pb = playback();
        pb.on_active();
        assert!(!pb.is_active());

        pb.on_attached();
        pb.on_active();
        assert!(pb.is_active());
    }

    #[test]
    fn detach_deactivates_first() {
        let mut pb = playback();
        pb.on_attached();
        pb.on_active();
        pb.on_detached();
        assert!(!pb.is_attached());
        assert!(!pb.is_active());
    }

    #[test]
    fn attach_and_active_toggle_independently() {
        let mut pb = playback();
        pb.on_attached();
        pb.on_active();
        pb.on_inactive();
        assert!(pb.is_attached());
        assert!(!pb.is_active());

        pb.on_active();
        pb.on_detached();
        pb.on_attached();
        assert!(pb.is_attached());
        assert!(!pb.is_active());
    }

    #[test]
    fn lifecycle_stamp_is_independent_of_attachment() {
        let mut pb = playback();
        pb.set_lifecycle(LifecycleState::Stopped);
        assert_eq!(pb.lifecycle(), LifecycleState::Stopped);
        assert!(!pb.is_attached());
    }

    #[test]
    fn config_volume_overrides_inherited() {
        let slot = ContainerSlot::new(Uuid::new_v4(), Uuid::new_v4(), AxisOffset::default());
        let config = PlaybackConfig { manual: false, volume: Some(VolumeInfo::new(true, 0.2)) };
        let pb = Playback::new(
            Uuid::new_v4(),
            slot,
            config,
            VolumeInfo::default(),
            LifecycleState::Created,
        );
        assert_eq!(pb.volume(), VolumeInfo::new(true, 0.2));
    }
}
