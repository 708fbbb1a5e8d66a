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

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, warn};

use crate::bucket::{Axis, BucketPolicy, PendingState, SelectionCtx};
use crate::dispatcher::PlaybackDispatcher;
use crate::error::{Result, SelectionError};
use crate::group::{GroupId, ManagerGroup};
use crate::lifecycle::LifecycleState;
use crate::manager::{ManagerId, PlaybackManager, Prioritized, Selection};
use crate::playback::{
    ContainerId, ContainerSlot, EligibilitySource, PlayableId, PlaybackConfig,
};
use crate::scope::{Scope, VolumeInfo, VolumeTarget};

/// Global owner of all groups; the top of the property hierarchy and the
/// final dispatch point for play/pause.
///
/// Every external event enters here, is routed down to the addressed manager
/// and triggers a refresh of the owning group. Refresh is synchronous and
/// non-reentrant: a refresh requested while one is running is queued and run
/// after the current pass instead of interleaving.
pub struct Master {
    groups: Vec<ManagerGroup>,
    dispatcher: Arc<dyn PlaybackDispatcher>,
    volume: VolumeInfo,
    pending: HashMap<PlayableId, PendingState>,
    started_by_caller: HashSet<PlayableId>,
    playing: HashSet<PlayableId>,
    refreshing: bool,
    refresh_queue: Vec<GroupId>,
}

impl Master {
    pub fn new(dispatcher: Arc<dyn PlaybackDispatcher>) -> Self {
        Self {
            groups: Vec::new(),
            dispatcher,
            volume: VolumeInfo::default(),
            pending: HashMap::new(),
            started_by_caller: HashSet::new(),
            playing: HashSet::new(),
            refreshing: false,
            refresh_queue: Vec::new(),
        }
    }

    pub fn volume(&self) -> VolumeInfo {
        self.volume
    }

    pub fn is_playing(&self, playable: PlayableId) -> bool {
        self.playing.contains(&playable)
    }

    // ---- structure --------------------------------------------------------

    pub fn add_group(&mut self) -> GroupId {
        let group = ManagerGroup::new(self.volume);
        let id = group.id();
        self.groups.push(group);
        debug!("group {id} added");
        id
    }

    /// Removes a whole group, pausing anything it still had playing.
    pub fn remove_group(&mut self, group: GroupId) -> Result<()> {
        let index = self
            .groups
            .iter()
            .position(|g| g.id() == group)
            .ok_or(SelectionError::UnknownGroup(group))?;
        let removed = self.groups.remove(index);
        let released: Vec<PlayableId> = removed
            .managers()
            .flat_map(|m| m.playbacks().map(|p| p.playable()))
            .collect();
        self.release(released);
        debug!("group {group} removed");
        Ok(())
    }

    /// Creates a manager bound to an external lifecycle owner and attaches it
    /// to a group. The manager starts in `Created`; the owner's transitions
    /// arrive through [`on_lifecycle_transition`](Self::on_lifecycle_transition).
    pub fn attach_manager(
        &mut self,
        group: GroupId,
        host: Option<Arc<dyn Prioritized>>,
        eligibility: Arc<dyn EligibilitySource>,
    ) -> Result<ManagerId> {
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.id() == group)
            .ok_or(SelectionError::UnknownGroup(group))?;
        Ok(group.add_manager(PlaybackManager::new(host, eligibility)))
    }

    pub fn manager(&self, manager: ManagerId) -> Option<&PlaybackManager> {
        self.groups.iter().find_map(|g| g.manager(manager))
    }

    fn manager_entry(&mut self, manager: ManagerId) -> Result<(GroupId, &mut PlaybackManager)> {
        for group in &mut self.groups {
            let group_id = group.id();
            if let Some(found) = group.manager_mut(manager) {
                return Ok((group_id, found));
            }
        }
        Err(SelectionError::UnknownManager(manager))
    }

    // ---- registration and buckets -----------------------------------------

    pub fn register_playback(
        &mut self,
        manager: ManagerId,
        slot: ContainerSlot,
        playable: PlayableId,
        config: PlaybackConfig,
    ) -> Result<()> {
        let (group, entry) = self.manager_entry(manager)?;
        entry.register_playback(slot, playable, config)?;
        self.refresh(group)
    }

    pub fn unregister_playback(&mut self, manager: ManagerId, container: ContainerId) -> Result<()> {
        let (group, entry) = self.manager_entry(manager)?;
        let released = entry.unregister_playback(container)?;
        self.release(released.into_iter().collect());
        self.refresh(group)
    }

    pub fn add_bucket(&mut self, manager: ManagerId, root: ContainerId, axis: Axis) -> Result<()> {
        let (group, entry) = self.manager_entry(manager)?;
        entry.add_bucket(root, axis);
        self.refresh(group)
    }

    pub fn add_bucket_with_policy(
        &mut self,
        manager: ManagerId,
        root: ContainerId,
        axis: Axis,
        policy: Arc<dyn BucketPolicy>,
    ) -> Result<()> {
        let (group, entry) = self.manager_entry(manager)?;
        entry.add_bucket_with_policy(root, axis, policy);
        self.refresh(group)
    }

    pub fn remove_bucket(&mut self, manager: ManagerId, root: ContainerId) -> Result<()> {
        let (group, entry) = self.manager_entry(manager)?;
        let released = entry.remove_bucket(root);
        self.release(released);
        self.refresh(group)
    }

    // ---- event intake -----------------------------------------------------

    pub fn on_container_attached(&mut self, manager: ManagerId, container: ContainerId) -> Result<()> {
        let (group, entry) = self.manager_entry(manager)?;
        if entry.on_container_attached(container) {
            self.refresh(group)?;
        }
        Ok(())
    }

    pub fn on_container_detached(&mut self, manager: ManagerId, container: ContainerId) -> Result<()> {
        let (group, entry) = self.manager_entry(manager)?;
        if entry.on_container_detached(container) {
            self.refresh(group)?;
        }
        Ok(())
    }

    pub fn on_container_layout_changed(
        &mut self,
        manager: ManagerId,
        container: ContainerId,
    ) -> Result<()> {
        let (group, entry) = self.manager_entry(manager)?;
        if entry.on_container_layout_changed(container) {
            self.refresh(group)?;
        }
        Ok(())
    }

    pub fn on_lifecycle_transition(
        &mut self,
        manager: ManagerId,
        state: LifecycleState,
    ) -> Result<()> {
        let (group, entry) = self.manager_entry(manager)?;
        let released = entry.on_lifecycle_transition(state);
        let destroyed = state == LifecycleState::Destroyed;
        self.release(released);
        if destroyed {
            if let Some(owner) = self.groups.iter_mut().find(|g| g.id() == group) {
                owner.remove_manager(manager);
            }
        }
        self.refresh(group)
    }

    pub fn set_lock(&mut self, manager: ManagerId, lock: bool) -> Result<()> {
        let (group, entry) = self.manager_entry(manager)?;
        entry.set_lock(lock);
        self.refresh(group)
    }

    pub fn set_group_lock(&mut self, group: GroupId, lock: bool) -> Result<()> {
        let found = self
            .groups
            .iter_mut()
            .find(|g| g.id() == group)
            .ok_or(SelectionError::UnknownGroup(group))?;
        found.set_lock(lock);
        self.refresh(group)
    }

    pub fn stick(&mut self, manager: ManagerId, root: ContainerId) -> Result<()> {
        let (group, entry) = self.manager_entry(manager)?;
        entry.stick(root);
        self.refresh(group)
    }

    pub fn unstick(&mut self, manager: ManagerId, root: Option<ContainerId>) -> Result<()> {
        let (group, entry) = self.manager_entry(manager)?;
        entry.unstick(root);
        self.refresh(group)
    }

    // ---- manual intent ----------------------------------------------------

    /// Records the caller's explicit intent to start a playable and refreshes.
    /// The pending mark is consumed when the decision is dispatched; the
    /// started-by-caller standing persists until [`pause`](Self::pause) or
    /// release. Intent for a playable no manager knows is discarded.
    pub fn play(&mut self, playable: PlayableId) -> Result<()> {
        if !self.playable_registered(playable) {
            warn!("play intent for unregistered playable {playable}; ignoring");
            return Ok(());
        }
        self.pending.insert(playable, PendingState::Play);
        self.started_by_caller.insert(playable);
        self.refresh_all()
    }

    /// Records the caller's explicit intent to pause a playable; this also
    /// withdraws its started-by-caller standing. The pause mark persists
    /// across refreshes until the caller requests play again or the playback
    /// is released, so an ordinary layout refresh cannot resume it.
    pub fn pause(&mut self, playable: PlayableId) -> Result<()> {
        if !self.playable_registered(playable) {
            warn!("pause intent for unregistered playable {playable}; ignoring");
            return Ok(());
        }
        self.pending.insert(playable, PendingState::Pause);
        self.started_by_caller.remove(&playable);
        self.refresh_all()
    }

    fn playable_registered(&self, playable: PlayableId) -> bool {
        self.groups
            .iter()
            .flat_map(|g| g.managers())
            .any(|m| m.playbacks().any(|p| p.playable() == playable))
    }

    // ---- volume -----------------------------------------------------------

    /// Applies a volume to the object addressed by `target` at the declared
    /// `scope`. A target that does not match the scope, or does not resolve to
    /// a live object, is rejected before anything propagates.
    pub fn apply_volume(
        &mut self,
        volume: VolumeInfo,
        target: VolumeTarget,
        scope: Scope,
    ) -> Result<()> {
        match scope {
            Scope::Playback => {
                let VolumeTarget::Playback(container) = target else {
                    return Err(SelectionError::InvalidTarget { scope });
                };
                let found = self
                    .groups
                    .iter_mut()
                    .flat_map(|g| g.managers_mut())
                    .any(|m| m.set_playback_volume(container, volume));
                if !found {
                    return Err(SelectionError::InvalidTarget { scope });
                }
                Ok(())
            }
            Scope::Bucket => {
                let root = match target {
                    VolumeTarget::Bucket(root) => Some(root),
                    // A playback target resolves to its owning bucket.
                    VolumeTarget::Playback(container) => self
                        .groups
                        .iter()
                        .flat_map(|g| g.managers())
                        .find_map(|m| m.bucket_root_for(container)),
                    _ => return Err(SelectionError::InvalidTarget { scope }),
                };
                let Some(root) = root else {
                    return Err(SelectionError::InvalidTarget { scope });
                };
                let found = self
                    .groups
                    .iter_mut()
                    .flat_map(|g| g.managers_mut())
                    .any(|m| m.set_bucket_volume(root, volume));
                if !found {
                    return Err(SelectionError::InvalidTarget { scope });
                }
                Ok(())
            }
            Scope::Manager => {
                let VolumeTarget::Manager(manager) = target else {
                    return Err(SelectionError::InvalidTarget { scope });
                };
                match self.manager_entry(manager) {
                    Ok((_, entry)) => {
                        entry.set_volume(volume);
                        Ok(())
                    }
                    Err(_) => Err(SelectionError::InvalidTarget { scope }),
                }
            }
            Scope::Group => {
                let VolumeTarget::Group(group) = target else {
                    return Err(SelectionError::InvalidTarget { scope });
                };
                let found = self
                    .groups
                    .iter_mut()
                    .find(|g| g.id() == group)
                    .ok_or(SelectionError::InvalidTarget { scope })?;
                found.set_volume(volume);
                Ok(())
            }
            Scope::Global => {
                if target != VolumeTarget::Global {
                    return Err(SelectionError::InvalidTarget { scope });
                }
                if self.volume == volume {
                    return Ok(());
                }
                self.volume = volume;
                for group in &mut self.groups {
                    group.set_volume(volume);
                }
                Ok(())
            }
        }
    }

    // ---- queries ----------------------------------------------------------

    /// Pure inspection of one manager's current partition; does not commit
    /// transitions or dispatch anything.
    pub fn split_playbacks(&self, manager: ManagerId) -> Result<Selection> {
        let ctx = SelectionCtx {
            pending: &self.pending,
            started_by_caller: &self.started_by_caller,
        };
        self.groups
            .iter()
            .find_map(|g| g.manager(manager))
            .map(|m| m.split_playbacks(ctx))
            .ok_or(SelectionError::UnknownManager(manager))
    }

    // ---- refresh ----------------------------------------------------------

    /// Queues a refresh for one group and drains the queue unless a pass is
    /// already running (in which case the request coalesces into it).
    pub fn refresh(&mut self, group: GroupId) -> Result<()> {
        self.refresh_queue.push(group);
        if self.refreshing {
            debug!("refresh for group {group} coalesced into the running pass");
            return Ok(());
        }
        self.refreshing = true;
        let result = self.drain_refresh_queue();
        self.refreshing = false;
        result
    }

    pub fn refresh_all(&mut self) -> Result<()> {
        let groups: Vec<GroupId> = self.groups.iter().map(|g| g.id()).collect();
        self.refresh_queue.extend(groups);
        if self.refreshing {
            return Ok(());
        }
        self.refreshing = true;
        let result = self.drain_refresh_queue();
        self.refreshing = false;
        result
    }

    fn drain_refresh_queue(&mut self) -> Result<()> {
        while !self.refresh_queue.is_empty() {
            let group = self.refresh_queue.remove(0);
            self.refresh_queue.retain(|g| *g != group);
            self.refresh_group(group)?;
        }
        Ok(())
    }

    fn refresh_group(&mut self, group_id: GroupId) -> Result<()> {
        {
            let Some(group) = self.groups.iter_mut().find(|g| g.id() == group_id) else {
                debug!("refresh requested for removed group {group_id}; ignoring");
                return Ok(());
            };
            group.refresh_states();
        }

        let ctx = SelectionCtx {
            pending: &self.pending,
            started_by_caller: &self.started_by_caller,
        };
        let Some(group) = self.groups.iter().find(|g| g.id() == group_id) else {
            return Ok(());
        };
        let decision = group.arbitrate(ctx)?;

        let mut play: Vec<PlayableId> = Vec::with_capacity(decision.play.len());
        let mut pause: Vec<PlayableId> = Vec::with_capacity(decision.pause.len());
        for (manager, container) in &decision.play {
            if let Some(p) = group.manager(*manager).and_then(|m| m.playback(*container)) {
                play.push(p.playable());
            }
        }
        for (manager, container) in &decision.pause {
            if let Some(p) = group.manager(*manager).and_then(|m| m.playback(*container)) {
                pause.push(p.playable());
            }
        }

        // Free resources before claiming new ones.
        for playable in pause {
            self.finish_pause(playable);
        }
        for playable in play {
            self.finish_play(playable);
        }
        Ok(())
    }

    // ---- dispatch ---------------------------------------------------------

    fn finish_play(&mut self, playable: PlayableId) {
        if self.pending.get(&playable) == Some(&PendingState::Play) {
            self.pending.remove(&playable);
        }
        if self.playing.insert(playable) {
            if let Err(e) = self.dispatcher.play(playable) {
                warn!("play dispatch failed for {playable}: {e:#}");
            }
        }
    }

    // A pending pause mark is deliberately not consumed here: caller-initiated
    // pause stays in force until the caller requests play again or the
    // playback is released.
    fn finish_pause(&mut self, playable: PlayableId) {
        if self.playing.remove(&playable) {
            if let Err(e) = self.dispatcher.pause(playable) {
                warn!("pause dispatch failed for {playable}: {e:#}");
            }
        }
    }

    /// Final cleanup for playables whose bindings left the tree: pause them if
    /// needed and drop any recorded intent.
    fn release(&mut self, playables: Vec<PlayableId>) {
        for playable in playables {
            self.finish_pause(playable);
            self.pending.remove(&playable);
            self.started_by_caller.remove(&playable);
        }
    }
}
