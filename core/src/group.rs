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

use crate::bucket::SelectionCtx;
use crate::error::Result;
use crate::manager::{ManagerId, PlaybackManager, Selection};
use crate::playback::ContainerId;
use crate::scope::VolumeInfo;

/// Unique identifier for manager groups.
pub type GroupId = Uuid;

/// What one cluster pass decided, addressed per manager so the master can map
/// containers back to playables.
#[derive(Debug, Default)]
pub(crate) struct GroupDecision {
    pub play: Vec<(ManagerId, ContainerId)>,
    pub pause: Vec<(ManagerId, ContainerId)>,
}

/// Owner of the managers inside one lifecycle cluster (e.g. overlapping
/// screens). Arbitrates which manager's selection is dispatched when several
/// are eligible at once, and propagates cluster-wide lock and volume.
pub struct ManagerGroup {
    id: GroupId,
    managers: Vec<PlaybackManager>,
    lock: bool,
    volume: VolumeInfo,
}

impl ManagerGroup {
    pub(crate) fn new(volume: VolumeInfo) -> Self {
        Self {
            id: Uuid::new_v4(),
            managers: Vec::new(),
            lock: false,
            volume,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn lock(&self) -> bool {
        self.lock
    }

    pub fn volume(&self) -> VolumeInfo {
        self.volume
    }

    pub fn managers(&self) -> impl Iterator<Item = &PlaybackManager> {
        self.managers.iter()
    }

    pub(crate) fn managers_mut(&mut self) -> impl Iterator<Item = &mut PlaybackManager> {
        self.managers.iter_mut()
    }

    pub(crate) fn add_manager(&mut self, mut manager: PlaybackManager) -> ManagerId {
        manager.set_volume(self.volume);
        manager.set_lock(self.lock);
        let id = manager.id();
        self.managers.push(manager);
        debug!("manager {id} attached to group {}", self.id);
        id
    }

    pub(crate) fn remove_manager(&mut self, id: ManagerId) -> Option<PlaybackManager> {
        let index = self.managers.iter().position(|m| m.id() == id)?;
        debug!("manager {id} detached from group {}", self.id);
        Some(self.managers.remove(index))
    }

    pub(crate) fn manager(&self, id: ManagerId) -> Option<&PlaybackManager> {
        self.managers.iter().find(|m| m.id() == id)
    }

    pub(crate) fn manager_mut(&mut self, id: ManagerId) -> Option<&mut PlaybackManager> {
        self.managers.iter_mut().find(|m| m.id() == id)
    }

    /// Cluster lock cascades to every manager; the equality short-circuit
    /// keeps repeated toggles from re-cascading.
    pub(crate) fn set_lock(&mut self, lock: bool) {
        if self.lock == lock {
            return;
        }
        self.lock = lock;
        for manager in &mut self.managers {
            manager.set_lock(lock);
        }
    }

    pub(crate) fn set_volume(&mut self, volume: VolumeInfo) {
        if self.volume == volume {
            return;
        }
        self.volume = volume;
        for manager in &mut self.managers {
            manager.set_volume(volume);
        }
    }

    /// Commits active/inactive transitions on every manager ahead of
    /// arbitration.
    pub(crate) fn refresh_states(&mut self) {
        for manager in &mut self.managers {
            manager.refresh_playback_states();
        }
    }

    /// Manager indices in descending priority; equal priority keeps insertion
    /// order. Insertion sort because the comparator is fallible: a broken
    /// host contract must abort the pass. The antisymmetry check covers the
    /// pairs the sort actually compares, not every registered pair; a host
    /// that only misbehaves against a never-compared sibling is not caught in
    /// that pass.
    fn priority_order(&self) -> Result<Vec<usize>> {
        let mut order: Vec<usize> = Vec::with_capacity(self.managers.len());
        for i in 0..self.managers.len() {
            let mut insert_at = order.len();
            for (pos, &j) in order.iter().enumerate() {
                if self.managers[i].compare_priority(&self.managers[j])? > 0 {
                    insert_at = pos;
                    break;
                }
            }
            order.insert(insert_at, i);
        }
        Ok(order)
    }

    /// Picks at most one manager's selection to dispatch play; every other
    /// manager's would-be winners are redirected to pause.
    pub(crate) fn arbitrate(&self, ctx: SelectionCtx<'_>) -> Result<GroupDecision> {
        let order = self.priority_order()?;
        let selections: Vec<Selection> = self
            .managers
            .iter()
            .map(|m| m.split_playbacks(ctx))
            .collect();

        let winner = order
            .iter()
            .copied()
            .find(|&i| !selections[i].to_play.is_empty());

        let mut decision = GroupDecision::default();
        for (i, selection) in selections.iter().enumerate() {
            let manager_id = self.managers[i].id();
            if Some(i) == winner {
                decision
                    .play
                    .extend(selection.to_play.iter().map(|&c| (manager_id, c)));
                decision
                    .pause
                    .extend(selection.to_pause.iter().map(|&c| (manager_id, c)));
            } else {
                decision.pause.extend(
                    selection
                        .to_play
                        .iter()
                        .chain(selection.to_pause.iter())
                        .map(|&c| (manager_id, c)),
                );
            }
        }
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::{Axis, PendingState};
    use crate::error::SelectionError;
    use crate::lifecycle::LifecycleState;
    use crate::manager::Prioritized;
    use crate::playback::{
        AxisOffset, ContainerSlot, EligibilitySource, PlayableId, Playback, PlaybackConfig,
    };
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;

    struct AlwaysEligible;

    impl EligibilitySource for AlwaysEligible {
        fn should_prepare(&self, _playback: &Playback) -> bool {
            true
        }
    }

    struct RankedHost(i32);

    impl Prioritized for RankedHost {
        fn priority(&self) -> i32 {
            self.0
        }
    }

    struct Ctx {
        pending: HashMap<PlayableId, PendingState>,
        started: HashSet<PlayableId>,
    }

    impl Ctx {
        fn new() -> Self {
            Self { pending: HashMap::new(), started: HashSet::new() }
        }

        fn get(&self) -> SelectionCtx<'_> {
            SelectionCtx { pending: &self.pending, started_by_caller: &self.started }
        }
    }

    fn manager_with_live_playback(
        host: Option<Arc<dyn Prioritized>>,
    ) -> (PlaybackManager, ContainerId) {
        let mut manager = PlaybackManager::new(host, Arc::new(AlwaysEligible));
        manager.on_lifecycle_transition(LifecycleState::Started);
        let root = Uuid::new_v4();
        manager.add_bucket(root, Axis::Vertical);
        let slot = ContainerSlot::new(Uuid::new_v4(), root, AxisOffset::default());
        manager
            .register_playback(slot, Uuid::new_v4(), PlaybackConfig::default())
            .unwrap();
        manager.on_container_attached(slot.container);
        manager.refresh_playback_states();
        (manager, slot.container)
    }

    #[test]
    fn single_manager_selection_dispatches() {
        let mut group = ManagerGroup::new(VolumeInfo::default());
        let (manager, container) = manager_with_live_playback(None);
        let id = group.add_manager(manager);

        let ctx = Ctx::new();
        let decision = group.arbitrate(ctx.get()).unwrap();
        assert_eq!(decision.play, vec![(id, container)]);
        assert!(decision.pause.is_empty());
    }

    #[test]
    fn losing_manager_selection_redirected_to_pause() {
        let mut group = ManagerGroup::new(VolumeInfo::default());
        let (first, c1) = manager_with_live_playback(None);
        let (second, c2) = manager_with_live_playback(None);
        let first_id = group.add_manager(first);
        let second_id = group.add_manager(second);

        let ctx = Ctx::new();
        let decision = group.arbitrate(ctx.get()).unwrap();
        // Equal priority keeps insertion order: the first manager wins.
        assert_eq!(decision.play, vec![(first_id, c1)]);
        assert_eq!(decision.pause, vec![(second_id, c2)]);
    }

    #[test]
    fn hosted_manager_ranks_above_hostless() {
        let mut group = ManagerGroup::new(VolumeInfo::default());
        let (hostless, _c1) = manager_with_live_playback(None);
        let (hosted, c2) = manager_with_live_playback(Some(Arc::new(RankedHost(0))));
        group.add_manager(hostless);
        let hosted_id = group.add_manager(hosted);

        let ctx = Ctx::new();
        let decision = group.arbitrate(ctx.get()).unwrap();
        assert_eq!(decision.play, vec![(hosted_id, c2)]);
    }

    #[test]
    fn broken_priority_contract_aborts_the_pass() {
        struct Broken;
        impl Prioritized for Broken {
            fn priority(&self) -> i32 {
                0
            }

            fn compare_priority(&self, _other: &dyn Prioritized) -> i32 {
                1
            }
        }

        let mut group = ManagerGroup::new(VolumeInfo::default());
        let (first, _) = manager_with_live_playback(Some(Arc::new(Broken)));
        let (second, _) = manager_with_live_playback(Some(Arc::new(Broken)));
        group.add_manager(first);
        group.add_manager(second);

        let ctx = Ctx::new();
        let err = group.arbitrate(ctx.get()).unwrap_err();
        assert_eq!(err, SelectionError::PriorityContract { ltr: 1, rtl: 1 });
    }

    #[test]
    fn group_lock_cascades_to_managers() {
        let mut group = ManagerGroup::new(VolumeInfo::default());
        let (manager, _) = manager_with_live_playback(None);
        let id = group.add_manager(manager);

        group.set_lock(true);
        assert!(group.manager(id).unwrap().lock());

        let ctx = Ctx::new();
        let decision = group.arbitrate(ctx.get()).unwrap();
        assert!(decision.play.is_empty());
        assert_eq!(decision.pause.len(), 1);
    }

    #[test]
    fn group_volume_cascades_to_new_managers() {
        let quiet = VolumeInfo::new(true, 0.0);
        let mut group = ManagerGroup::new(VolumeInfo::default());
        group.set_volume(quiet);

        let (manager, container) = manager_with_live_playback(None);
        let id = group.add_manager(manager);
        let manager = group.manager(id).unwrap();
        assert_eq!(manager.volume(), quiet);
        assert_eq!(manager.playback(container).unwrap().volume(), quiet);
    }
}
