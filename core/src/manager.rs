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

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use log::{debug, warn};
use uuid::Uuid;

use crate::bucket::{Axis, Bucket, BucketPolicy, SelectionCtx};
use crate::error::{Result, SelectionError};
use crate::lifecycle::LifecycleState;
use crate::playback::{
    ContainerId, ContainerSlot, EligibilitySource, PlayableId, Playback, PlaybackConfig,
};
use crate::scope::VolumeInfo;

/// Unique identifier for managers.
pub type ManagerId = Uuid;

/// Capability interface for host objects that take part in cross-manager
/// ranking. Hosts of unknown concrete type implement this to be comparable.
pub trait Prioritized: Send + Sync {
    /// Rank of this host; higher ranks win arbitration.
    fn priority(&self) -> i32;

    /// Positive if `self` ranks above `other`, negative if below, zero if
    /// equal. Must be the exact inverse of `other.compare_priority(self)`;
    /// overriding implementations are checked for that at every pass.
    fn compare_priority(&self, other: &dyn Prioritized) -> i32 {
        self.priority() - other.priority()
    }
}

/// Compares two hosts in both directions and verifies the results are exact
/// inverses. A violation is a caller bug and surfaces as an error.
pub(crate) fn compare_and_check(left: &dyn Prioritized, right: &dyn Prioritized) -> Result<i32> {
    let ltr = left.compare_priority(right);
    let rtl = right.compare_priority(left);
    if i64::from(ltr) + i64::from(rtl) != 0 {
        return Err(SelectionError::PriorityContract { ltr, rtl });
    }
    Ok(ltr)
}

/// Disjoint partition of the attached playbacks computed by one selection
/// pass. Every attached playback appears in exactly one of the two sets.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Selection {
    pub to_play: HashSet<ContainerId>,
    pub to_pause: HashSet<ContainerId>,
}

/// Per-lifecycle-scope owner of buckets and playbacks; runs the selection
/// algorithm.
///
/// The bucket sequence doubles as queue and stack: new buckets append at the
/// tail, and at most one bucket may be promoted to the head as sticky.
pub struct PlaybackManager {
    id: ManagerId,
    host: Option<Arc<dyn Prioritized>>,
    eligibility: Arc<dyn EligibilitySource>,
    buckets: VecDeque<Bucket>,
    sticky: Option<ContainerId>,
    playbacks: HashMap<ContainerId, Playback>,
    // Containers that had a playback once; distinguishes stale no-ops from
    // never-registered caller bugs.
    retired: HashSet<ContainerId>,
    lock: bool,
    volume: VolumeInfo,
    lifecycle: LifecycleState,
}

impl PlaybackManager {
    pub fn new(
        host: Option<Arc<dyn Prioritized>>,
        eligibility: Arc<dyn EligibilitySource>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            host,
            eligibility,
            buckets: VecDeque::new(),
            sticky: None,
            playbacks: HashMap::new(),
            retired: HashSet::new(),
            lock: false,
            volume: VolumeInfo::default(),
            lifecycle: LifecycleState::Created,
        }
    }

    pub fn id(&self) -> ManagerId {
        self.id
    }

    pub fn lock(&self) -> bool {
        self.lock
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    pub fn volume(&self) -> VolumeInfo {
        self.volume
    }

    pub fn playback(&self, container: ContainerId) -> Option<&Playback> {
        self.playbacks.get(&container)
    }

    pub fn playbacks(&self) -> impl Iterator<Item = &Playback> {
        self.playbacks.values()
    }

    pub fn sticky(&self) -> Option<ContainerId> {
        self.sticky
    }

    // ---- registration -----------------------------------------------------

    /// Registers a playable under a container slot. Each slot holds at most
    /// one playback at a time; a second registration is a caller bug.
    pub fn register_playback(
        &mut self,
        slot: ContainerSlot,
        playable: PlayableId,
        config: PlaybackConfig,
    ) -> Result<()> {
        if self.playbacks.contains_key(&slot.container) {
            return Err(SelectionError::DuplicateSlot(slot.container));
        }
        let inherited = self
            .buckets
            .iter()
            .find(|b| b.accepts(&slot))
            .map(|b| b.volume())
            .unwrap_or(self.volume);
        let playback = Playback::new(playable, slot, config, inherited, self.lifecycle);
        self.retired.remove(&slot.container);
        self.playbacks.insert(slot.container, playback);
        debug!("playback {playable} registered in container {}", slot.container);
        Ok(())
    }

    /// Unregisters the playback in a container slot. Returns the released
    /// playable, or `None` when the call was a stale no-op.
    pub fn unregister_playback(&mut self, container: ContainerId) -> Result<Option<PlayableId>> {
        if let Some(mut playback) = self.playbacks.remove(&container) {
            playback.on_removed();
            self.retired.insert(container);
            return Ok(Some(playback.playable()));
        }
        if self.retired.contains(&container) {
            debug!("container {container} already unregistered; ignoring");
            return Ok(None);
        }
        Err(SelectionError::UnknownSlot(container))
    }

    // ---- buckets ----------------------------------------------------------

    /// Adds a bucket for a container root; a root owns at most one bucket, so
    /// a second add is a no-op.
    pub fn add_bucket(&mut self, root: ContainerId, axis: Axis) {
        if self.buckets.iter().any(|b| b.root() == root) {
            return;
        }
        self.buckets.push_back(Bucket::new(root, axis, self.volume));
        debug!("bucket added for root {root}");
    }

    /// Same as [`add_bucket`](Self::add_bucket) with a caller-supplied policy.
    pub fn add_bucket_with_policy(
        &mut self,
        root: ContainerId,
        axis: Axis,
        policy: Arc<dyn BucketPolicy>,
    ) {
        if self.buckets.iter().any(|b| b.root() == root) {
            return;
        }
        self.buckets
            .push_back(Bucket::with_policy(root, axis, self.volume, policy));
        debug!("bucket added for root {root}");
    }

    /// Removes a bucket and every playback under it. Returns the released
    /// playables. Unknown roots are stale no-ops.
    pub fn remove_bucket(&mut self, root: ContainerId) -> Vec<PlayableId> {
        let Some(index) = self.buckets.iter().position(|b| b.root() == root) else {
            debug!("bucket root {root} not present; ignoring removal");
            return Vec::new();
        };
        self.unstick(Some(root));
        let Some(bucket) = self.buckets.remove(index) else {
            return Vec::new();
        };

        let owned: Vec<ContainerId> = self
            .playbacks
            .values()
            .filter(|p| bucket.accepts(p.slot()))
            .map(|p| p.container())
            .collect();

        let mut released = Vec::with_capacity(owned.len());
        for container in owned {
            if let Some(mut playback) = self.playbacks.remove(&container) {
                playback.on_removed();
                self.retired.insert(container);
                released.push(playback.playable());
            }
        }
        debug!("bucket removed for root {root}");
        released
    }

    // ---- sticky -----------------------------------------------------------

    /// Promotes a bucket to the head of the selection order. At most one
    /// bucket is sticky at a time; sticking another replaces it.
    pub fn stick(&mut self, root: ContainerId) {
        if self.sticky == Some(root) {
            return;
        }
        if self.buckets.iter().any(|b| b.root() == root) {
            self.sticky = Some(root);
            debug!("bucket {root} promoted to sticky");
        } else {
            warn!("stick requested for unknown bucket root {root}; ignoring");
        }
    }

    /// Demotes the sticky bucket. `None` unsticks whichever bucket is sticky;
    /// a specific root only unsticks if it is still the sticky one.
    pub fn unstick(&mut self, root: Option<ContainerId>) {
        match root {
            None => self.sticky = None,
            Some(root) => {
                if self.sticky == Some(root) {
                    self.sticky = None;
                }
            }
        }
    }

    fn ordered_buckets(&self) -> Vec<&Bucket> {
        let mut ordered = Vec::with_capacity(self.buckets.len());
        if let Some(sticky) = self.sticky {
            if let Some(bucket) = self.buckets.iter().find(|b| b.root() == sticky) {
                ordered.push(bucket);
            }
        }
        for bucket in &self.buckets {
            if Some(bucket.root()) != self.sticky {
                ordered.push(bucket);
            }
        }
        ordered
    }

    // ---- external events --------------------------------------------------

    /// Returns whether the container is registered, so the caller knows
    /// whether a refresh is worthwhile.
    pub fn on_container_attached(&mut self, container: ContainerId) -> bool {
        match self.playbacks.get_mut(&container) {
            Some(playback) => {
                playback.on_attached();
                true
            }
            None => {
                debug!("attach for unregistered container {container}; ignoring");
                false
            }
        }
    }

    /// A detached container can be re-attached later (recycled container
    /// views), so the playback stays registered.
    pub fn on_container_detached(&mut self, container: ContainerId) -> bool {
        match self.playbacks.get_mut(&container) {
            Some(playback) => {
                playback.on_detached();
                true
            }
            None => {
                debug!("detach for unregistered container {container}; ignoring");
                false
            }
        }
    }

    pub fn on_container_layout_changed(&self, container: ContainerId) -> bool {
        self.playbacks.contains_key(&container)
    }

    pub fn set_lock(&mut self, lock: bool) {
        if self.lock == lock {
            return;
        }
        self.lock = lock;
        debug!("manager {} lock set to {lock}", self.id);
    }

    /// Maps an external lifecycle transition to internal state. Returns the
    /// playables released by a terminal `Destroyed` cascade.
    pub fn on_lifecycle_transition(&mut self, state: LifecycleState) -> Vec<PlayableId> {
        self.lifecycle = state;
        for playback in self.playbacks.values_mut() {
            playback.set_lifecycle(state);
        }
        match state {
            LifecycleState::Stopped => {
                for playback in self.playbacks.values_mut() {
                    playback.on_inactive();
                }
                Vec::new()
            }
            LifecycleState::Destroyed => self.teardown(),
            _ => Vec::new(),
        }
    }

    fn teardown(&mut self) -> Vec<PlayableId> {
        self.unstick(None);
        let mut released = Vec::with_capacity(self.playbacks.len());
        for (container, mut playback) in self.playbacks.drain() {
            playback.on_removed();
            self.retired.insert(container);
            released.push(playback.playable());
        }
        self.buckets.clear();
        debug!("manager {} destroyed; {} playbacks released", self.id, released.len());
        released
    }

    // ---- selection --------------------------------------------------------

    /// Re-derives the active/inactive partition from the eligibility source.
    /// Must run before selection so the candidate pool reflects current
    /// eligibility.
    pub fn refresh_playback_states(&mut self) {
        let eligibility = Arc::clone(&self.eligibility);
        let activation_allowed = self.lifecycle.allows_activation();
        for playback in self.playbacks.values_mut() {
            let eligible =
                activation_allowed && playback.is_attached() && eligibility.should_prepare(playback);
            if eligible && !playback.is_active() {
                playback.on_active();
            } else if !eligible && playback.is_active() {
                playback.on_inactive();
            }
        }
    }

    /// Splits the attached playbacks into the disjoint to-play / to-pause
    /// partition. Pure function of current state; repeated calls with
    /// unchanged inputs return identical sets.
    ///
    /// Buckets are visited sticky-first, then in insertion order; the first
    /// bucket returning a nonempty subset ends the pass. A locked manager
    /// forces everything to pause.
    pub fn split_playbacks(&self, ctx: SelectionCtx<'_>) -> Selection {
        let attached: Vec<&Playback> =
            self.playbacks.values().filter(|p| p.is_attached()).collect();

        let mut to_play: Vec<ContainerId> = Vec::new();
        for bucket in self.ordered_buckets() {
            let pool: Vec<&Playback> = attached
                .iter()
                .copied()
                .filter(|p| bucket.accepts(p.slot()))
                .collect();
            if pool.is_empty() {
                continue;
            }
            let candidates: Vec<&Playback> = pool
                .into_iter()
                .filter(|p| bucket.eligible(p))
                .filter(|p| bucket.allow_to_play(p, ctx))
                .collect();
            let chosen = bucket.select_to_play(&candidates, ctx);
            if !chosen.is_empty() {
                to_play = chosen;
                break;
            }
        }

        if self.lock {
            to_play.clear();
        }

        let to_play: HashSet<ContainerId> = to_play.into_iter().collect();
        let to_pause: HashSet<ContainerId> = attached
            .iter()
            .map(|p| p.container())
            .filter(|c| !to_play.contains(c))
            .collect();
        Selection { to_play, to_pause }
    }

    // ---- priority ---------------------------------------------------------

    /// Ranks this manager against a sibling. A manager with a prioritized
    /// host ranks above a hostless one; two hosted managers defer to the
    /// hosts' comparator, checked for antisymmetry.
    pub(crate) fn compare_priority(&self, other: &PlaybackManager) -> Result<i32> {
        match (&self.host, &other.host) {
            (Some(left), Some(right)) => compare_and_check(left.as_ref(), right.as_ref()),
            (Some(_), None) => Ok(1),
            (None, Some(_)) => Ok(-1),
            (None, None) => Ok(0),
        }
    }

    // ---- volume -----------------------------------------------------------

    /// Applies a volume to this manager and cascades it to every bucket and
    /// playback below. No-op when the value is unchanged, so mutual updates
    /// between levels cannot loop.
    pub fn set_volume(&mut self, volume: VolumeInfo) {
        if self.volume == volume {
            return;
        }
        self.volume = volume;
        for i in 0..self.buckets.len() {
            let root = self.buckets[i].root();
            if self.buckets[i].set_volume(volume) {
                Self::cascade_bucket_volume(&self.buckets, &mut self.playbacks, root, volume);
            }
        }
    }

    /// Applies a volume to one bucket and its playbacks. Returns whether the
    /// root resolved to a live bucket.
    pub fn set_bucket_volume(&mut self, root: ContainerId, volume: VolumeInfo) -> bool {
        let Some(index) = self.buckets.iter().position(|b| b.root() == root) else {
            return false;
        };
        if self.buckets[index].set_volume(volume) {
            Self::cascade_bucket_volume(&self.buckets, &mut self.playbacks, root, volume);
        }
        true
    }

    /// Applies a volume to a single playback. Returns whether the container
    /// resolved to a live playback.
    pub fn set_playback_volume(&mut self, container: ContainerId, volume: VolumeInfo) -> bool {
        match self.playbacks.get_mut(&container) {
            Some(playback) => {
                playback.set_volume(volume);
                true
            }
            None => false,
        }
    }

    /// The bucket root owning a registered container, if any.
    pub fn bucket_root_for(&self, container: ContainerId) -> Option<ContainerId> {
        let playback = self.playbacks.get(&container)?;
        self.ordered_buckets()
            .into_iter()
            .find(|b| b.accepts(playback.slot()))
            .map(|b| b.root())
    }

    fn cascade_bucket_volume(
        buckets: &VecDeque<Bucket>,
        playbacks: &mut HashMap<ContainerId, Playback>,
        root: ContainerId,
        volume: VolumeInfo,
    ) {
        let Some(bucket) = buckets.iter().find(|b| b.root() == root) else {
            return;
        };
        for playback in playbacks.values_mut() {
            if bucket.accepts(playback.slot()) {
                playback.set_volume(volume);
            }
        }
    }
}
