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

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::playback::{ContainerId, ContainerSlot, PlayableId, Playback};
use crate::scope::VolumeInfo;

/// Manual playback intent recorded by the master for a playable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    Play,
    Pause,
}

/// Read-only selection inputs shared by every bucket during one pass.
#[derive(Clone, Copy)]
pub struct SelectionCtx<'a> {
    pub pending: &'a HashMap<PlayableId, PendingState>,
    pub started_by_caller: &'a HashSet<PlayableId>,
}

impl SelectionCtx<'_> {
    pub fn is_pending_play(&self, playable: PlayableId) -> bool {
        self.pending.get(&playable) == Some(&PendingState::Play)
    }

    pub fn is_pending_pause(&self, playable: PlayableId) -> bool {
        self.pending.get(&playable) == Some(&PendingState::Pause)
    }

    pub fn is_started_by_caller(&self, playable: PlayableId) -> bool {
        self.started_by_caller.contains(&playable)
    }
}

/// Reference axis a bucket orders its candidates along.
///
/// `None` is for container roots without a meaningful axis; it falls back to
/// the same fixed total order as `Both`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
    Both,
    None,
}

impl Axis {
    fn rank(self, slot: &ContainerSlot) -> i64 {
        let x = i64::from(slot.offset.x).abs();
        let y = i64::from(slot.offset.y).abs();
        match self {
            Axis::Horizontal => x,
            Axis::Vertical => y,
            Axis::Both | Axis::None => x + y,
        }
    }

    /// Deterministic total order: axis distance first, container id as the
    /// tie-break so equal distances never depend on iteration order.
    pub(crate) fn compare(self, a: &ContainerSlot, b: &ContainerSlot) -> Ordering {
        self.rank(a)
            .cmp(&self.rank(b))
            .then_with(|| a.container.cmp(&b.container))
    }
}

/// Policy hooks a bucket applies to its candidates. All hooks are pure.
pub trait BucketPolicy: Send + Sync {
    /// Whether a container slot belongs under the bucket root.
    fn accepts(&self, root: ContainerId, slot: &ContainerSlot) -> bool {
        slot.root == root
    }

    /// Whether a playback enters selection at all.
    fn eligible(&self, playback: &Playback) -> bool {
        playback.is_active()
    }

    /// Veto hook applied after eligibility; the default rejects playables the
    /// caller has explicitly paused.
    fn allow_to_play(&self, playback: &Playback, ctx: SelectionCtx<'_>) -> bool {
        !ctx.is_pending_pause(playback.playable())
    }

    /// Picks the subset that should actually play. At most one automatic
    /// winner per bucket.
    fn select_to_play(
        &self,
        axis: Axis,
        candidates: &[&Playback],
        ctx: SelectionCtx<'_>,
    ) -> Vec<ContainerId> {
        select_by_axis(axis, candidates, ctx)
    }
}

/// Default selection strategy: order candidates along the axis, then prefer
/// the manual partition. Among manual candidates, one that is pending-start or
/// was started by the caller wins; otherwise the first in axis order. With no
/// manual candidates, the first automatic candidate plays.
pub(crate) fn select_by_axis(
    axis: Axis,
    candidates: &[&Playback],
    ctx: SelectionCtx<'_>,
) -> Vec<ContainerId> {
    let mut ordered: Vec<&Playback> = candidates.to_vec();
    ordered.sort_by(|a, b| axis.compare(a.slot(), b.slot()));

    let (manual, automatic): (Vec<&Playback>, Vec<&Playback>) =
        ordered.into_iter().partition(|p| p.config().manual);

    if !manual.is_empty() {
        let chosen = manual
            .iter()
            .find(|p| {
                ctx.is_pending_play(p.playable()) || ctx.is_started_by_caller(p.playable())
            })
            .or_else(|| manual.first());
        return chosen.map(|p| vec![p.container()]).unwrap_or_default();
    }

    automatic
        .first()
        .map(|p| vec![p.container()])
        .unwrap_or_default()
}

/// Default policy; buckets use it unless the caller installs another one.
pub struct DefaultBucketPolicy;

impl BucketPolicy for DefaultBucketPolicy {}

/// Owner of all candidates under one container root.
///
/// Created on first add of its root and kept across temporary root
/// detachment; only explicit removal destroys it.
pub struct Bucket {
    root: ContainerId,
    axis: Axis,
    volume: VolumeInfo,
    policy: Arc<dyn BucketPolicy>,
}

impl Bucket {
    pub(crate) fn new(root: ContainerId, axis: Axis, volume: VolumeInfo) -> Self {
        Self::with_policy(root, axis, volume, Arc::new(DefaultBucketPolicy))
    }

    pub(crate) fn with_policy(
        root: ContainerId,
        axis: Axis,
        volume: VolumeInfo,
        policy: Arc<dyn BucketPolicy>,
    ) -> Self {
        Self { root, axis, volume, policy }
    }

    pub fn root(&self) -> ContainerId {
        self.root
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn volume(&self) -> VolumeInfo {
        self.volume
    }

    /// Returns whether the value actually changed, so the owner knows whether
    /// to cascade.
    pub(crate) fn set_volume(&mut self, volume: VolumeInfo) -> bool {
        if self.volume == volume {
            return false;
        }
        self.volume = volume;
        true
    }

    pub(crate) fn accepts(&self, slot: &ContainerSlot) -> bool {
        self.policy.accepts(self.root, slot)
    }

    pub(crate) fn eligible(&self, playback: &Playback) -> bool {
        self.policy.eligible(playback)
    }

    pub(crate) fn allow_to_play(&self, playback: &Playback, ctx: SelectionCtx<'_>) -> bool {
        self.policy.allow_to_play(playback, ctx)
    }

    pub(crate) fn select_to_play(
        &self,
        candidates: &[&Playback],
        ctx: SelectionCtx<'_>,
    ) -> Vec<ContainerId> {
        self.policy.select_to_play(self.axis, candidates, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleState;
    use crate::playback::{AxisOffset, PlaybackConfig};
    use uuid::Uuid;

    fn playback(root: ContainerId, offset: AxisOffset, manual: bool) -> Playback {
        let slot = ContainerSlot::new(Uuid::new_v4(), root, offset);
        let config = PlaybackConfig { manual, volume: None };
        let mut pb = Playback::new(
            Uuid::new_v4(),
            slot,
            config,
            VolumeInfo::default(),
            LifecycleState::Started,
        );
        pb.on_attached();
        pb.on_active();
        pb
    }

    fn empty_ctx<'a>(
        pending: &'a HashMap<PlayableId, PendingState>,
        started: &'a HashSet<PlayableId>,
    ) -> SelectionCtx<'a> {
        SelectionCtx { pending, started_by_caller: started }
    }

    #[test]
    fn automatic_candidate_closest_to_axis_wins() {
        let root = Uuid::new_v4();
        let far = playback(root, AxisOffset::new(0, 40), false);
        let near = playback(root, AxisOffset::new(0, 10), false);

        let bucket = Bucket::new(root, Axis::Vertical, VolumeInfo::default());
        let pending = HashMap::new();
        let started = HashSet::new();
        let ctx = empty_ctx(&pending, &started);

        let selected = bucket.select_to_play(&[&far, &near], ctx);
        assert_eq!(selected, vec![near.container()]);
    }

    #[test]
    fn at_most_one_automatic_winner() {
        let root = Uuid::new_v4();
        let a = playback(root, AxisOffset::new(0, 1), false);
        let b = playback(root, AxisOffset::new(0, 2), false);
        let c = playback(root, AxisOffset::new(0, 3), false);

        let bucket = Bucket::new(root, Axis::Vertical, VolumeInfo::default());
        let pending = HashMap::new();
        let started = HashSet::new();
        let selected = bucket.select_to_play(&[&a, &b, &c], empty_ctx(&pending, &started));
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn manual_partition_beats_automatic() {
        let root = Uuid::new_v4();
        let auto_near = playback(root, AxisOffset::new(0, 0), false);
        let manual_far = playback(root, AxisOffset::new(0, 100), true);

        let bucket = Bucket::new(root, Axis::Vertical, VolumeInfo::default());
        let pending = HashMap::new();
        let started = HashSet::new();
        let selected = bucket.select_to_play(&[&auto_near, &manual_far], empty_ctx(&pending, &started));
        assert_eq!(selected, vec![manual_far.container()]);
    }

    #[test]
    fn pending_start_preferred_within_manual_partition() {
        let root = Uuid::new_v4();
        let first_manual = playback(root, AxisOffset::new(0, 1), true);
        let pending_manual = playback(root, AxisOffset::new(0, 50), true);

        let bucket = Bucket::new(root, Axis::Vertical, VolumeInfo::default());
        let mut pending = HashMap::new();
        pending.insert(pending_manual.playable(), PendingState::Play);
        let started = HashSet::new();

        let selected = bucket.select_to_play(
            &[&first_manual, &pending_manual],
            empty_ctx(&pending, &started),
        );
        assert_eq!(selected, vec![pending_manual.container()]);
    }

    #[test]
    fn started_by_caller_preferred_within_manual_partition() {
        let root = Uuid::new_v4();
        let first_manual = playback(root, AxisOffset::new(0, 1), true);
        let started_manual = playback(root, AxisOffset::new(0, 50), true);

        let bucket = Bucket::new(root, Axis::Vertical, VolumeInfo::default());
        let pending = HashMap::new();
        let mut started = HashSet::new();
        started.insert(started_manual.playable());

        let selected = bucket.select_to_play(
            &[&first_manual, &started_manual],
            empty_ctx(&pending, &started),
        );
        assert_eq!(selected, vec![started_manual.container()]);
    }

    #[test]
    fn pending_pause_vetoed_by_allow_to_play() {
        let root = Uuid::new_v4();
        let pb = playback(root, AxisOffset::default(), false);

        let bucket = Bucket::new(root, Axis::Both, VolumeInfo::default());
        let mut pending = HashMap::new();
        pending.insert(pb.playable(), PendingState::Pause);
        let started = HashSet::new();

        assert!(!bucket.allow_to_play(&pb, empty_ctx(&pending, &started)));
    }

    #[test]
    fn empty_candidates_select_nothing() {
        let bucket = Bucket::new(Uuid::new_v4(), Axis::Horizontal, VolumeInfo::default());
        let pending = HashMap::new();
        let started = HashSet::new();
        assert!(bucket.select_to_play(&[], empty_ctx(&pending, &started)).is_empty());
    }

    #[test]
    fn equal_distance_ties_break_by_container_id() {
        let root = Uuid::new_v4();
        let a = playback(root, AxisOffset::new(0, 5), false);
        let b = playback(root, AxisOffset::new(0, 5), false);

        let bucket = Bucket::new(root, Axis::Vertical, VolumeInfo::default());
        let pending = HashMap::new();
        let started = HashSet::new();

        let expected = a.container().min(b.container());
        let selected = bucket.select_to_play(&[&a, &b], empty_ctx(&pending, &started));
        assert_eq!(selected, vec![expected]);

        // Same result regardless of argument order.
        let again = bucket.select_to_play(&[&b, &a], empty_ctx(&pending, &started));
        assert_eq!(again, vec![expected]);
    }
}
