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

use crate::group::GroupId;
use crate::manager::ManagerId;
use crate::playback::ContainerId;

/// Nested setting scopes, narrowest to widest.
///
/// Applying a setting at a scope overwrites the value for every descendant
/// currently inside it and becomes the default for descendants added later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    Playback,
    Bucket,
    Manager,
    Group,
    Global,
}

/// Volume setting propagated top-down through the scope hierarchy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeInfo {
    pub muted: bool,
    pub level: f32,
}

impl VolumeInfo {
    pub fn new(muted: bool, level: f32) -> Self {
        Self { muted, level }
    }
}

impl Default for VolumeInfo {
    fn default() -> Self {
        Self { muted: false, level: 1.0 }
    }
}

/// The object a volume update is addressed to.
///
/// The target must match the declared [`Scope`], with one relaxation: a
/// `Bucket`-scoped update also accepts a playback inside the bucket and
/// resolves to its owning bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeTarget {
    Playback(ContainerId),
    /// Addressed by the bucket's container root.
    Bucket(ContainerId),
    Manager(ManagerId),
    Group(GroupId),
    Global,
}
