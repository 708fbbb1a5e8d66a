pub mod bucket;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod group;
pub mod lifecycle;
pub mod manager;
pub mod master;
pub mod playback;
pub mod scope;
pub mod service;

pub use bucket::{Axis, Bucket, BucketPolicy, DefaultBucketPolicy, PendingState, SelectionCtx};
pub use dispatcher::{NoopDispatcher, PlaybackDispatcher};
pub use error::{Result, SelectionError};
pub use events::SelectionEvent;
pub use group::{GroupId, ManagerGroup};
pub use lifecycle::LifecycleState;
pub use manager::{ManagerId, PlaybackManager, Prioritized, Selection};
pub use master::Master;
pub use playback::{
    AxisOffset, ContainerId, ContainerSlot, EligibilitySource, PlayableId, Playback,
    PlaybackConfig,
};
pub use scope::{Scope, VolumeInfo, VolumeTarget};
pub use service::{SelectionEventSender, SelectionService, ServiceHandle};
