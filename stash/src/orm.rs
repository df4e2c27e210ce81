//! Contracts the cache consumes from the host ORM.
//!
//! The cache never touches entities; it only needs to know which tables a
//! save is about to modify. Adapters implement these traits over the ORM's
//! change tracker and model metadata.

/// Tracked state of one entity at save time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Added,
    Modified,
    Deleted,
    Unchanged,
    Detached,
}

impl EntityState {
    /// States that will touch the database when the save commits.
    pub fn writes(&self) -> bool {
        matches!(self, Self::Added | Self::Modified | Self::Deleted)
    }
}

/// One entry of the change tracker.
#[derive(Debug, Clone)]
pub struct ChangeEntry {
    pub entity_type: String,
    pub state: EntityState,
}

/// A navigation of an entity type, as the model describes it.
#[derive(Debug, Clone, Default)]
pub struct NavigationInfo {
    /// Table backing the navigation's target, if it is mapped.
    pub table_name: Option<String>,
    /// Whether the target is an owned entity persisted with its owner.
    pub target_is_owned: bool,
}

/// Entity-to-table metadata.
pub trait EntityModel: Send + Sync {
    /// Table backing `entity_type`, if it is mapped to one.
    fn table_name(&self, entity_type: &str) -> Option<String>;

    /// Navigations declared on `entity_type`.
    fn navigations(&self, entity_type: &str) -> Vec<NavigationInfo> {
        let _ = entity_type;
        Vec::new()
    }
}

/// A live ORM session, as seen by the save interceptor.
///
/// `session_id` must be stable for the session's lifetime and unique among
/// concurrently live sessions; it keys the pending-invalidation slot.
/// Concurrent saves on one session are not supported.
pub trait OrmSession: Send + Sync {
    fn session_id(&self) -> u64;

    fn model(&self) -> &dyn EntityModel;

    /// Snapshot of the change tracker.
    fn changes(&self) -> Vec<ChangeEntry>;
}
