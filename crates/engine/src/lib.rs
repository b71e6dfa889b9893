//! The delegation core: validation, expiry, and per-request access
//! resolution over the shared stores.
//!
//! Components mirror the writer discipline of the design:
//!
//! - [`DelegationManager`] is the only writer of new and revoked rows.
//! - [`ExpirySweeper`] is the only writer of time-based expiry and the
//!   trigger source for push notifications.
//! - [`AccessResolver`] combines base ownership, the permission engine's
//!   output, and the delegation ledger into the final authority decision for
//!   one request. It never trusts the `active` status column without
//!   re-checking `expiry_at` against the evaluation instant.
//! - [`PermissionService`] recomputes the effective capability set on every
//!   call; nothing here caches a security decision.
//!
//! The external case and identity collaborators sit behind the [`Directory`]
//! trait; [`Core::open`] wires the SQLite-backed implementation used by the
//! CLI and tests.

mod directory;
mod error;
mod manager;
mod permissions;
mod resolver;
mod sweeper;

pub use directory::Directory;
pub use error::{Error, Result};
pub use manager::{CreateDelegation, DelegationManager};
pub use permissions::PermissionService;
pub use resolver::{Access, AccessResolver, decide};
pub use sweeper::{ExpirySweeper, SweepReport};

use parking_lot::Mutex;
use policy::RolePolicy;
use push::Dispatcher;
use std::path::Path;
use std::sync::Arc;
use store::{DelegationStore, DirectoryStore, PolicyStore};

pub(crate) type Shared<T> = Arc<Mutex<T>>;

/// The core wired over the bundled SQLite stores.
pub type SqliteCore = Core<Mutex<DirectoryStore>>;

/// The assembled delegation core, one handle per process.
pub struct Core<D: Directory> {
    pub manager: DelegationManager<D>,
    pub sweeper: ExpirySweeper,
    pub resolver: AccessResolver<D>,
    pub permissions: PermissionService,
    pub dispatcher: Dispatcher,
    /// The collaborator view the components read from.
    pub directory: Arc<D>,
}

impl<D: Directory> Core<D> {
    /// Wire the components over already-constructed stores.
    pub fn new(
        delegations: DelegationStore,
        policies: PolicyStore,
        directory: D,
        rules: RolePolicy,
        dispatcher: Dispatcher,
    ) -> Self {
        let delegations: Shared<DelegationStore> = Arc::new(Mutex::new(delegations));
        let directory = Arc::new(directory);
        let rules = Arc::new(rules);

        Self {
            manager: DelegationManager::new(
                delegations.clone(),
                directory.clone(),
                dispatcher.clone(),
            ),
            sweeper: ExpirySweeper::new(delegations.clone(), dispatcher.clone()),
            resolver: AccessResolver::new(delegations, directory.clone()),
            permissions: PermissionService::new(Arc::new(Mutex::new(policies)), rules),
            dispatcher,
            directory,
        }
    }
}

impl Core<Mutex<DirectoryStore>> {
    /// Open every store at `path` and assemble the core around them.
    pub fn open(path: impl AsRef<Path>, rules: RolePolicy) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self::new(
            DelegationStore::open(path)?,
            PolicyStore::open(path)?,
            Mutex::new(DirectoryStore::open(path)?),
            rules,
            Dispatcher::new(),
        ))
    }

    /// Fully in-memory core (tests). The stores are independent databases,
    /// which is fine: their tables are disjoint.
    pub fn in_memory(rules: RolePolicy) -> Result<Self> {
        Ok(Self::new(
            DelegationStore::in_memory()?,
            PolicyStore::in_memory()?,
            Mutex::new(DirectoryStore::in_memory()?),
            rules,
            Dispatcher::new(),
        ))
    }
}
