//! SocialConnect connection store
//!
//! Persists the links between local users and their identities at external
//! providers, ranked per provider so that rank 1 marks the primary
//! connection. [`MongoConnectionStore`] is the production backend;
//! [`InMemoryConnectionStore`] mirrors its behaviour for tests.

pub mod converter;
pub mod entity;
pub mod error;
pub mod indexes;
pub mod memory;
pub mod mongo;
pub mod registry;
pub mod repository;
pub mod store;
pub mod users;

pub use sc_common::{ConnectionData, ConnectionKey};

pub use converter::{ConnectionConverter, RecordConverter};
pub use entity::{ConnectionRecord, PRIMARY_RANK, UNRANKED};
pub use error::{is_uniqueness_violation, ConnectError, Result};
pub use indexes::{connection_indexes, ensure_indexes, IndexInitResult};
pub use memory::InMemoryConnectionStore;
pub use mongo::MongoConnectionStore;
pub use registry::{ProviderRegistry, StaticProviderRegistry};
pub use repository::{ConnectionRepository, ConnectionSlots, ConnectionsByProvider};
pub use store::{ConnectionStore, ProviderUsers};
pub use users::{ConnectionSignUp, UsersConnectionRepository};
