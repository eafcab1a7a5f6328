pub(crate) mod arena;
pub mod context;
pub mod domain;
pub mod error;
pub mod finalization;
pub mod gc;
pub mod jobs;
pub mod object_value;
pub mod stack;
pub mod turn;
pub mod value;
pub mod weak_ref;


pub use context::{Context, ContextBuilder};
pub use domain::DomainId;
pub use error::{Exception, WeakRefError};
pub use finalization::{
    Edge, FinalizationRegistry, FinalizationRegistryObject, RegistrationState, RegistryId,
};
pub use object_value::ObjectValue;
pub use stack::RootId;
pub use turn::Turn;
pub use value::{CallResult, NativeFunction, ObjectRef, Value};
pub use weak_ref::{WeakRef, WeakRefObject};
