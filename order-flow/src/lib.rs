pub mod catalog;
pub mod draft;
pub mod error;
pub mod event;
pub mod flow;
pub mod notify;
pub mod order;
pub mod render;
pub mod runner;
pub mod store;

// Re-export commonly used types
pub use catalog::{AttributeKind, AttributeOption, AttributeSet, Catalog, Family, FamilyId, Product};
pub use draft::{FlowState, OrderDraft, UserProfile};
pub use error::{FlowError, Result};
pub use event::{Event, Selection};
pub use flow::{FlowEngine, StepAction, StepResult};
pub use notify::{LoggingNotificationSink, NotificationSink};
pub use order::{OrderDetails, OrderRecord};
pub use render::{Choice, ImageRef, PresentationAdapter, RenderDirective};
pub use runner::DialogueRunner;
pub use store::{InMemorySessionStore, SessionHandle, SessionStore};
