pub mod category;
pub mod credential;
pub mod item;
pub mod loaders;
pub mod mode;
pub mod outcome;
pub mod record;

pub use category::Category;
pub use credential::Credential;
pub use item::{Item, RawQuestion};
pub use loaders::{load_credentials, load_items};
pub use mode::Mode;
pub use outcome::{ClassifiedRecord, Evaluation, FailedRecord, ItemState, Outcome, Payload};
pub use record::{AnswerArtifact, FailedEntry, ProcessedEntry};
