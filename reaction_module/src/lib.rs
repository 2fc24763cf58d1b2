pub mod channel;
pub mod config;
pub mod dedup;
pub mod event;
pub mod gateway;
pub mod maintenance;
pub mod message;
pub mod pipeline;
pub mod placement;
pub mod record;
pub mod sheet_store;
pub mod slack_api;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_support;

pub use channel::{ChannelClassifier, ChannelKind};
pub use config::{ConfigError, RecorderConfig};
pub use dedup::{DedupCache, ProcessedEvents};
pub use event::{EventId, ReactionEvent};
pub use message::{MessageResolver, ResolvedMessage};
pub use pipeline::{PipelineError, ReactionOutcome, ReactionPipeline};
pub use placement::RowPosition;
pub use record::{Column, RecordDefaults, SheetRecord};
pub use sheet_store::{GoogleSheetStore, SheetHandle, SheetStore};
pub use slack_api::SlackWebClient;
