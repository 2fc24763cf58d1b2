//! Per-event orchestration: dedup, filter, resolve, place, write, mark.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info};

use crate::channel::{ChannelClassifier, ChannelKind, ChannelLookupError};
use crate::dedup::ProcessedEvents;
use crate::event::{EventId, ReactionEvent};
use crate::message::{MessageResolutionError, MessageResolver, ResolvedMessage};
use crate::placement::{ensure_capacity, locate_insertion_row, RowPosition};
use crate::record::{
    content_cell, format_message_date, origin_link, InvalidTimestamp, RecordDefaults, SheetRecord,
};
use crate::sheet_store::{SheetHandle, SheetReadError, SheetStore, SheetWriteError};
use crate::writer::write_row;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    ChannelLookup(#[from] ChannelLookupError),
    #[error(transparent)]
    MessageResolution(#[from] MessageResolutionError),
    #[error(transparent)]
    SheetRead(#[from] SheetReadError),
    #[error(transparent)]
    SheetWrite(#[from] SheetWriteError),
    #[error(transparent)]
    InvalidTimestamp(#[from] InvalidTimestamp),
}

/// Which exit a pipeline run took.
#[derive(Debug)]
pub enum ReactionOutcome {
    Duplicate,
    ReactionIgnored,
    ChannelFiltered(ChannelKind),
    Recorded { row: RowPosition },
    /// Logged and swallowed; the event stays unmarked so a redelivery can retry.
    Failed(PipelineError),
}

impl ReactionOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, ReactionOutcome::Recorded { .. })
    }
}

impl fmt::Display for ReactionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReactionOutcome::Duplicate => f.write_str("duplicate"),
            ReactionOutcome::ReactionIgnored => f.write_str("reaction_ignored"),
            ReactionOutcome::ChannelFiltered(kind) => write!(f, "channel_filtered({})", kind),
            ReactionOutcome::Recorded { row } => write!(f, "recorded(row {})", row),
            ReactionOutcome::Failed(err) => write!(f, "failed({})", err),
        }
    }
}

pub struct ReactionPipeline {
    target_reaction: String,
    defaults: RecordDefaults,
    processed: Arc<dyn ProcessedEvents>,
    classifier: Arc<dyn ChannelClassifier>,
    resolver: Arc<dyn MessageResolver>,
    store: Arc<dyn SheetStore>,
    /// Serializes placement and write so two runs never pick the same row.
    placement_lock: Mutex<()>,
}

impl ReactionPipeline {
    pub fn new(
        target_reaction: impl Into<String>,
        defaults: RecordDefaults,
        processed: Arc<dyn ProcessedEvents>,
        classifier: Arc<dyn ChannelClassifier>,
        resolver: Arc<dyn MessageResolver>,
        store: Arc<dyn SheetStore>,
    ) -> Self {
        Self {
            target_reaction: target_reaction.into(),
            defaults,
            processed,
            classifier,
            resolver,
            store,
            placement_lock: Mutex::new(()),
        }
    }

    pub fn target_reaction(&self) -> &str {
        &self.target_reaction
    }

    /// Run one event to completion. Never panics on remote failures.
    pub fn handle(&self, event: &ReactionEvent) -> ReactionOutcome {
        let event_id = event.event_id();
        if self.processed.is_processed(&event_id) {
            debug!("skipping already recorded {}", event_id);
            return ReactionOutcome::Duplicate;
        }
        if event.reaction != self.target_reaction {
            debug!("ignoring :{}: on {}", event.reaction, event_id);
            return ReactionOutcome::ReactionIgnored;
        }

        match self.record(event, &event_id) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    "failed to record {} (reaction by {}): {}",
                    event_id, event.user, err
                );
                ReactionOutcome::Failed(err)
            }
        }
    }

    fn record(
        &self,
        event: &ReactionEvent,
        event_id: &EventId,
    ) -> Result<ReactionOutcome, PipelineError> {
        let kind = self.classifier.classify(&event.channel_id)?;
        if !kind.is_recordable() {
            info!("not recording {} from {} channel", event_id, kind);
            return Ok(ReactionOutcome::ChannelFiltered(kind));
        }

        let message = self.resolver.resolve(&event.channel_id, &event.message_ts)?;
        let record = self.build_record(event, &message)?;

        let _guard = self
            .placement_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // An overlapping delivery of the same event may have finished while we waited.
        if self.processed.is_processed(event_id) {
            debug!("{} recorded by a concurrent run", event_id);
            return Ok(ReactionOutcome::Duplicate);
        }

        let (sheet, row) = append_record(self.store.as_ref(), &record)?;
        self.processed.mark_processed(event_id);

        info!(
            "recorded {} by {} into '{}' row {}",
            event_id, message.author_name, sheet.title, row
        );
        Ok(ReactionOutcome::Recorded { row })
    }

    fn build_record(
        &self,
        event: &ReactionEvent,
        message: &ResolvedMessage,
    ) -> Result<SheetRecord, PipelineError> {
        let assignee1 = if self.defaults.assign_reactor {
            Some(self.resolver.display_name(&event.user)?)
        } else {
            self.defaults.default_assignee.clone()
        };

        Ok(SheetRecord {
            system: non_empty(&self.defaults.system_tag),
            date: Some(format_message_date(&message.ts, self.defaults.utc_offset)?),
            origin: Some(origin_link(&message.permalink)),
            assignee1,
            content: Some(content_cell(&message.author_name, &message.text)),
            completed: non_empty(&self.defaults.completed),
            ..Default::default()
        })
    }
}

/// Place `record` after the last dated row, growing the grid if needed, and
/// write it. Callers that can race must hold a lock around this.
pub fn append_record(
    store: &dyn SheetStore,
    record: &SheetRecord,
) -> Result<(SheetHandle, RowPosition), PipelineError> {
    let mut sheet = store.open_sheet()?;
    let row = locate_insertion_row(store, &sheet)?;
    ensure_capacity(store, &mut sheet, row)?;
    write_row(store, &sheet, row, record)?;
    Ok((sheet, row))
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
