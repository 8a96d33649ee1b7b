//! Per-character fetch pipeline
//!
//! fetch items and passives -> validate -> render -> change detection ->
//! optional publish. Every stage failure ends the pipeline for that
//! character only.

use crate::poe::{ApiError, Endpoint, ItemsResponse, PassiveSkillsResponse};
use crate::publish::{PublishError, Publisher};
use crate::renderer::{RenderError, Renderer};
use crate::scheduler::FetchScheduler;
use crate::snapshot::{record_if_changed, SnapshotOutcome};
use crate::storage::{SnapshotRecord, Storage, StorageError, TrackedCharacter};
use chrono::Utc;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors that end the pipeline of one character
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Lookup failed: {0}")]
    Lookup(#[source] StorageError),

    #[error("Fetching {resource} failed: {source}")]
    Api {
        resource: &'static str,
        #[source]
        source: ApiError,
    },

    #[error("Malformed {resource} document: {source}")]
    Decode {
        resource: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Persistence failed: {0}")]
    Persistence(#[source] StorageError),

    #[error("Publish failed for snapshot {snapshot_id}: {source}")]
    Publish {
        snapshot_id: i64,
        #[source]
        source: PublishError,
    },
}

/// What happened to one tracked character during a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacterOutcome {
    /// A new snapshot was stored, with its public link when published
    Persisted {
        snapshot: SnapshotRecord,
        link: Option<String>,
    },

    /// The rendered export matched the latest snapshot
    NoChangeDetected,

    /// The character is dead; its tracking row is now skipped
    SkippedDead,
}

fn decode<T: DeserializeOwned>(endpoint: Endpoint, body: &[u8]) -> Result<T, PipelineError> {
    serde_json::from_slice(body).map_err(|source| PipelineError::Decode {
        resource: endpoint.resource(),
        source,
    })
}

fn api_error(endpoint: Endpoint) -> impl FnOnce(ApiError) -> PipelineError {
    move |source| {
        if let Some(retry_after) = source.retry_after() {
            tracing::warn!(
                "Rate limited on {}, server asks to wait {}s",
                endpoint,
                retry_after.as_secs()
            );
        }
        PipelineError::Api {
            resource: endpoint.resource(),
            source,
        }
    }
}

impl<S, R, P> FetchScheduler<S, R, P>
where
    S: Storage + Send + 'static,
    R: Renderer + 'static,
    P: Publisher + 'static,
{
    /// Runs the full pipeline for one tracked character
    ///
    /// The caller's span is expected to carry `account` and `character`
    /// fields; they are filled in here once the names are known.
    pub(crate) async fn process_character(
        &self,
        tracked: &TrackedCharacter,
    ) -> Result<CharacterOutcome, PipelineError> {
        let (character, account) = {
            let storage = self.lock_storage();
            let character = storage
                .get_character(tracked.character_id)
                .map_err(PipelineError::Lookup)?;
            let account = storage
                .get_account(character.account_id)
                .map_err(PipelineError::Lookup)?;
            (character, account)
        };

        let span = tracing::Span::current();
        span.record("account", account.account_name.as_str());
        span.record("character", character.character_name.as_str());

        if character.died {
            tracing::info!("Character is dead, disabling further fetches");
            self.lock_storage()
                .mark_should_skip(tracked.id, true)
                .map_err(PipelineError::Persistence)?;
            return Ok(CharacterOutcome::SkippedDead);
        }

        let items = self
            .client
            .get_items(&account.account_name, &character.character_name, &self.realm)
            .await
            .map_err(api_error(Endpoint::Items))?;
        let passives = self
            .client
            .get_passive_skills(&account.account_name, &character.character_name, &self.realm)
            .await
            .map_err(api_error(Endpoint::PassiveSkills))?;

        let parsed_items: ItemsResponse = decode(Endpoint::Items, &items)?;
        let parsed_passives: PassiveSkillsResponse = decode(Endpoint::PassiveSkills, &passives)?;
        tracing::debug!(
            "Fetched {} items and {} allocated passives",
            parsed_items.items.len(),
            parsed_passives.allocated()
        );

        let export = self
            .renderer
            .render(character.id, &items, &passives)
            .await?;

        let outcome = {
            let mut storage = self.lock_storage();
            let outcome = record_if_changed(&mut *storage, character.id, &export)
                .map_err(PipelineError::Persistence)?;
            storage
                .record_fetch(tracked.id, Utc::now())
                .map_err(PipelineError::Persistence)?;
            outcome
        };

        let snapshot = match outcome {
            SnapshotOutcome::Unchanged => return Ok(CharacterOutcome::NoChangeDetected),
            SnapshotOutcome::Created(snapshot) => snapshot,
        };

        let Some((publisher, site)) = &self.publisher else {
            return Ok(CharacterOutcome::Persisted {
                snapshot,
                link: None,
            });
        };

        let link = publisher
            .publish(&snapshot.export_string, site)
            .await
            .map_err(|source| PipelineError::Publish {
                snapshot_id: snapshot.id,
                source,
            })?;

        tracing::info!("Published snapshot {} to {}", snapshot.id, link);
        self.lock_storage()
            .record_snapshot_link(snapshot.id, site.label, &link)
            .map_err(PipelineError::Persistence)?;

        Ok(CharacterOutcome::Persisted {
            snapshot,
            link: Some(link),
        })
    }
}
