//! Keeps the client cache and the server collection converging.
//!
//! Every local mutation updates the cache immediately and enqueues one
//! logical remote operation (append / update / delete - never a whole-array
//! push per edit). `flush` drives the queue with bounded retries; mutations
//! that exhaust their retries are kept as "unsynced" and surfaced to the
//! user instead of being silently dropped. On `rehydrate` the server is
//! authoritative and unsynced mutations are replayed against the fresh
//! contents.
//!
//! State machine per pending mutation:
//! `Pending -> InFlight -> { Committed | retryable failure -> InFlight | Unsynced }`

use std::collections::VecDeque;
use std::time::Duration;

use uuid::Uuid;

use opsboard_core::{CollectionKind, FieldMap, Item};

use crate::cache::ClientCache;
use crate::remote::{RemoteCollection, RemoteError, RemoteResult};

#[derive(Debug, Clone)]
pub enum MutationKind {
    Create { fields: FieldMap },
    UpdateFields { fields: FieldMap },
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Pending,
    InFlight,
    Committed,
    Unsynced,
}

#[derive(Debug, Clone)]
pub struct PendingMutation {
    pub item_id: String,
    pub kind: MutationKind,
    pub state: MutationState,
    attempts: u32,
}

impl PendingMutation {
    fn new(item_id: impl Into<String>, kind: MutationKind) -> Self {
        PendingMutation {
            item_id: item_id.into(),
            kind,
            state: MutationState::Pending,
            attempts: 0,
        }
    }

    pub fn describe(&self) -> String {
        let verb = match self.kind {
            MutationKind::Create { .. } => "create",
            MutationKind::UpdateFields { .. } => "edit",
            MutationKind::Delete => "delete",
        };
        format!("{} of {}", verb, self.item_id)
    }
}

/// Bounded exponential backoff for remote calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

#[derive(Debug, Default)]
pub struct FlushReport {
    pub committed: usize,
    pub unsynced: usize,
    /// Provisional id -> server-assigned id, for each committed create.
    pub created: Vec<(String, String)>,
}

enum Outcome {
    Created(Item),
    Updated(Item),
    Removed,
}

pub struct SyncCoordinator<R: RemoteCollection> {
    kind: CollectionKind,
    remote: R,
    cache: ClientCache,
    queue: VecDeque<PendingMutation>,
    unsynced: Vec<PendingMutation>,
    policy: RetryPolicy,
    last_version: u64,
}

impl<R: RemoteCollection> SyncCoordinator<R> {
    pub fn new(kind: CollectionKind, remote: R) -> Self {
        Self::with_policy(kind, remote, RetryPolicy::default())
    }

    pub fn with_policy(kind: CollectionKind, remote: R, policy: RetryPolicy) -> Self {
        SyncCoordinator {
            kind,
            remote,
            cache: ClientCache::new(),
            queue: VecDeque::new(),
            unsynced: Vec::new(),
            policy,
            last_version: 0,
        }
    }

    pub fn cache(&self) -> &ClientCache {
        &self.cache
    }

    /// Mutations that failed all retries and await user attention.
    pub fn unsynced(&self) -> &[PendingMutation] {
        &self.unsynced
    }

    /// Optimistically add an item and enqueue its create.
    ///
    /// Returns the provisional id the cache holds until the server assigns
    /// the real one (rewritten on commit).
    pub fn create(&mut self, mut fields: FieldMap) -> String {
        fields.shift_remove("id");
        self.kind.normalize(&mut fields);

        let provisional = format!("local-{}", Uuid::new_v4());
        self.cache
            .insert(Item::new(provisional.clone(), fields.clone()));
        self.queue.push_back(PendingMutation::new(
            provisional.clone(),
            MutationKind::Create { fields },
        ));
        provisional
    }

    /// Optimistically merge fields into an item and enqueue the edit.
    ///
    /// Successive edits to the same item coalesce into its still-pending
    /// mutation, so a burst of field changes becomes one remote call.
    /// Returns false when the id is not in the cache.
    pub fn update(&mut self, id: &str, mut fields: FieldMap) -> bool {
        fields.shift_remove("id");
        self.kind.normalize(&mut fields);

        if !self.cache.merge_fields(id, &fields) {
            return false;
        }

        let pending = self.queue.iter_mut().find(|m| {
            m.item_id == id
                && m.state == MutationState::Pending
                && !matches!(m.kind, MutationKind::Delete)
        });
        if let Some(mutation) = pending {
            if let MutationKind::Create { fields: merged }
            | MutationKind::UpdateFields { fields: merged } = &mut mutation.kind
            {
                for (key, value) in fields {
                    merged.insert(key, value);
                }
            }
            return true;
        }

        self.queue.push_back(PendingMutation::new(
            id,
            MutationKind::UpdateFields { fields },
        ));
        true
    }

    /// Optimistically remove an item and enqueue its delete.
    ///
    /// A delete of an item whose create has not been sent yet cancels the
    /// create instead of issuing any remote call.
    pub fn delete(&mut self, id: &str) -> bool {
        if !self.cache.remove(id) {
            return false;
        }

        let had_pending_create = self
            .queue
            .iter()
            .any(|m| m.item_id == id && matches!(m.kind, MutationKind::Create { .. }));
        self.queue.retain(|m| m.item_id != id);

        if !had_pending_create {
            self.queue
                .push_back(PendingMutation::new(id, MutationKind::Delete));
        }
        true
    }

    /// Push all queued mutations to the server.
    pub async fn flush(&mut self) -> FlushReport {
        let mut report = FlushReport::default();

        while let Some(mut mutation) = self.queue.pop_front() {
            match self.run_with_retry(&mut mutation).await {
                Ok(Outcome::Created(item)) => {
                    let server_id = item.id.clone();
                    if self.cache.get(&mutation.item_id).is_some() {
                        self.cache.replace_item(&mutation.item_id, item);
                        report.created.push((mutation.item_id.clone(), server_id));
                    } else {
                        // Item was deleted locally while its create was in
                        // flight; undo the create rather than resurrecting it
                        if let Err(err) = self.remote.remove(&server_id).await {
                            log::warn!(
                                "failed to roll back orphaned create {}: {}",
                                server_id,
                                err
                            );
                        }
                    }
                    mutation.state = MutationState::Committed;
                    report.committed += 1;
                }
                Ok(Outcome::Updated(item)) => {
                    let id = item.id.clone();
                    self.cache.replace_item(&id, item);
                    mutation.state = MutationState::Committed;
                    report.committed += 1;
                }
                Ok(Outcome::Removed) => {
                    mutation.state = MutationState::Committed;
                    report.committed += 1;
                }
                Err(err) => {
                    log::error!("{} could not be synced: {}", mutation.describe(), err);
                    mutation.state = MutationState::Unsynced;
                    report.unsynced += 1;
                    self.unsynced.push(mutation);
                }
            }
        }

        report
    }

    /// Reload the collection from the server, which is authoritative, then
    /// re-enqueue unsynced mutations against the fresh contents.
    pub async fn rehydrate(&mut self) -> RemoteResult<()> {
        let (version, items) = self.remote.fetch_all().await?;
        self.last_version = version;
        self.cache = ClientCache::from_items(items);

        let stale = std::mem::take(&mut self.unsynced);
        for mut mutation in stale {
            mutation.state = MutationState::Pending;
            mutation.attempts = 0;
            match mutation.kind.clone() {
                MutationKind::Create { fields } => {
                    // Re-insert the provisional item so the commit path can
                    // resolve it as usual
                    self.cache.insert(Item::new(mutation.item_id.clone(), fields));
                    self.queue.push_back(mutation);
                }
                MutationKind::UpdateFields { fields } => {
                    if self.cache.merge_fields(&mutation.item_id, &fields) {
                        self.queue.push_back(mutation);
                    } else {
                        log::warn!(
                            "dropping unsynced edit of {}: the server no longer has it",
                            mutation.item_id
                        );
                    }
                }
                MutationKind::Delete => {
                    if self.cache.remove(&mutation.item_id) {
                        self.queue.push_back(mutation);
                    }
                }
            }
        }
        Ok(())
    }

    /// Replace the server collection wholesale, reconciling on conflict by
    /// reloading the version token and retrying.
    pub async fn push_replace(&mut self, items: Vec<Item>) -> RemoteResult<u64> {
        const MAX_CONFLICT_RETRIES: u32 = 3;

        // Start from the token seen at the last rehydrate; a stale one just
        // means one reconciliation round below
        let mut version = self.last_version;
        let mut attempt = 0;
        loop {
            match self.remote.replace_all(version, items.clone()).await {
                Ok(new_version) => {
                    self.last_version = new_version;
                    self.rehydrate().await?;
                    return Ok(new_version);
                }
                Err(RemoteError::Conflict) if attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    log::warn!(
                        "replace of '{}' conflicted with a concurrent writer; reloading (attempt {attempt})",
                        self.kind
                    );
                    let (current, _) = self.remote.fetch_all().await?;
                    version = current;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn run_with_retry(&self, mutation: &mut PendingMutation) -> RemoteResult<Outcome> {
        loop {
            mutation.state = MutationState::InFlight;
            mutation.attempts += 1;
            match self.run_once(mutation).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_retryable() && mutation.attempts < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(mutation.attempts);
                    log::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        mutation.describe(),
                        mutation.attempts,
                        self.policy.max_attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn run_once(&self, mutation: &PendingMutation) -> RemoteResult<Outcome> {
        match &mutation.kind {
            MutationKind::Create { fields } => self
                .remote
                .append(fields.clone())
                .await
                .map(Outcome::Created),
            MutationKind::UpdateFields { fields } => self
                .remote
                .update_fields(&mutation.item_id, fields.clone())
                .await
                .map(Outcome::Updated),
            MutationKind::Delete => match self.remote.remove(&mutation.item_id).await {
                Ok(()) => Ok(Outcome::Removed),
                // Already gone on the server; the delete is an idempotent no-op
                Err(RemoteError::NotFound) => Ok(Outcome::Removed),
                Err(err) => Err(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct MockState {
        items: Vec<Item>,
        version: u64,
        fail_remaining: u32,
        reject_remaining: u32,
        conflicts_remaining: u32,
        next_id: u32,
        calls: u32,
    }

    /// In-memory stand-in for the server, with injectable failures.
    #[derive(Clone)]
    struct MockRemote {
        kind: CollectionKind,
        state: Arc<Mutex<MockState>>,
    }

    impl MockRemote {
        fn new() -> Self {
            MockRemote {
                kind: CollectionKind::Tasks,
                state: Arc::new(Mutex::new(MockState {
                    items: Vec::new(),
                    version: 0,
                    fail_remaining: 0,
                    reject_remaining: 0,
                    conflicts_remaining: 0,
                    next_id: 1,
                    calls: 0,
                })),
            }
        }

        fn fail_next(&self, n: u32) {
            self.state.lock().unwrap().fail_remaining = n;
        }

        fn reject_next(&self, n: u32) {
            self.state.lock().unwrap().reject_remaining = n;
        }

        fn conflict_next(&self, n: u32) {
            self.state.lock().unwrap().conflicts_remaining = n;
        }

        fn items(&self) -> Vec<Item> {
            self.state.lock().unwrap().items.clone()
        }

        fn calls(&self) -> u32 {
            self.state.lock().unwrap().calls
        }

        fn wipe(&self) {
            let mut state = self.state.lock().unwrap();
            state.items.clear();
            state.version += 1;
        }

        fn check(state: &mut MockState) -> RemoteResult<()> {
            state.calls += 1;
            if state.fail_remaining > 0 {
                state.fail_remaining -= 1;
                return Err(RemoteError::Server("injected failure".into()));
            }
            if state.reject_remaining > 0 {
                state.reject_remaining -= 1;
                return Err(RemoteError::Rejected("400 Bad Request".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteCollection for MockRemote {
        async fn fetch_all(&self) -> RemoteResult<(u64, Vec<Item>)> {
            let mut state = self.state.lock().unwrap();
            Self::check(&mut state)?;
            Ok((state.version, state.items.clone()))
        }

        async fn append(&self, mut fields: FieldMap) -> RemoteResult<Item> {
            let mut state = self.state.lock().unwrap();
            Self::check(&mut state)?;
            self.kind.normalize(&mut fields);
            let item = Item::new(format!("srv-{}", state.next_id), fields);
            state.next_id += 1;
            state.items.push(item.clone());
            state.version += 1;
            Ok(item)
        }

        async fn update_fields(&self, id: &str, fields: FieldMap) -> RemoteResult<Item> {
            let mut state = self.state.lock().unwrap();
            Self::check(&mut state)?;
            let kind = self.kind;
            let item = state
                .items
                .iter_mut()
                .find(|item| item.id == id)
                .ok_or(RemoteError::NotFound)?;
            for (key, value) in fields {
                item.fields.insert(key, value);
            }
            kind.normalize(&mut item.fields);
            let updated = item.clone();
            state.version += 1;
            Ok(updated)
        }

        async fn remove(&self, id: &str) -> RemoteResult<()> {
            let mut state = self.state.lock().unwrap();
            Self::check(&mut state)?;
            let before = state.items.len();
            state.items.retain(|item| item.id != id);
            if state.items.len() == before {
                return Err(RemoteError::NotFound);
            }
            state.version += 1;
            Ok(())
        }

        async fn replace_all(&self, version: u64, items: Vec<Item>) -> RemoteResult<u64> {
            let mut state = self.state.lock().unwrap();
            Self::check(&mut state)?;
            if state.conflicts_remaining > 0 {
                state.conflicts_remaining -= 1;
                return Err(RemoteError::Conflict);
            }
            if version != state.version {
                return Err(RemoteError::Conflict);
            }
            state.items = items;
            state.version += 1;
            Ok(state.version)
        }
    }

    fn coordinator(remote: MockRemote) -> SyncCoordinator<MockRemote> {
        SyncCoordinator::with_policy(
            CollectionKind::Tasks,
            remote,
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
            },
        )
    }

    fn fields(pairs: &[(&str, serde_json::Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn create_applies_optimistically_and_commits_on_flush() {
        let remote = MockRemote::new();
        let mut coordinator = coordinator(remote.clone());

        let provisional = coordinator.create(fields(&[
            ("description", json!("write report")),
            ("percentage", json!(120)),
        ]));

        // Visible immediately, clamped, under a provisional id
        assert!(provisional.starts_with("local-"));
        let cached = coordinator.cache().get(&provisional).unwrap();
        assert_eq!(cached.fields.get("percentage"), Some(&json!(100)));

        let report = coordinator.flush().await;
        assert_eq!(report.committed, 1);
        assert_eq!(report.created, vec![(provisional, "srv-1".to_string())]);

        // Provisional id rewritten to the server-assigned one, in place
        assert_eq!(coordinator.cache().items()[0].id, "srv-1");
        assert_eq!(remote.items().len(), 1);
    }

    #[tokio::test]
    async fn successive_edits_coalesce_into_one_remote_call() {
        let remote = MockRemote::new();
        let mut coordinator = coordinator(remote.clone());

        let id = coordinator.create(fields(&[("description", json!("draft"))]));
        assert!(coordinator.update(&id, fields(&[("pic", json!("Sam"))])));
        assert!(coordinator.update(&id, fields(&[("percentage", json!(25))])));

        let report = coordinator.flush().await;
        assert_eq!(report.committed, 1);
        assert_eq!(remote.calls(), 1);

        let stored = &remote.items()[0];
        assert_eq!(stored.field_str("pic"), "Sam");
        assert_eq!(stored.fields.get("percentage"), Some(&json!(25)));
    }

    #[tokio::test]
    async fn edit_after_commit_issues_an_update() {
        let remote = MockRemote::new();
        let mut coordinator = coordinator(remote.clone());

        coordinator.create(fields(&[("description", json!("x"))]));
        coordinator.flush().await;

        assert!(coordinator.update("srv-1", fields(&[("percentage", json!(-5))])));
        let report = coordinator.flush().await;
        assert_eq!(report.committed, 1);
        assert_eq!(remote.items()[0].fields.get("percentage"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_refused() {
        let remote = MockRemote::new();
        let mut coordinator = coordinator(remote);
        assert!(!coordinator.update("nope", fields(&[("pic", json!("x"))])));
    }

    #[tokio::test]
    async fn deleting_an_unsent_create_cancels_it_without_remote_calls() {
        let remote = MockRemote::new();
        let mut coordinator = coordinator(remote.clone());

        let id = coordinator.create(fields(&[("description", json!("oops"))]));
        assert!(coordinator.delete(&id));

        let report = coordinator.flush().await;
        assert_eq!(report.committed, 0);
        assert_eq!(remote.calls(), 0);
        assert!(remote.items().is_empty());
        assert!(coordinator.cache().items().is_empty());
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_commit() {
        let remote = MockRemote::new();
        remote.fail_next(2);
        let mut coordinator = coordinator(remote.clone());

        coordinator.create(fields(&[("description", json!("flaky"))]));
        let report = coordinator.flush().await;

        assert_eq!(report.committed, 1);
        assert_eq!(report.unsynced, 0);
        assert_eq!(remote.calls(), 3);
        assert_eq!(remote.items().len(), 1);
    }

    #[tokio::test]
    async fn terminal_rejections_go_unsynced_without_retries() {
        let remote = MockRemote::new();
        remote.reject_next(1);
        let mut coordinator = coordinator(remote.clone());

        coordinator.create(fields(&[("description", json!("bad"))]));
        let report = coordinator.flush().await;

        assert_eq!(report.committed, 0);
        assert_eq!(report.unsynced, 1);
        // One attempt only; a rejected request cannot succeed on resend
        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test]
    async fn retry_exhaustion_marks_the_mutation_unsynced() {
        let remote = MockRemote::new();
        remote.fail_next(10);
        let mut coordinator = coordinator(remote.clone());

        let id = coordinator.create(fields(&[("description", json!("stuck"))]));
        let report = coordinator.flush().await;

        assert_eq!(report.committed, 0);
        assert_eq!(report.unsynced, 1);
        assert_eq!(coordinator.unsynced().len(), 1);
        assert_eq!(coordinator.unsynced()[0].state, MutationState::Unsynced);

        // The optimistic item stays visible, awaiting user attention
        assert!(coordinator.cache().get(&id).is_some());
        assert!(remote.items().is_empty());
    }

    #[tokio::test]
    async fn rehydrate_replays_unsynced_creates_against_fresh_state() {
        let remote = MockRemote::new();
        remote.fail_next(10);
        let mut coordinator = coordinator(remote.clone());

        coordinator.create(fields(&[("description", json!("late"))]));
        coordinator.flush().await;
        assert_eq!(coordinator.unsynced().len(), 1);

        remote.fail_next(0);
        coordinator.rehydrate().await.unwrap();
        let report = coordinator.flush().await;

        assert_eq!(report.committed, 1);
        assert!(coordinator.unsynced().is_empty());
        assert_eq!(remote.items().len(), 1);
        assert_eq!(coordinator.cache().items()[0].id, "srv-1");
    }

    #[tokio::test]
    async fn rehydrate_drops_edits_of_items_the_server_lost() {
        let remote = MockRemote::new();
        let mut coordinator = coordinator(remote.clone());

        coordinator.create(fields(&[("description", json!("x"))]));
        coordinator.flush().await;

        remote.fail_next(10);
        coordinator.update("srv-1", fields(&[("pic", json!("Sam"))]));
        coordinator.flush().await;
        assert_eq!(coordinator.unsynced().len(), 1);

        // Another client removed the item in the meantime
        remote.fail_next(0);
        remote.wipe();

        coordinator.rehydrate().await.unwrap();
        let report = coordinator.flush().await;

        assert_eq!(report.committed, 0);
        assert_eq!(report.unsynced, 0);
        assert!(coordinator.unsynced().is_empty());
        assert!(coordinator.cache().items().is_empty());
    }

    #[tokio::test]
    async fn deleting_an_item_already_gone_on_the_server_commits() {
        let remote = MockRemote::new();
        let mut coordinator = coordinator(remote.clone());

        coordinator.create(fields(&[("description", json!("x"))]));
        coordinator.flush().await;
        coordinator.rehydrate().await.unwrap();

        remote.wipe();

        assert!(coordinator.delete("srv-1"));
        let report = coordinator.flush().await;
        assert_eq!(report.committed, 1);
        assert_eq!(report.unsynced, 0);
    }

    #[tokio::test]
    async fn push_replace_reuses_the_last_seen_version_token() {
        let remote = MockRemote::new();
        let mut coordinator = coordinator(remote.clone());

        coordinator.rehydrate().await.unwrap();
        coordinator
            .push_replace(vec![Item::new("a", fields(&[("description", json!("x"))]))])
            .await
            .unwrap();

        // rehydrate, replace, and the reload after it; no extra fetch just
        // to learn the token
        assert_eq!(remote.calls(), 3);
        assert_eq!(remote.items().len(), 1);
    }

    #[tokio::test]
    async fn push_replace_reconciles_a_version_conflict() {
        let remote = MockRemote::new();
        remote.conflict_next(1);
        let mut coordinator = coordinator(remote.clone());

        let items = vec![Item::new("a", fields(&[("description", json!("kept"))]))];
        coordinator.push_replace(items).await.unwrap();

        assert_eq!(remote.items().len(), 1);
        assert_eq!(coordinator.cache().items().len(), 1);
        assert_eq!(coordinator.cache().items()[0].field_str("description"), "kept");
    }
}
