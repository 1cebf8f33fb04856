//! Session task
//!
//! Processes commands one at a time and fires the two scheduled delays. All
//! tree mutation happens inside this task, so no command ever observes a
//! half-applied reconcile.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use super::types::{
    GestureKind, SectionSnapshot, SessionCommand, SessionNotice, StoreOperation,
};
use crate::anchor::TextRange;
use crate::config::SessionConfig;
use crate::removal::{remove_at, RemovalError, RemovalOutcome};
use crate::section::Section;
use crate::selection::{CommitOutcome, HighlightPreferences, SelectionController, SelectionState};
use crate::store::AnnotationStore;
use crate::tree::{DocumentTree, NodeId};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Error)]
#[error("Highlight session has shut down")]
pub struct SessionClosed;

// ============================================================================
// Handle
// ============================================================================

/// Cheap-to-clone sender side of a session
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub async fn send(&self, command: SessionCommand) -> Result<(), SessionClosed> {
        self.tx.send(command).await.map_err(|_| SessionClosed)
    }

    pub async fn mount(&self, section_id: impl Into<String>, tree: DocumentTree) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Mount {
            section_id: section_id.into(),
            tree,
        })
        .await
    }

    pub async fn unmount(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Unmount).await
    }

    pub async fn selection_changed(&self, selection: Option<TextRange>) -> Result<(), SessionClosed> {
        self.send(SessionCommand::SelectionChanged(selection)).await
    }

    pub async fn gesture_start(&self, kind: GestureKind) -> Result<(), SessionClosed> {
        self.send(SessionCommand::GestureStart(kind)).await
    }

    pub async fn gesture_end(&self, kind: GestureKind) -> Result<(), SessionClosed> {
        self.send(SessionCommand::GestureEnd(kind)).await
    }

    pub async fn activate(&self, node: NodeId) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Activate { node }).await
    }

    pub async fn refresh(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Refresh).await
    }

    /// Copy of the mounted section, `None` when nothing is mounted
    pub async fn snapshot(&self) -> Result<Option<SectionSnapshot>, SessionClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| SessionClosed)
    }

    pub async fn shutdown(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Shutdown).await
    }
}

/// Start a session task
pub fn spawn(
    config: SessionConfig,
    store: Arc<dyn AnnotationStore>,
    preferences: watch::Receiver<HighlightPreferences>,
) -> (
    SessionHandle,
    mpsc::UnboundedReceiver<SessionNotice>,
    JoinHandle<()>,
) {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();

    let driver = Driver {
        config,
        store,
        controller: SelectionController::new(preferences),
        section: None,
        selection: None,
        pending: PendingWork::default(),
        notices: notice_tx,
    };
    let task = tokio::spawn(driver.run(rx));

    (SessionHandle { tx }, notice_rx, task)
}

// ============================================================================
// Driver
// ============================================================================

/// Scheduled work for the mounted section
#[derive(Debug, Default)]
struct PendingWork {
    reconcile_at: Option<Instant>,
    commit_at: Option<Instant>,
}

impl PendingWork {
    fn next_deadline(&self) -> Option<Instant> {
        match (self.reconcile_at, self.commit_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn clear(&mut self) {
        *self = PendingWork::default();
    }
}

struct Driver {
    config: SessionConfig,
    store: Arc<dyn AnnotationStore>,
    controller: SelectionController,
    section: Option<Section>,
    selection: Option<TextRange>,
    pending: PendingWork,
    notices: mpsc::UnboundedSender<SessionNotice>,
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl Driver {
    async fn run(mut self, mut rx: mpsc::Receiver<SessionCommand>) {
        tracing::debug!("Highlight session started");
        loop {
            let deadline = self.pending.next_deadline();
            tokio::select! {
                command = rx.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle(command).await,
                },
                _ = sleep_until_deadline(deadline) => self.fire_due().await,
            }
        }
        tracing::debug!("Highlight session stopped");
    }

    async fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Mount { section_id, tree } => self.mount(section_id, tree),
            SessionCommand::Unmount => self.unmount(),
            SessionCommand::SelectionChanged(selection) => self.selection = selection,
            SessionCommand::GestureStart(_) => {
                if self.section.is_some() {
                    self.controller.begin();
                }
            }
            SessionCommand::GestureEnd(GestureKind::Pointer) => {
                self.pending.commit_at = None;
                self.commit().await;
            }
            SessionCommand::GestureEnd(GestureKind::Touch) => {
                if self.controller.state() == SelectionState::Selecting {
                    self.pending.commit_at = Some(Instant::now() + self.config.touch_settle_delay);
                }
            }
            SessionCommand::Activate { node } => self.remove(node).await,
            SessionCommand::Refresh => {
                self.pending.reconcile_at = None;
                self.reconcile().await;
            }
            SessionCommand::Snapshot { reply } => {
                let snapshot = self.section.as_ref().map(|section| SectionSnapshot {
                    section_id: section.id().to_string(),
                    tree: section.tree().clone(),
                    applied: section.applied().ids(),
                });
                let _ = reply.send(snapshot);
            }
            SessionCommand::Shutdown => {}
        }
    }

    async fn fire_due(&mut self) {
        let now = Instant::now();
        if self.pending.reconcile_at.is_some_and(|at| at <= now) {
            self.pending.reconcile_at = None;
            self.reconcile().await;
        }
        if self.pending.commit_at.is_some_and(|at| at <= now) {
            self.pending.commit_at = None;
            self.commit().await;
        }
    }

    fn mount(&mut self, section_id: String, tree: DocumentTree) {
        if let Some(previous) = &self.section {
            tracing::debug!(
                section_id = %previous.id(),
                arena_nodes = previous.tree().arena_len(),
                "Dropping section state"
            );
        }
        self.pending.clear();
        self.controller.reset();
        self.selection = None;

        tracing::info!(section_id = %section_id, "Section mounted");
        self.section = Some(
            Section::new(section_id, tree).with_stale_after(self.config.max_unresolved_attempts),
        );
        self.pending.reconcile_at = Some(Instant::now() + self.config.mount_delay);
    }

    fn unmount(&mut self) {
        if let Some(section) = self.section.take() {
            tracing::info!(
                section_id = %section.id(),
                arena_nodes = section.tree().arena_len(),
                "Section unmounted"
            );
        }
        self.pending.clear();
        self.controller.reset();
        self.selection = None;
    }

    async fn reconcile(&mut self) {
        let store = Arc::clone(&self.store);
        let Some(section) = self.section.as_mut() else {
            return;
        };

        match store.highlights_for_section(section.id()).await {
            Ok(highlights) => {
                let report = section.reconcile(&highlights);
                if !report.stale.is_empty() {
                    tracing::info!(section_id = %section.id(), stale = ?report.stale, "Highlights no longer resolve");
                }
                let section_id = section.id().to_string();
                self.notify(SessionNotice::Reconciled { section_id, report });
            }
            Err(e) => {
                tracing::warn!(section_id = %section.id(), error = %e, "Failed to load highlights");
                self.notify(SessionNotice::StoreFailed {
                    operation: StoreOperation::Load,
                    message: e.to_string(),
                });
            }
        }
    }

    async fn commit(&mut self) {
        if self.controller.state() != SelectionState::Selecting {
            return;
        }
        let store = Arc::clone(&self.store);
        let Some(section) = self.section.as_mut() else {
            self.controller.reset();
            return;
        };

        let result = self
            .controller
            .commit(section, &mut self.selection, store.as_ref())
            .await;
        let section_id = section.id().to_string();

        match result {
            Ok(CommitOutcome::Rejected(rejection)) => {
                self.notify(SessionNotice::SelectionRejected(rejection));
            }
            Ok(CommitOutcome::Committed { highlight, report }) => {
                self.notify(SessionNotice::HighlightCreated(highlight));
                self.notify(SessionNotice::ClearSelection);
                self.notify(SessionNotice::Reconciled { section_id, report });
            }
            Err(e) => {
                tracing::warn!(section_id = %section_id, error = %e, "Failed to store highlight");
                self.notify(SessionNotice::StoreFailed {
                    operation: StoreOperation::Create,
                    message: e.to_string(),
                });
            }
        }
    }

    async fn remove(&mut self, node: NodeId) {
        let store = Arc::clone(&self.store);
        let Some(section) = self.section.as_mut() else {
            return;
        };

        match remove_at(section, node, store.as_ref()).await {
            Ok(RemovalOutcome::NotDecoration) => {}
            Ok(RemovalOutcome::Removed { highlight_id, released, .. }) => {
                self.notify(SessionNotice::HighlightRemoved { id: highlight_id });
                if !released.is_empty() {
                    self.reconcile().await;
                }
            }
            Err(RemovalError::Store(e)) => {
                tracing::warn!(error = %e, "Failed to delete highlight");
                self.notify(SessionNotice::StoreFailed {
                    operation: StoreOperation::Delete,
                    message: e.to_string(),
                });
            }
            Err(RemovalError::Tree(e)) => {
                // Deleted in the store; let reconcile clean up the tree
                tracing::warn!(error = %e, "Failed to unwrap removed highlight");
                self.reconcile().await;
            }
        }
    }

    fn notify(&self, notice: SessionNotice) {
        if self.notices.send(notice).is_err() {
            tracing::trace!("Notice receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::anchor::{Anchor, Position, Span};
    use crate::highlights::{Highlight, HighlightColor, HighlightDraft};
    use crate::store::testing::FailingStore;
    use crate::store::MemoryStore;

    /// Section tree and its two text leaves
    fn tree() -> (DocumentTree, Vec<NodeId>) {
        let mut tree = DocumentTree::new("section");
        let root = tree.root();
        let mut leaves = Vec::new();
        for text in ["Cells contain mitochondria.", "Glucose metabolism is fast."] {
            let p = tree.append_element(root, "p").unwrap();
            leaves.push(tree.append_text(p, text).unwrap());
        }
        (tree, leaves)
    }

    fn stored(section: &str) -> Highlight {
        HighlightDraft {
            section_id: section.to_string(),
            text: "Cells".to_string(),
            color: HighlightColor::Yellow,
            span: Span::new(Anchor::new(vec![0, 0], 0), Anchor::new(vec![0, 0], 5)),
        }
        .into_highlight()
    }

    fn start(
        store: Arc<dyn AnnotationStore>,
        enabled: bool,
    ) -> (
        SessionHandle,
        mpsc::UnboundedReceiver<SessionNotice>,
        watch::Sender<HighlightPreferences>,
    ) {
        let (prefs_tx, prefs_rx) = watch::channel(HighlightPreferences {
            enabled,
            color: HighlightColor::Green,
        });
        let (handle, notices, _task) = spawn(SessionConfig::default(), store, prefs_rx);
        (handle, notices, prefs_tx)
    }

    async fn no_notice_within(notices: &mut mpsc::UnboundedReceiver<SessionNotice>, wait: Duration) {
        let next = tokio::time::timeout(wait, notices.recv()).await;
        assert!(next.is_err(), "unexpected notice: {:?}", next);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_waits_for_mount_delay() {
        let highlight = stored("chapter-1");
        let store = MemoryStore::with_highlights(vec![highlight.clone()]);
        let (handle, mut notices, _prefs) = start(Arc::new(store), true);
        let (tree, _) = tree();

        let mounted_at = Instant::now();
        handle.mount("chapter-1", tree).await.unwrap();
        no_notice_within(&mut notices, Duration::from_millis(50)).await;

        let notice = notices.recv().await.unwrap();
        assert!(mounted_at.elapsed() >= Duration::from_millis(100));
        let SessionNotice::Reconciled { section_id, report } = notice else {
            panic!("expected reconcile, got {:?}", notice);
        };
        assert_eq!(section_id, "chapter-1");
        assert_eq!(report.applied, vec![highlight.id.clone()]);

        let snapshot = handle.snapshot().await.unwrap().unwrap();
        assert_eq!(snapshot.applied, vec![highlight.id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remount_cancels_pending_reconcile() {
        let store = MemoryStore::with_highlights(vec![stored("chapter-1"), stored("chapter-2")]);
        let (handle, mut notices, _prefs) = start(Arc::new(store), true);

        handle.mount("chapter-1", tree().0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.mount("chapter-2", tree().0).await.unwrap();

        let Some(SessionNotice::Reconciled { section_id, .. }) = notices.recv().await else {
            panic!("expected reconcile");
        };
        assert_eq!(section_id, "chapter-2");
        no_notice_within(&mut notices, Duration::from_millis(500)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_drops_pending_work() {
        let (handle, mut notices, _prefs) = start(Arc::new(MemoryStore::new()), true);

        handle.mount("chapter-1", tree().0).await.unwrap();
        handle.unmount().await.unwrap();

        no_notice_within(&mut notices, Duration::from_millis(500)).await;
        assert!(handle.snapshot().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pointer_commit() {
        let store = MemoryStore::new();
        let (handle, mut notices, _prefs) = start(Arc::new(store.clone()), true);
        let (tree, leaves) = tree();
        handle.mount("chapter-1", tree).await.unwrap();
        assert!(matches!(notices.recv().await, Some(SessionNotice::Reconciled { .. })));

        handle.gesture_start(GestureKind::Pointer).await.unwrap();
        handle
            .selection_changed(Some(TextRange::new(
                Position::new(leaves[0], 14),
                Position::new(leaves[0], 26),
            )))
            .await
            .unwrap();
        handle.gesture_end(GestureKind::Pointer).await.unwrap();

        let Some(SessionNotice::HighlightCreated(highlight)) = notices.recv().await else {
            panic!("expected a created highlight");
        };
        assert_eq!(highlight.text, "mitochondria");
        assert_eq!(highlight.color, HighlightColor::Green);
        assert_eq!(notices.recv().await, Some(SessionNotice::ClearSelection));
        let Some(SessionNotice::Reconciled { report, .. }) = notices.recv().await else {
            panic!("expected reconcile");
        };
        assert_eq!(report.applied, vec![highlight.id.clone()]);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gesture_end_without_mode_is_ignored() {
        let store = MemoryStore::new();
        let (handle, mut notices, _prefs) = start(Arc::new(store.clone()), false);
        let (tree, leaves) = tree();
        handle.mount("chapter-1", tree).await.unwrap();
        notices.recv().await.unwrap();

        handle.gesture_start(GestureKind::Pointer).await.unwrap();
        handle
            .selection_changed(Some(TextRange::new(
                Position::new(leaves[0], 0),
                Position::new(leaves[0], 5),
            )))
            .await
            .unwrap();
        handle.gesture_end(GestureKind::Pointer).await.unwrap();

        no_notice_within(&mut notices, Duration::from_millis(200)).await;
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_end_is_debounced() {
        let store = MemoryStore::new();
        let (handle, mut notices, _prefs) = start(Arc::new(store.clone()), true);
        let (tree, leaves) = tree();
        handle.mount("chapter-1", tree).await.unwrap();
        notices.recv().await.unwrap();

        handle.gesture_start(GestureKind::Touch).await.unwrap();
        handle
            .selection_changed(Some(TextRange::new(
                Position::new(leaves[0], 0),
                Position::new(leaves[0], 5),
            )))
            .await
            .unwrap();
        handle.gesture_end(GestureKind::Touch).await.unwrap();

        // The platform finalizes a longer selection within the settle delay
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle
            .selection_changed(Some(TextRange::new(
                Position::new(leaves[0], 0),
                Position::new(leaves[0], 13),
            )))
            .await
            .unwrap();
        handle.gesture_end(GestureKind::Touch).await.unwrap();

        let ended_at = Instant::now();
        let Some(SessionNotice::HighlightCreated(highlight)) = notices.recv().await else {
            panic!("expected a created highlight");
        };
        assert!(ended_at.elapsed() >= Duration::from_millis(50));
        assert_eq!(highlight.text, "Cells contain");

        assert_eq!(notices.recv().await, Some(SessionNotice::ClearSelection));
        notices.recv().await.unwrap();
        no_notice_within(&mut notices, Duration::from_millis(200)).await;
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failure_is_reported() {
        let (handle, mut notices, _prefs) = start(Arc::new(FailingStore::default()), true);
        let (tree, leaves) = tree();
        handle.mount("chapter-1", tree).await.unwrap();
        notices.recv().await.unwrap();

        handle.gesture_start(GestureKind::Pointer).await.unwrap();
        handle
            .selection_changed(Some(TextRange::new(
                Position::new(leaves[1], 0),
                Position::new(leaves[1], 7),
            )))
            .await
            .unwrap();
        handle.gesture_end(GestureKind::Pointer).await.unwrap();

        let Some(SessionNotice::StoreFailed { operation, .. }) = notices.recv().await else {
            panic!("expected a store failure");
        };
        assert_eq!(operation, StoreOperation::Create);

        let snapshot = handle.snapshot().await.unwrap().unwrap();
        assert!(snapshot.tree.decorations(snapshot.tree.root()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_removes_highlight() {
        let highlight = stored("chapter-1");
        let store = MemoryStore::with_highlights(vec![highlight.clone()]);
        let (handle, mut notices, _prefs) = start(Arc::new(store.clone()), false);
        handle.mount("chapter-1", tree().0).await.unwrap();
        notices.recv().await.unwrap();

        let snapshot = handle.snapshot().await.unwrap().unwrap();
        let decoration = snapshot.tree.decorations(snapshot.tree.root())[0];
        let leaf = snapshot.tree.children(decoration)[0];

        handle.activate(leaf).await.unwrap();
        assert_eq!(
            notices.recv().await,
            Some(SessionNotice::HighlightRemoved { id: highlight.id })
        );
        assert!(store.is_empty().await);

        let snapshot = handle.snapshot().await.unwrap().unwrap();
        assert!(snapshot.applied.is_empty());
        assert!(snapshot.tree.decorations(snapshot.tree.root()).is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_closes_handle() {
        let (prefs_tx, prefs_rx) = watch::channel(HighlightPreferences::default());
        let (handle, _notices, task) =
            spawn(SessionConfig::default(), Arc::new(MemoryStore::new()), prefs_rx);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(handle.refresh().await.is_err());
        drop(prefs_tx);
    }

    #[tokio::test]
    async fn test_removal_redraws_overlapped_highlight() {
        let span = |start: usize, end: usize| {
            Span::new(Anchor::new(vec![1, 0], start), Anchor::new(vec![1, 0], end))
        };
        let covering = HighlightDraft {
            section_id: "chapter-1".to_string(),
            text: "Glucose metabolism".to_string(),
            color: HighlightColor::Yellow,
            span: span(0, 18),
        }
        .into_highlight();
        let overlapped = HighlightDraft {
            section_id: "chapter-1".to_string(),
            text: "metabolism is fast".to_string(),
            color: HighlightColor::Blue,
            span: span(8, 26),
        }
        .into_highlight();
        let store = MemoryStore::with_highlights(vec![covering.clone(), overlapped.clone()]);
        let (handle, mut notices, _prefs) = start(Arc::new(store), false);
        handle.mount("chapter-1", tree().0).await.unwrap();
        notices.recv().await.unwrap();

        let snapshot = handle.snapshot().await.unwrap().unwrap();
        let tree = &snapshot.tree;
        let decoration = tree
            .decorations(tree.root())
            .into_iter()
            .find(|&d| tree.decoration_tag(d).unwrap().highlight_id == covering.id)
            .unwrap();
        let leaf = tree.children(decoration)[0];

        handle.activate(leaf).await.unwrap();
        assert_eq!(
            notices.recv().await,
            Some(SessionNotice::HighlightRemoved { id: covering.id })
        );
        let notice = notices.recv().await.unwrap();
        let SessionNotice::Reconciled { report, .. } = notice else {
            panic!("expected reconcile, got {:?}", notice);
        };
        assert_eq!(report.applied, vec![overlapped.id.clone()]);

        let snapshot = handle.snapshot().await.unwrap().unwrap();
        let tree = &snapshot.tree;
        let text: String = tree
            .decorations(tree.root())
            .into_iter()
            .map(|d| tree.text_content(d))
            .collect();
        assert_eq!(text, "metabolism is fast");
        assert_eq!(snapshot.applied, vec![overlapped.id]);
    }
}
