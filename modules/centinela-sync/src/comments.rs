//! Comment thread reconciliation over an inconsistent backend contract.
//!
//! Deployments disagree on how comments are fetched: some expose a nested
//! collection under the parent, some a flat collection behind one of a few
//! query-parameter spellings, some only the whole table. The thread probes
//! the candidate routes in a fixed order, keeps the first answer it gets,
//! and filters that answer down to the parent regardless of how scoped the
//! route already was. A probe where every route fails is an empty thread,
//! not an error.

use std::sync::Arc;

use tracing::{debug, info};

use centinela_core::api::{CommentApi, CommentRoute, COMMENT_ROUTES};
use centinela_core::error::{ApiError, CentinelaError, Result};
use centinela_core::record;
use centinela_core::session::Session;
use centinela_core::types::{Comment, CommentDraft};

use crate::moderation::{InFlight, InFlightToken};
use crate::notify::{NoticeBoard, Severity};

pub struct CommentThread {
    api: Arc<dyn CommentApi>,
    session: Session,
    parent_id: i64,
    comments: Vec<Comment>,
    loaded_via: Option<CommentRoute>,
    guard: InFlight,
    notices: NoticeBoard,
}

impl CommentThread {
    pub fn new(api: Arc<dyn CommentApi>, session: Session, parent_id: i64) -> Self {
        Self {
            api,
            session,
            parent_id,
            comments: Vec::new(),
            loaded_via: None,
            guard: InFlight::new(),
            notices: NoticeBoard::default(),
        }
    }

    pub fn parent_id(&self) -> i64 {
        self.parent_id
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Route that answered the most recent load, if any did.
    pub fn loaded_via(&self) -> Option<CommentRoute> {
        self.loaded_via
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = session;
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut NoticeBoard {
        &mut self.notices
    }

    /// Probe the candidate routes in order and keep the first non-error
    /// answer, filtered to this thread's parent. Returns how many comments
    /// the thread now holds.
    pub async fn load(&mut self) -> usize {
        self.comments.clear();
        self.loaded_via = None;

        for &route in COMMENT_ROUTES {
            match self.api.fetch_comments(route, self.parent_id).await {
                Ok(rows) => {
                    self.comments = self.reconcile(&rows);
                    self.loaded_via = Some(route);
                    info!(
                        parent = self.parent_id,
                        ?route,
                        fetched = rows.len(),
                        kept = self.comments.len(),
                        "Comment thread loaded"
                    );
                    return self.comments.len();
                }
                Err(e) => {
                    debug!(parent = self.parent_id, ?route, error = %e, "Comment route failed");
                }
            }
        }
        info!(parent = self.parent_id, "No comment route answered, thread treated as empty");
        0
    }

    /// Post a comment as the current user, then reload the thread through
    /// the same probing chain. The creation response's shape is not
    /// trusted to match the listing shape, so it is discarded.
    pub async fn add(&mut self, body: &str) -> Result<()> {
        let author_id = match self.session.user_id {
            Some(id) => id,
            None => {
                self.notices.post(Severity::Warning, "Sign in to comment");
                return Err(CentinelaError::Unauthenticated);
            }
        };
        let body = body.trim();
        if body.is_empty() {
            self.notices.post(Severity::Warning, "Write something first");
            return Err(CentinelaError::Validation("comment body must not be empty".into()));
        }
        let pending = self.claim_guard()?;

        let draft = CommentDraft {
            parent_id: self.parent_id,
            author_id,
            body: body.to_string(),
        };
        if let Err(e) = self.api.create_comment(&draft).await {
            self.notify_failure("The comment was not saved", &e);
            return Err(e.into());
        }
        drop(pending);
        self.load().await;
        self.notices.post(Severity::Success, "Comment added");
        Ok(())
    }

    /// Replace a comment's body. Authors may edit their own comments;
    /// administrators may edit any.
    pub async fn edit(&mut self, id: i64, body: &str) -> Result<()> {
        let author_id = match self.comments.iter().find(|c| c.id == id) {
            Some(comment) => comment.author.id,
            None => {
                debug!(id, "Edit requested for a comment not in the thread");
                return Ok(());
            }
        };
        if !self.session.can_mutate(author_id) {
            self.notices
                .post(Severity::Warning, "You can only edit your own comments");
            return Err(CentinelaError::NotPermitted);
        }
        let body = body.trim();
        if body.is_empty() {
            self.notices.post(Severity::Warning, "Write something first");
            return Err(CentinelaError::Validation("comment body must not be empty".into()));
        }
        let _pending = self.claim_guard()?;

        match self.api.update_comment(id, body).await {
            Ok(()) => {
                if let Some(comment) = self.comments.iter_mut().find(|c| c.id == id) {
                    comment.body = body.to_string();
                }
                self.notices.post(Severity::Success, "Comment updated");
                Ok(())
            }
            Err(e) => {
                self.notify_failure("The comment was not saved", &e);
                Err(e.into())
            }
        }
    }

    /// Drop a comment. Same gating as [`CommentThread::edit`].
    pub async fn remove(&mut self, id: i64) -> Result<()> {
        let author_id = match self.comments.iter().find(|c| c.id == id) {
            Some(comment) => comment.author.id,
            None => {
                debug!(id, "Removal requested for a comment not in the thread");
                return Ok(());
            }
        };
        if !self.session.can_mutate(author_id) {
            self.notices
                .post(Severity::Warning, "You can only delete your own comments");
            return Err(CentinelaError::NotPermitted);
        }
        let _pending = self.claim_guard()?;

        match self.api.delete_comment(id).await {
            Ok(()) => {
                self.comments.retain(|c| c.id != id);
                self.notices.post(Severity::Success, "Comment deleted");
                Ok(())
            }
            Err(e) => {
                self.notify_failure("The deletion failed", &e);
                Err(e.into())
            }
        }
    }

    /// Keep the rows that normalize into a comment of this parent, oldest
    /// first. Rows without a resolvable id, parent or body are dropped; a
    /// route that was already narrowly scoped passes through unchanged.
    fn reconcile(&self, rows: &[serde_json::Value]) -> Vec<Comment> {
        let mut comments: Vec<Comment> = rows
            .iter()
            .filter_map(record::normalize_comment)
            .filter(|c| c.parent_id == self.parent_id)
            .collect();
        comments.sort_unstable_by_key(|c| c.id);
        comments.dedup_by_key(|c| c.id);
        comments
    }

    /// A server-side 401/403 is reported as a permission problem rather
    /// than a generic failure.
    fn notify_failure(&mut self, what: &str, error: &ApiError) {
        if error.is_permission() {
            self.notices
                .post(Severity::Warning, format!("{what}: the portal refused this action for your account"));
        } else {
            self.notices.post(Severity::Error, format!("{what}: {error}"));
        }
    }

    fn claim_guard(&mut self) -> Result<InFlightToken> {
        match self.guard.try_begin() {
            Some(token) => Ok(token),
            None => {
                self.notices
                    .post(Severity::Warning, "Another action is still running");
                Err(CentinelaError::Busy)
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
