//! Role-gated incident mutation.
//!
//! Every path through here follows the same shape: check the session's
//! role, claim the in-flight guard, then and only then touch the network
//! through the store. A rejection posts a notice and returns before any
//! request is built, so the collection cannot drift on a denied action.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use centinela_core::error::{CentinelaError, Result};
use centinela_core::session::Session;
use centinela_core::types::{Incident, IncidentDraft, IncidentPatch};

use crate::notify::{NoticeBoard, Severity};
use crate::store::IncidentStore;

// ---------------------------------------------------------------------------
// In-flight guard
// ---------------------------------------------------------------------------

/// Single-slot guard shared by every mutation a controller can start.
/// Claiming it yields a token; the slot frees itself when the token drops,
/// including on early returns.
#[derive(Clone, Default)]
pub struct InFlight(Arc<AtomicBool>);

pub struct InFlightToken(Arc<AtomicBool>);

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_begin(&self) -> Option<InFlightToken> {
        if self.0.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(InFlightToken(self.0.clone()))
        }
    }

    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Confirmation gate
// ---------------------------------------------------------------------------

/// Yes/no prompt shown before destroying a record. The UI supplies the
/// dialog; tests script the answer.
pub trait ConfirmGate: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct Moderator {
    session: Session,
    gate: Arc<dyn ConfirmGate>,
    guard: InFlight,
    notices: NoticeBoard,
}

impl Moderator {
    pub fn new(session: Session, gate: Arc<dyn ConfirmGate>) -> Self {
        Self {
            session,
            gate,
            guard: InFlight::new(),
            notices: NoticeBoard::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Swap in a freshly resolved session, e.g. after navigation.
    pub fn set_session(&mut self, session: Session) {
        self.session = session;
    }

    /// Handle to the guard, shared with anything else that must not run
    /// while a mutation is pending.
    pub fn guard(&self) -> InFlight {
        self.guard.clone()
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut NoticeBoard {
        &mut self.notices
    }

    /// Status and deletion are administrator-only for incidents; authors
    /// get no self-service here, unlike comments.
    pub fn can_moderate(&self) -> bool {
        self.session.is_admin()
    }

    /// Submit a new incident on behalf of the current session. Authorship
    /// comes from the session, not the caller's draft.
    pub async fn submit(&mut self, store: &mut IncidentStore, mut draft: IncidentDraft) -> Result<Incident> {
        let author_id = match self.session.user_id {
            Some(id) => id,
            None => {
                self.notices.post(Severity::Warning, "Sign in to submit an incident");
                return Err(CentinelaError::Unauthenticated);
            }
        };
        let _pending = self.claim_guard()?;
        draft.author_id = author_id;
        match store.create(&draft).await {
            Ok(incident) => {
                self.notices.post(Severity::Success, "Incident submitted");
                Ok(incident)
            }
            Err(e) => {
                self.notify_failure("The incident was not saved", &e);
                Err(e)
            }
        }
    }

    /// Flip attended/pending on one record. Rejected locally, with no
    /// request issued, when the role is insufficient, another mutation is
    /// pending, or the record's status has no boolean complement.
    pub async fn toggle_status(&mut self, store: &mut IncidentStore, id: i64) -> Result<()> {
        self.require_admin("Only administrators can change incident status")?;
        let _pending = self.claim_guard()?;

        let current = match store.get(id) {
            Some(incident) => incident.status.clone(),
            None => {
                debug!(id, "Toggle requested for an id no longer cached");
                return Ok(());
            }
        };
        let next = match current.toggled() {
            Some(next) => next,
            None => {
                self.notices
                    .post(Severity::Warning, "This record's status does not toggle");
                return Err(CentinelaError::Validation(format!(
                    "status '{}' has no toggle target",
                    current.label()
                )));
            }
        };

        match store.update_field(id, &IncidentPatch::status(next)).await {
            Ok(()) => {
                self.notices.post(Severity::Success, "Status updated");
                Ok(())
            }
            Err(e) => {
                self.notify_failure("The change was not saved", &e);
                Err(e)
            }
        }
    }

    /// Apply a partial edit to one record.
    pub async fn edit(&mut self, store: &mut IncidentStore, id: i64, patch: &IncidentPatch) -> Result<()> {
        self.require_admin("Only administrators can edit incidents")?;
        let _pending = self.claim_guard()?;
        if patch.is_empty() {
            self.notices.post(Severity::Warning, "Nothing to change");
            return Err(CentinelaError::Validation("empty patch".into()));
        }
        match store.update_field(id, patch).await {
            Ok(()) => {
                self.notices.post(Severity::Success, "Incident updated");
                Ok(())
            }
            Err(e) => {
                self.notify_failure("The change was not saved", &e);
                Err(e)
            }
        }
    }

    /// Destroy one record after an explicit confirmation. Returns `false`
    /// when the prompt was declined; nothing is sent in that case.
    pub async fn delete(&mut self, store: &mut IncidentStore, id: i64) -> Result<bool> {
        self.require_admin("Only administrators can delete incidents")?;
        let _pending = self.claim_guard()?;

        if !self.gate.confirm(&format!("Delete incident #{id}? This cannot be undone.")) {
            self.notices.post(Severity::Info, "Deletion cancelled");
            return Ok(false);
        }
        match store.remove(id).await {
            Ok(()) => {
                self.notices.post(Severity::Success, "Incident deleted");
                Ok(true)
            }
            Err(e) => {
                self.notify_failure("The deletion failed", &e);
                Err(e)
            }
        }
    }

    /// A server-side 401/403 means the role check passed locally but the
    /// portal disagreed; that reads as a permission problem to the user,
    /// not a fault.
    fn notify_failure(&mut self, what: &str, error: &CentinelaError) {
        match error {
            CentinelaError::Api(api) if api.is_permission() => {
                self.notices
                    .post(Severity::Warning, format!("{what}: the portal refused this action for your account"));
            }
            _ => {
                self.notices.post(Severity::Error, format!("{what}: {error}"));
            }
        }
    }

    fn require_admin(&mut self, message: &str) -> Result<()> {
        if self.session.is_admin() {
            Ok(())
        } else {
            self.notices.post(Severity::Warning, message);
            Err(CentinelaError::NotPermitted)
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
