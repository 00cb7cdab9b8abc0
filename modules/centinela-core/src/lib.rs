pub mod api;
pub mod config;
pub mod error;
pub mod record;
pub mod session;
pub mod stats;
pub mod types;
pub mod view;

pub use config::Config;
pub use error::{ApiError, ApiResult, CentinelaError, Result};
pub use session::{Role, Session, SessionStore};
pub use types::{
    AttachmentRef, Comment, CommentDraft, GeoPoint, Incident, IncidentDraft, IncidentKind,
    IncidentPatch, IncidentStatus, Region, UserRef,
};
