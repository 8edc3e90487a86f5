//! Montage Timeline - Timeline data model
//!
//! Implements the editable document and the rules that keep it valid:
//! - Projects containing clips, effects, transitions and keyframes
//! - Placement with grid snapping and same-layer collision rejection
//! - Bounded undo/redo over project snapshots
//! - Versioned project files

pub mod clip;
pub mod effect;
pub mod history;
pub mod observer;
pub mod placement;
pub mod project;
pub mod serialization;
pub mod session;
pub mod timeline;
pub mod track;
pub mod transition;

pub use clip::{AssetRef, Clip, ClipPatch, MediaKind, TextContent};
pub use effect::{Effect, EffectKind, EffectPatch};
pub use history::{History, HistorySnapshot};
pub use observer::{EventLog, NullObserver, TimelineEvent, TimelineObserver, TracingObserver};
pub use placement::{Placement, PlacementResolver, SplitOutcome, TimelineSettings};
pub use project::Project;
pub use serialization::ProjectFile;
pub use session::EditSession;
pub use timeline::{KeyframePatch, Timeline};
pub use track::Track;
pub use transition::{Direction, Transition, TransitionKind, TransitionPatch};
