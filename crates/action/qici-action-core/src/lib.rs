//! QICI action core (engine-agnostic)
//!
//! Keyframe timelines ("actions") and a graph scheduler ("action managers")
//! driving named attributes of host objects. The host supplies targets,
//! scripts and the clock through the traits in [`binding`]; everything else
//! (bezier curves, step keys, event dispatch, transitions, bundles) lives here.
//!
//! Typical flow:
//! 1. Build a [`PropertyRegistry`] (built-ins plus host extensions).
//! 2. Restore timelines from bundles ([`bundle::restore`]) or build them in code.
//! 3. Call `play_action()` once, then `update()` every frame, and drain
//!    `take_signals()`.

pub mod action;
pub mod binding;
pub mod bundle;
pub mod config;
pub mod curve;
pub mod error;
pub mod ids;
pub mod manager;
pub mod memory;
pub mod prop;
pub mod registry;
pub mod signals;
pub mod transition;
pub mod value;

// Re-exports for hosts
pub use action::{Action, Event};
pub use binding::{
    coerce_args, ActionHost, AttributeAccess, ScriptDispatch, TargetHandle, TargetResolver,
    TimeSource,
};
pub use bundle::{
    library_from_json, restore, restore_action, restore_manager, ActionBundle, BundleLibrary,
    ManagerBundle, TimelineBundle, TransitionBundle,
};
pub use config::Config;
pub use curve::{BezierCurve, Keyframe, TangentMode, WrapMode};
pub use error::ActionError;
pub use ids::{ActionId, IdAllocator, NodeId, TransitionId};
pub use manager::{ActionManager, Timeline};
pub use memory::{MemoryHost, MemoryScript};
pub use prop::{
    AnimatedProp, ColorLinearProp, CurveProp, CurveType, KeyProp, Playhead, Prop, PropKey,
    TextureKeyProp,
};
pub use registry::{property_ids, CustomProperty, PropClass, PropertyDef, PropertyRegistry};
pub use signals::Signal;
pub use transition::{Condition, Transition, Trigger};
pub use value::{Value, ValueKind};
