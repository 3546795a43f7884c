//! Interlock: the fail-safe rule set linking subsystems together.
//!
//! Rules are data: a [`RuleTrigger`] over the event and zone state, a
//! [`TransitionEffect`] for the zone, and [`CommandTemplate`]s rendered into
//! commands. Evaluation produces a [`StateDelta`] that the hub applies as a
//! whole. All coupling between subsystems lives here.

mod delta;
mod policy;
mod rule;

pub use delta::{DeltaOp, StateDelta, TransitionCause, refresh_derived};
pub use policy::InterlockPolicy;
pub use rule::{
    CommandTemplate, InterlockRule, RuleClass, RuleContext, RuleTrigger, TransitionEffect,
    default_rules,
};
