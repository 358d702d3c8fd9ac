//! Graph layer: synthesis keys, node representations, and the
//! spec-to-node synthesizer.

pub mod key;
pub mod node;
pub mod synth;

pub use key::{NodeRole, SynthesisKey};
pub use node::{DesiredGraphNode, ExistingGraphNode};
pub use synth::{EffectiveAbility, SynthError, resolve_effective, synthesize};
