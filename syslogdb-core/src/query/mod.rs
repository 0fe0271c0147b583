//! Query planning and composition
//!
//! - [`catalog`]: which table owns each field, and how fields collapse
//! - [`condition`]: WHERE clauses from condition maps and time bounds
//! - [`planner`]: minimal natural-join table lists
//! - [`composer`]: SELECT assembly and execution

pub mod catalog;
pub mod composer;
pub mod condition;
pub mod planner;

pub use composer::{Projection, QueryComposer};
pub use condition::{ConditionValue, Conditions};
