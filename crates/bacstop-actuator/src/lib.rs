//! Git working-tree actuation for BACstop.
//!
//! [`RepositoryActuator::apply`] turns a policy
//! [`Decision`](bacstop_policy::Decision) into its side effect:
//!
//! - allow / block: nothing
//! - destroy on pre-commit: the staged delta is reversed in the working copy
//!   and the index; unstaged edits (also inside partly staged files) and
//!   untracked files are left alone
//! - destroy on pre-push: `git reset --hard` to the branch's upstream
//!
//! No backup is taken before a destroy.

pub mod actuator;
pub mod error;
pub mod git;

pub use actuator::{ActionKind, ActionResult, RepositoryActuator};
pub use error::{ActuatorError, Result};
pub use git::{Git, StagedChange};
