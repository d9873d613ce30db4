//! SDK installation system.
//!
//! This module stages the extracted SDK into its installation directory,
//! indexes the launchers it contains and repairs their permissions.

mod permissions;
mod registry;
mod stager;

pub use permissions::PermissionFixer;
pub use registry::{BinaryIndex, BinaryRegistry};
pub use stager::{copy_tree, Stager};
