//! Pluggable cleaning transforms and the registry that discovers them.
//!
//! A transform is any type implementing [`Transform`]: it describes itself with a
//! [`TransformMeta`] record and turns one table into a new one. Transforms come from
//! two sources:
//!
//! - **Built-in**: compiled into the crate, see [`builtin::builtin_transforms`]
//! - **Extension**: JSON manifests in a configured directory, each describing a short
//!   declarative recipe (see [`extension`] and [`recipe`])
//!
//! # Example: resolving a transform
//!
//! ```no_run
//! use neatdata::transforms::TransformRegistry;
//! use std::path::PathBuf;
//!
//! let registry = TransformRegistry::discover(Some(PathBuf::from("extensions")));
//! if let Some(descriptor) = registry.resolve("Trim Spaces") {
//!     println!("{} -> {}", descriptor.key, descriptor.description);
//! }
//! ```
//!
//! # Built-in transforms
//!
//! | key                   | order | purpose                                    |
//! |-----------------------|-------|--------------------------------------------|
//! | `standardize_headers` | 10    | normalise column names                     |
//! | `trim_spaces`         | 18    | strip leading/trailing whitespace          |
//! | `drop_duplicates`     | 20    | remove duplicate rows                      |
//! | `handle_missing`      | 30    | drop or fill missing values                |
//! | `convert_types`       | 50    | coerce numeric-looking text to numbers     |
//! | `text_normalize`      | 60    | nbsp, whitespace runs and case folding     |

pub mod builtin;
pub mod descriptor;
pub mod extension;
pub mod recipe;
pub mod registry;

pub use builtin::builtin_transforms;
pub use descriptor::{
    CONTRACT_VERSION, FnTransform, Params, Transform, TransformDescriptor, TransformMeta,
    TransformSource,
};
pub use extension::{ExtensionManifest, RecipeTransform};
pub use recipe::RecipeOp;
pub use registry::{CatalogEntry, TransformRegistry};
