//! confmgr value model
//!
//! The in-memory shape of a configuration: an ordered tree of nodes whose
//! leaves are typed scalars or lists.
//!
//! # Layers
//!
//! - [`Value`]: scalar, list, or nested [`ConfigNode`]
//! - [`ConfigPath`]: dotted addressing (`database.host`)
//! - [`TypeHints`]: per-path declared types that survive a trip through a
//!   text file
//! - [`FromValue`]: lenient typed reads
//!
//! ```text
//! ConfigNode ─┬─ "database" → Node ─┬─ "host" → Str
//!             │                     └─ "port" → Int
//!             └─ "started"  → DateTime      (hint: datetime)
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod convert;
pub mod error;
pub mod hints;
pub mod node;
pub mod path;
pub mod value;

pub use convert::FromValue;
pub use error::{CoercionError, ConversionError, PathError};
pub use hints::{TypeHint, TypeHints};
pub use node::ConfigNode;
pub use path::{is_identifier, ConfigPath};
pub use value::{format_datetime, parse_datetime, Value, ValueKind, DATETIME_FORMAT};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with configuration values

    pub use crate::{ConfigNode, ConfigPath, FromValue, TypeHint, TypeHints, Value};
}
