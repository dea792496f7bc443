//! Open Type System.
//!
//! A closed set of portable value kinds used at every access boundary:
//!
//! - **Scalars**: booleans, fixed-width integers, floats, chars, strings,
//!   object names and enumerated symbols
//! - **Arrays** of any open type
//! - **Composites**: records with a fixed, ordered set of named typed fields
//! - **Tabulars**: collections of composite rows, unique by a set of index fields
//!
//! [`to_open`] and [`from_open`] translate between native Rust values (through
//! their `serde` representation) and [`OpenValue`]s of a declared [`OpenType`].
//! Because every value crossing the boundary is one of these kinds, a remote
//! client needs no shared code with the process it monitors.
//!
//! # Example
//!
//! ```rust
//! use vigil_core::open_type::{from_open, to_open, CompositeType, OpenType};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Usage { used: i64, max: i64 }
//!
//! let usage_type = OpenType::from(
//!     CompositeType::builder("Usage")
//!         .field("used", OpenType::INT64)
//!         .field("max", OpenType::INT64)
//!         .build()
//!         .unwrap(),
//! );
//!
//! let open = to_open(&Usage { used: 10, max: 64 }, &usage_type).unwrap();
//! let back: Usage = from_open(&open, &usage_type).unwrap();
//! assert_eq!(back, Usage { used: 10, max: 64 });
//! ```

mod mapping;
mod native;
mod types;
mod value;

pub use mapping::{from_open, json_to_open, open_to_json, to_open};
pub use types::{
    CompositeType, CompositeTypeBuilder, EnumType, FieldType, OpenType, SimpleType, TabularType,
};
pub use value::{CompositeData, OpenValue, TabularData};

pub(crate) use native::{from_json, to_json};
