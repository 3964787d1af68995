//! Warden Core - authorization objects, relations and request context.
//!
//! This crate holds the pure, side-effect-free foundation every
//! authorization driver builds on:
//!
//! - [`Object`] and [`ObjectType`]: validated `<type>:<identifier>` values
//! - [`Relation`]: the entitlements a caller can hold on an object
//! - [`RequestContext`]: who is calling and how they authenticated
//! - [`AuthzError`]: the uniform error taxonomy
//!
//! # Example
//!
//! ```
//! use warden_core::{Object, ObjectType, Relation};
//!
//! let object = Object::instance("default", "c1").unwrap();
//! assert_eq!(object.to_string(), "instance:default/c1");
//!
//! let parsed: Object = "instance:default/c1".parse().unwrap();
//! assert_eq!(parsed.project(), Some("default"));
//! assert!(ObjectType::Instance.validate_relation(Relation::CanExec).is_ok());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod object;
pub mod relation;

pub use context::{AuthenticationProtocol, RequestContext};
pub use error::{AuthzError, AuthzResult};
pub use object::{Object, ObjectType, SERVER_IDENTIFIER};
pub use relation::Relation;
