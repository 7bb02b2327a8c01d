//! # bindc
//!
//! The semantic-binding core of an ahead-of-time compiler for a C++/C#-like
//! language. Given an already parsed syntax tree and a populated symbol
//! table, the binder decides which declared entity each call-site,
//! constructor, generic instantiation and constant expression refers to.
//!
//! ## Module Structure
//!
//! - [`symbols`] - Symbol table, scopes and the type repository
//! - [`value`] - Compile-time constant values and numeric promotion
//! - [`typeck`] - The binder: conversions, overload resolution, deduction,
//!   concepts, constant evaluation and special member synthesis
//! - [`bound`] - The bound tree produced for the code generator
//! - [`ast`] - Syntax consumed by the binder
//! - [`error`] / [`diagnostics`] - Failure taxonomy and rendering
//! - [`config`] - Per compile unit configuration
//!
//! ## Example
//!
//! ```ignore
//! use bindc::{Binder, BinderConfig};
//! use bindc::typeck::{Argument, OverloadRequest};
//!
//! let mut binder = Binder::new(BinderConfig::default());
//! let int = binder.symbols.types().int();
//! let args = [Argument::lvalue(int), Argument::rvalue(int)];
//! let call = binder.resolve_overload(&OverloadRequest::new("operator<", &args))?;
//! ```

pub mod ast;
pub mod bound;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod span;
pub mod symbols;
pub mod typeck;
pub mod value;

pub use config::BinderConfig;
pub use error::BindError;
pub use span::Span;
pub use typeck::Binder;
