//! Asynchronous utilities for use with Tokio.
//!
//! The type aliases here underpin the streaming record pipeline used by every
//! subcommand.

use std::pin::Pin;

use futures::Stream;

pub mod io;
pub mod size_hint;

/// A type alias for a boxed future. This is used to make it easier to work with
/// with complex futures.
pub type BoxedFuture<Output> = Pin<Box<dyn Future<Output = Output> + Send>>;

/// A type alias for a boxed stream. This is used to make it easier to work
/// streams that return complex types.
pub type BoxedStream<Item> = Pin<Box<dyn Stream<Item = Item> + Send>>;
