//! `fairy-floss` is a connection pool for RabbitMQ, built on top of
//! [`lapin`], for applications that need to bound and recycle their broker
//! connections without giving up burst capacity.
//!
//! [`pool::QueuedPool`] is the best starting point to learn what
//! `fairy-floss` provides and how to leverage it; [`pool::NullPool`]
//! offers the same interface with no pooling at all.
//!
//! The pool itself is generic: anything implementing
//! [`pool::PoolableConnection`] and produced by a
//! [`pool::ConnectionFactory`] can be pooled. The [`amqp`] module provides
//! both for [`lapin::Connection`].
//!
//! ## Examples
//!
//! Check the [`demos` directory](https://github.com/fairy-floss-rs/fairy-floss/tree/main/demos)
//! on GitHub as well to see the library in action.

pub mod amqp;
pub mod pool;
