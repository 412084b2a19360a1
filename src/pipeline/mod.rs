//! Pipeline stages for order-form generation.
//!
//! Each submodule implements one step, so each can be tested without the
//! others or any network access.
//!
//! ## Data Flow
//!
//! ```text
//! record ──▶ fetch ──▶ decode ──▶ layout ──▶ assemble ──▶ publish
//! (store)   (HTTP)   (blocking)  (pages)    (PDF bytes)  (blob + write-back)
//! ```
//!
//! 1. [`fetch`]:    bounded-concurrency image download, results kept in URL order
//! 2. [`decode`]:   JPEG passthrough or PNG flatten + zlib; runs in
//!    `spawn_blocking`
//! 3. [`layout`]:   summary page and image pages as drawing operations
//! 4. [`assemble`]: object numbering, serialisation, xref table and trailer
//! 5. [`publish`]:  overwrite the artifact in blob storage and store its URL
//!    on the record
//!
//! [`inspect`] reads an assembled artifact back and checks its structure.

pub mod assemble;
pub mod decode;
pub mod fetch;
pub mod inspect;
pub mod layout;
pub mod publish;
