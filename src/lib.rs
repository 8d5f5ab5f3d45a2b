//! Purpose: CSV cursors and filter predicates shared by the `csvcursor` CLI and tests.
//! Exports: `api` (public surface), `core` (reader, writer, cursor, filters, errors).
//! Role: Library backing the binary; `api` is the stable path for downstream users.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
