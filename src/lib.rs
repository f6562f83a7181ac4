//! Workspace root: not a published crate, just the home for
//! `tests/integration/*.rs`, which exercise `bus-core`, `repository`,
//! `transport`, `test-support` and `services/gateway` together against an
//! in-process mock device bus rather than real serial hardware or a live
//! MQTT broker.
//!
//! Mirrors the teacher's root package, whose own `[lib]` target is likewise
//! never `use`d by its integration tests — they reach straight into the
//! workspace member crates instead.
