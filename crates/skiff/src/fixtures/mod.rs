//
// mod.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

//! In-process stand-ins for the editor and the worker engine, used by the
//! test suites and available to downstream crates via the `testing`
//! feature.

pub mod document;
pub mod engine;

pub use document::FakeDocument;
pub use engine::DemoEngine;
pub use engine::DemoSpawner;
pub use engine::OpLog;
