// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod collection;
pub mod delete;
pub mod edit;
pub mod ids;
pub mod model;
pub mod pending;
pub mod store;
pub mod text;

pub use collection::*;
pub use delete::*;
pub use edit::*;
pub use ids::*;
pub use model::*;
pub use pending::*;
pub use store::*;
pub use text::*;
