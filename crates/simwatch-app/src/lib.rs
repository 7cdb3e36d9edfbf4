// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod graph;
pub mod ids;
pub mod legend;
pub mod model;
pub mod poller;
pub mod progress;
pub mod render;
pub mod session;
pub mod view;
pub mod zoom;

pub use graph::*;
pub use ids::*;
pub use legend::*;
pub use model::*;
pub use poller::*;
pub use progress::*;
pub use render::*;
pub use session::*;
pub use view::*;
pub use zoom::*;
