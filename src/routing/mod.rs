//! Route synthesis from the file-system routing convention
//!
//! - [`path`]: compiles a single source file path into an anchored route rule
//! - [`conflict`]: rejects ambiguous or duplicated path layouts
//! - [`synth`]: orders candidates and assembles the final route list
//! - [`rule`]: the route rule records consumed by the serving layer

pub mod conflict;
pub mod path;
pub mod rule;
pub mod synth;

pub use conflict::ConflictError;
pub use path::{compile_route, CompiledRoute};
pub use rule::{Phase, PhaseMarker, RouteRule, Rule};
pub use synth::{detect_output_directory, synthesize_routes, STATIC_BUILDER_ID};
