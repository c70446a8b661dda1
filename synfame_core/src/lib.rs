/*============================================================
  Synavera Project: Syn-Fame
  Module: synfame_core
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Library surface of Syn-Fame Core: package inspection,
    dependency ordering, and batch upload of app packages into
    the app management registry.

  Security / Safety Notes:
    Registry writes happen only through `upload`, after the
    precondition gate passed.

  Dependencies:
    See individual modules.

  Operational Scope:
    Consumed by the `synfame` binary and by integration tests.

  Revision History:
    2025-11-12 COD  Split library from binary.
============================================================*/

pub mod api;
pub mod batch;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod graph;
pub mod inspector;
pub mod logger;
pub mod package_info;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod types;
pub mod upload;
pub mod validate;

pub use error::{Result, SynfameError};
pub use pipeline::Pipeline;
pub use registry::{AppRegistry, Availability};
