#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Vendoring engine for Go projects.
//!
//! A [`Manifest`] pins external packages. The [`cache`] keeps one git checkout
//! per pin, [`vendor`] copies the checkouts into the project's vendor
//! directory, and [`prune`] removes everything the project's import graph
//! (see [`graph`]) does not reach.

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod manifest;
pub mod paths;
pub mod prune;
pub mod scan;
pub mod update;
pub mod vendor;
pub mod version;
pub mod workflow;

pub use cache::{EntryState, RepoCache};
pub use config::Config;
pub use error::{Error, Result};
pub use graph::{PackageSet, Resolver};
pub use manifest::{Import, ImportOptions, Manifest, ManifestFormat};
pub use prune::{PruneReport, Pruner};
pub use scan::PlatformVariant;
pub use version::VERSION;
pub use workflow::{UpdateReport, VendorReport};
