//! # babelsberg
//!
//! Structure-preserving PDF translation pipeline.
//!
//! A submitted document flows through four cooperating subsystems:
//!
//! 1. **Layout-aware extraction** ([`layout`], [`classify`]) turns raw text
//!    runs into an ordered stream of typed content blocks using adaptive
//!    font statistics, multi-column reading-order recovery, and
//!    multi-signal classification.
//! 2. **Visual region handling** ([`regions`], [`associate`]) extracts
//!    raster images, detected tables, detected equations, and sparse-text
//!    visual areas; filters false positives with quantitative guards;
//!    resolves competing extractions; and binds each survivor to nearby
//!    text and captions.
//! 3. **Structure-preserving translation** ([`translate`], [`cache`])
//!    pushes block text through an external backend behind a two-tier
//!    cache, with bounded concurrency, soft rate limiting, per-task
//!    timeouts, and original-text fallback.
//! 4. **ToC reconciliation** ([`toc`]) merges explicit contents pages with
//!    the classified heading structure into one deduplicated outline.
//!
//! The host PDF parser, OCR engine, translation service, and document
//! writer are external collaborators behind the traits in [`source`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use babelsberg::config::PipelineConfig;
//! use babelsberg::pipeline::Pipeline;
//! use babelsberg::source::{IdentityBackend, InMemorySource};
//! use std::sync::Arc;
//!
//! # async fn example() -> babelsberg::Result<()> {
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//! let mut source = InMemorySource::new("paper.pdf", vec![]);
//! let output = pipeline
//!     .run(&mut source, Arc::new(IdentityBackend), None, "out".as_ref())
//!     .await?;
//! println!("{} blocks", output.document.blocks.len());
//! # Ok(())
//! # }
//! ```

pub mod associate;
pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod regions;
pub mod source;
pub mod toc;
pub mod translate;
pub mod types;

#[cfg(feature = "pdf")]
pub mod pdfium;

pub use config::PipelineConfig;
pub use error::{BabelsbergError, Result};
pub use pipeline::{ExtractionOutput, Pipeline, PipelineOutput, RunStats};
pub use source::{DocumentSource, IdentityBackend, OcrEngine, TranslationBackend};
pub use types::{BlockKind, ContentBlock, Document, Region, TocEntry, TranslationTask};

#[cfg(feature = "pdf")]
pub use pdfium::PdfiumSource;

#[cfg(feature = "http-backend")]
pub use translate::http::HttpBackend;
