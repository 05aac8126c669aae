//! Detection, normalization and the parse facade.

pub mod deduplication;
pub mod detection;
pub mod fingerprint;
pub mod ingestion;
pub mod normalization;
