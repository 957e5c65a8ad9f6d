/*!
# Damper Failure Reporting Service

A web-based reporting dashboard over damper inspection records, built in Rust.

## Overview

Inspection records (manufacturer, damper type, age, test result, test time)
are pulled from a configurable tabular data source, filtered by date range
and dimension value, cross-tabulated into failure summaries and Pareto
rankings, and rendered as HTML tables, chart JSON payloads and downloadable
XLSX reports.

## Architecture

The aggregation core is a set of pure functions over `Vec<Record>`; the HTTP
layer is thin plumbing that extracts explicit `FilterCriteria` from the
session and passes them down.

### Aggregation core
- Age classification into four ordinal buckets
- Row filtering by inclusive date range and dimension selections
- Cross-tabulation with failure counts, receipts and failure percentages
- Totals augmentation recomputed from counts
- Pareto ranking with cumulative contribution percentages
- Nested pivot tables, flattened only at the rendering boundary

### Boundaries
- **Data source**: local CSV file or remote sheet CSV export, selected by
  configuration, with a pluggable service-account credential provider
- **Cache**: one fetched snapshot of the dataset, kept for a short TTL
- **Reports**: XLSX files written under a shared directory with
  deterministic names, served back as attachments
- **Sessions**: cookie-keyed period selection and last-report tracking

## Modules

- **record**: inspection record model and raw-field conversion
- **age**: age bucket classification (lenient or strict parsing)
- **filter**: filter criteria and row filtering
- **tabulate**: cross-tabulation and totals
- **pareto**: Pareto ranking
- **pivot**: two-dimensional pivot tables
- **report**: HTML/XLSX rendering and the reports directory
- **charts**: chart JSON payloads for the client-side charts
- **source**: data-source fetch and CSV parsing
- **credentials**: service-account credential providers
- **cache**: TTL dataset cache
- **session**: cookie session store
- **config**: environment configuration
- **error**: error taxonomy and HTTP mapping
- **app**: routing and handlers

## HTTP endpoints

- `/set_period` — store the analysis period in the session
- `/filter` — combined-filter failure summary
- `/analyze_make`, `/analyze_type`, `/analyze_age` — pivoted analyses
- `/chart_make_analysis`, `/chart_type_analysis`, `/chart_age_analysis` —
  chart JSON payloads
- `/download/reports/{filename}`, `/download` — report downloads
- `/refresh_data` — drop the cached dataset
*/

pub mod age;
pub mod app;
pub mod cache;
pub mod charts;
pub mod config;
pub mod credentials;
pub mod error;
pub mod filter;
pub mod pareto;
pub mod pivot;
pub mod record;
pub mod report;
pub mod session;
pub mod source;
pub mod tabulate;

pub use age::{AgeBucket, AgeParseMode};
pub use error::{Error, Result};
pub use filter::{DateRange, Dimension, FilterCriteria, Selection};
pub use record::{Record, TestResult};
