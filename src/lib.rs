// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Vartija Scanning Engine
 * Cloud configuration security & compliance scanning
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

pub mod backoff;
pub mod errors;
pub mod rate_limiter;
pub mod resource_cache;
pub mod transport;
pub mod types;

// Management API client
pub mod azure;

// Credential resolution and secret handling
pub mod auth;

// Scanner plugins
pub mod scanners;

// Run orchestration
pub mod orchestrator;

// Well-Architected pillar analysis
pub mod well_architected;

pub use orchestrator::{OrchestratorConfig, ScanOrchestrator};
pub use types::{AggregateScanResult, Finding, ScanContext, ScanResult, Severity};
