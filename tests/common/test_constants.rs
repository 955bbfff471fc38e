//! Shared constants for integration tests.
//!
//! Integration tests are compiled as separate crates (one per top-level file in
//! `tests/`). Placing shared constants under `tests/common/` avoids creating an
//! additional integration test binary while still allowing reuse via:
//!
//! ```rust
//! #[path = "common/test_constants.rs"]
//! mod test_constants;
//! ```

/// Cloud profile used by endpoints under test.
pub const TEST_CLOUD: &str = "test-cloud";

/// Image stocked by the in-memory provider.
pub const STOCKED_IMAGE: &str = "ubuntu-24.04";

/// Flavor stocked by the in-memory provider (2 vCPUs, 4096 MiB, 40 GB).
pub const STOCKED_FLAVOR: &str = "m1.small";

/// External network stocked by the in-memory provider.
pub const STOCKED_PUBLIC_NETWORK: &str = "public";
