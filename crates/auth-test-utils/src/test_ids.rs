//! Fixed test identities
//!
//! Stable values so assertions can compare against known subjects.

/// Subject id of the seeded regular user.
pub const ALICE_ID: &str = "6f1c2a7e-3b1d-4c55-9a0e-2f4b8d9c1a01";
pub const ALICE_EMAIL: &str = "alice@example.com";
pub const ALICE_NAME: &str = "Alice";
pub const ALICE_PASSWORD: &str = "correct-pw";

/// Subject id of the seeded admin user.
pub const ADMIN_ID: &str = "0b9e4d31-8c2f-4e7a-b6d5-7a3c1e2f9b02";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_NAME: &str = "Admin";
pub const ADMIN_PASSWORD: &str = "admin-pw-123";

/// Issuer name the harness signs with.
pub const TEST_ISSUER: &str = "home-server-auth";
