/// Application name
pub const APP_NAME: &str = "E-Service Portal";

/// Skills a technician can pick from at registration
pub const TECHNICIAN_SKILLS: &[&str] = &[
    "Plumbing",
    "HVAC",
    "Electrical",
    "Appliance Repair",
    "Carpentry",
    "Painting",
    "Landscaping",
    "Other",
];

/// First message of every conversation, authored by the accepting technician
pub const DEFAULT_OPENING_MESSAGE: &str =
    "Service request accepted. Feel free to ask any questions.";

/// Minimum accepted password length at sign-up
pub const MIN_PASSWORD_LEN: usize = 6;

/// Inclusive star range for ratings
pub const MIN_RATING_STARS: u8 = 1;
pub const MAX_RATING_STARS: u8 = 5;

/// Allowed drift between an invoice total and the sum of its items
pub const INVOICE_TOTAL_TOLERANCE: f64 = 0.005;

/// Default avatar generator, seeded by identity id
pub const AVATAR_URL_PREFIX: &str = "https://picsum.photos/seed";

/// Capacity of the store change feed before slow subscribers lag
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// Build the default avatar URL for a freshly registered identity.
pub fn default_avatar_url(id: &uuid::Uuid) -> String {
    format!("{AVATAR_URL_PREFIX}/{id}/100/100")
}

/// BLAKE3 key-derivation context for password hashes
pub const KDF_CONTEXT_PASSWORD: &str = "eservice 2026 password hash v1";

/// Random salt length in bytes
pub const PASSWORD_SALT_LEN: usize = 16;
