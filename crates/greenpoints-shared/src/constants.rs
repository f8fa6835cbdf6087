/// Schema label reported in network metadata and snapshots
pub const DATA_FORMAT_VERSION: &str = "2.0.0";

/// Prefix of generated network identifiers (`GP-NET-XXXXXX`)
pub const NETWORK_ID_PREFIX: &str = "GP-NET-";

/// Number of random characters following the network id prefix
pub const NETWORK_ID_SUFFIX_LEN: usize = 6;

/// XP awarded per recycled unit
pub const XP_PER_UNIT: u64 = 25;

/// Upper bound on units accepted by a single credit
pub const MAX_UNITS_PER_CREDIT: u64 = 100;

/// Carbon offset per recycled bottle, in kilograms
pub const CARBON_KG_PER_UNIT: f64 = 0.08;

/// Rank thresholds (points)
pub const RANK_NATURE_SCOUT: u64 = 250;
pub const RANK_GREEN_GUARDIAN: u64 = 500;
pub const RANK_ECO_LEGEND: u64 = 1000;

/// Maximum decoded avatar size in bytes (2 MiB)
pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

/// Minimum number of days between two avatar changes
pub const AVATAR_COOLDOWN_DAYS: i64 = 60;

/// Identity and display name length limits
pub const MAX_NODE_ID_LEN: usize = 64;
pub const MAX_NAME_LEN: usize = 64;

/// Maximum notice length in characters
pub const MAX_NOTICE_LEN: usize = 1000;

/// Device name prefix required for pairing
pub const DEVICE_NAME_PREFIX: &str = "GP-Bin";

/// Byte emitted by a GP-Bin for every detected bottle
pub const DETECTION_SIGNAL: u8 = b'B';

/// BLE service advertised by the reference GP-Bin firmware
pub const BLE_SERVICE_UUID: &str = "4fafc201-1fb5-459e-8fcc-c5c9c331914b";

/// BLE notify characteristic carrying detection signals
pub const BLE_XP_CHARACTERISTIC_UUID: &str = "beb5483e-36e1-4688-b7f5-ea07361b26a8";

/// Minimum spacing between two credited signals from one device
pub const DEVICE_DEBOUNCE_MS: u64 = 2000;

/// Pairing token size in bytes (hex-encoded on the wire)
pub const DEVICE_TOKEN_SIZE: usize = 16;

/// Devices one account may hold paired at once
pub const MAX_DEVICES_PER_OWNER: usize = 4;

/// Suggested client polling period for session sync
pub const SESSION_SYNC_SECS: u64 = 5;

/// Session token size in bytes (hex-encoded on the wire)
pub const SESSION_TOKEN_SIZE: usize = 32;

/// Credential salt size in bytes
pub const CREDENTIAL_SALT_SIZE: usize = 16;

/// Key derivation context for stored credentials (BLAKE3)
pub const KDF_CONTEXT_CREDENTIAL: &str = "greenpoints-credential-v1";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;
