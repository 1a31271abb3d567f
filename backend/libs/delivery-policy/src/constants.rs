//! Delivery policy constants

pub const MB: u64 = 1024 * 1024;
pub const GB: u64 = 1024 * MB;

/// Safety factor applied to a rendition's bitrate before it is compared with
/// the bandwidth estimate, expressed as a ratio (3/2 = 1.5).
pub const SAFETY_FACTOR_NUM: u64 = 3;
pub const SAFETY_FACTOR_DEN: u64 = 2;

/// Files above this size use the largest chunk bracket
pub const OVERSIZED_FILE_THRESHOLD: u64 = 5 * GB;
pub const OVERSIZED_FILE_CHUNK_SIZE: u64 = 20 * MB;

/// Files above this size use the large chunk bracket
pub const LARGE_FILE_THRESHOLD: u64 = GB;
pub const LARGE_FILE_CHUNK_SIZE: u64 = 15 * MB;

/// Below 1 Mbps chunks are capped at 2 MB
pub const VERY_LOW_THROUGHPUT_MBPS: f64 = 1.0;
pub const VERY_LOW_THROUGHPUT_CHUNK_CAP: u64 = 2 * MB;

/// Below 5 Mbps chunks are capped at 5 MB
pub const LOW_THROUGHPUT_MBPS: f64 = 5.0;
pub const LOW_THROUGHPUT_CHUNK_CAP: u64 = 5 * MB;

/// Default chunk size when no bracket applies (10 MB)
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * MB;
pub const MIN_CHUNK_SIZE: u64 = MB;
pub const MAX_CHUNK_SIZE: u64 = 32 * MB;

/// Maximum upload size (10 GB)
pub const MAX_FILE_SIZE: u64 = 10 * GB;

/// Maximum video duration (4 hours)
pub const MAX_DURATION_SECS: u64 = 4 * 60 * 60;

pub const MAX_CONCURRENT_UPLOADS: usize = 4;
pub const CHUNK_RETRY_ATTEMPTS: u32 = 3;

/// Chunk retry backoff, matching the object-storage retry preset
pub const CHUNK_RETRY_INITIAL_BACKOFF_MS: u64 = 500;
pub const CHUNK_RETRY_MAX_BACKOFF_MS: u64 = 30_000;

/// Consecutive favourable bandwidth samples required before an upgrade
pub const ABR_UPGRADE_SAMPLES: u32 = 3;

/// Consecutive playback failures before an origin is demoted
pub const CDN_DEMOTE_AFTER_FAILURES: u32 = 3;

/// Signed URL lifetime (1 hour)
pub const TOKEN_TTL_SECS: u64 = 60 * 60;

/// Highest frame rate accepted in a ladder entry
pub const MAX_FPS: u32 = 240;

/// Keyframe spacing used by encoding presets
pub const KEYFRAME_INTERVAL_SECS: u32 = 2;

/// Default quality ladder (name, width, height, bitrate kbps, fps, codec)
pub const DEFAULT_LADDER: &[(&str, u32, u32, u32, u32, &str)] = &[
    ("2160p", 3840, 2160, 15000, 30, "h265"),
    ("1080p", 1920, 1080, 8000, 30, "h264"),
    ("720p", 1280, 720, 5000, 30, "h264"),
    ("480p", 854, 480, 2500, 30, "h264"),
    ("360p", 640, 360, 1000, 30, "h264"),
    ("240p", 426, 240, 500, 24, "h264"),
];
