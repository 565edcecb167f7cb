/// Daemon configuration, loaded from `ROLLCALL_*` environment variables.
pub struct Config {
    /// Recognition backend selector (default: "synthetic").
    pub backend: String,
    /// Resolution confidence threshold; lower scores are closer matches
    /// (default: 70.0).
    pub confidence_threshold: f32,
    /// Capture window length in seconds (default: 20).
    pub session_secs: u64,
    /// Frames discarded at the start of each session (default: 5).
    pub warmup_frames: usize,
    /// Frame dimensions for the synthetic source (default: 640x480).
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            backend: std::env::var("ROLLCALL_BACKEND")
                .unwrap_or_else(|_| "synthetic".to_string()),
            confidence_threshold: env_f32("ROLLCALL_CONFIDENCE_THRESHOLD", 70.0),
            session_secs: env_u64("ROLLCALL_SESSION_SECS", 20),
            warmup_frames: env_usize("ROLLCALL_WARMUP_FRAMES", 5),
            frame_width: env_u32("ROLLCALL_FRAME_WIDTH", 640),
            frame_height: env_u32("ROLLCALL_FRAME_HEIGHT", 480),
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
