/// Chunked upload planning
///
/// Decides chunk size, chunk count and concurrency for an upload, and tracks
/// per-chunk progress so a failed transfer can resume from the first
/// unconfirmed chunk. The transfer itself is done by the caller.
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::UploadConfig;
use crate::constants::{
    LARGE_FILE_CHUNK_SIZE, LARGE_FILE_THRESHOLD, LOW_THROUGHPUT_CHUNK_CAP, LOW_THROUGHPUT_MBPS,
    OVERSIZED_FILE_CHUNK_SIZE, OVERSIZED_FILE_THRESHOLD, VERY_LOW_THROUGHPUT_CHUNK_CAP,
    VERY_LOW_THROUGHPUT_MBPS,
};
use crate::error::{ConfigurationError, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadPlan {
    pub file_size: u64,
    pub chunk_size: u64,
    pub chunk_count: u64,
    pub concurrency: usize,
    pub retry_attempts: u32,
    #[serde(skip)]
    retry_initial_backoff: Duration,
    #[serde(skip)]
    retry_max_backoff: Duration,
}

/// Byte range `[start, end)` of one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkRange {
    pub index: u64,
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl UploadPlan {
    pub fn chunk(&self, index: u64) -> Option<ChunkRange> {
        if index >= self.chunk_count {
            return None;
        }
        let start = index * self.chunk_size;
        let end = (start + self.chunk_size).min(self.file_size);
        Some(ChunkRange { index, start, end })
    }

    pub fn chunks(&self) -> impl Iterator<Item = ChunkRange> + '_ {
        (0..self.chunk_count).filter_map(move |index| self.chunk(index))
    }

    /// Delay before retry number `attempt` (1-based) of a failed chunk
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .retry_initial_backoff
            .saturating_mul(2u32.saturating_pow(exponent));
        delay.min(self.retry_max_backoff)
    }
}

#[derive(Debug, Clone)]
pub struct UploadPartitioner {
    config: UploadConfig,
}

impl UploadPartitioner {
    /// Rejects inconsistent chunk bounds up front so `plan` never has to.
    pub fn new(config: UploadConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        debug!(
            "Initializing upload partitioner: max_file_size={}, max_duration={}s, chunk_size={}..{}",
            config.max_file_size_bytes,
            config.max_duration_seconds,
            config.min_chunk_size_bytes,
            config.max_chunk_size_bytes
        );
        Ok(Self { config })
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Plan an upload. Limits are checked before anything else; a rejected
    /// request never yields a partial plan.
    pub fn plan(
        &self,
        file_size: u64,
        duration_secs: Option<f64>,
        measured_throughput_mbps: Option<f64>,
    ) -> Result<UploadPlan, ValidationError> {
        self.validate(file_size, duration_secs)?;

        let chunk_size = self.chunk_size_for(file_size, measured_throughput_mbps);
        let chunk_count = file_size.div_ceil(chunk_size);
        let concurrency = usize::try_from(chunk_count)
            .unwrap_or(usize::MAX)
            .min(self.config.max_concurrent_uploads);

        debug!(
            "Upload plan: file_size={}, chunk_size={}, chunks={}, concurrency={}",
            file_size, chunk_size, chunk_count, concurrency
        );

        Ok(UploadPlan {
            file_size,
            chunk_size,
            chunk_count,
            concurrency,
            retry_attempts: self.config.retry_attempts,
            retry_initial_backoff: self.config.retry_initial_backoff,
            retry_max_backoff: self.config.retry_max_backoff,
        })
    }

    fn validate(&self, file_size: u64, duration_secs: Option<f64>) -> Result<(), ValidationError> {
        if file_size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if file_size > self.config.max_file_size_bytes {
            debug!(
                "Upload rejected: size={} limit={}",
                file_size, self.config.max_file_size_bytes
            );
            return Err(ValidationError::FileTooLarge {
                size: file_size,
                limit: self.config.max_file_size_bytes,
            });
        }

        if let Some(duration) = duration_secs {
            if !duration.is_finite() || duration < 0.0 {
                debug!("Upload rejected: unusable duration={}", duration);
                return Err(ValidationError::InvalidDuration {
                    duration_secs: duration,
                });
            }
            if duration > self.config.max_duration_seconds as f64 {
                debug!(
                    "Upload rejected: duration={}s limit={}s",
                    duration, self.config.max_duration_seconds
                );
                return Err(ValidationError::DurationTooLong {
                    duration_secs: duration,
                    limit_secs: self.config.max_duration_seconds,
                });
            }
        }

        Ok(())
    }

    /// Smaller of the size-based and throughput-based candidates, clamped
    /// into the configured bounds.
    fn chunk_size_for(&self, file_size: u64, throughput_mbps: Option<f64>) -> u64 {
        let by_size = if file_size > OVERSIZED_FILE_THRESHOLD {
            OVERSIZED_FILE_CHUNK_SIZE
        } else if file_size > LARGE_FILE_THRESHOLD {
            LARGE_FILE_CHUNK_SIZE
        } else {
            self.config.default_chunk_size_bytes
        };

        let throughput = match throughput_mbps {
            Some(mbps) if mbps.is_finite() && mbps >= 0.0 => Some(mbps),
            Some(mbps) => {
                warn!("Ignoring unusable throughput measurement: {}", mbps);
                None
            }
            None => None,
        };

        let by_throughput = match throughput {
            Some(mbps) if mbps < VERY_LOW_THROUGHPUT_MBPS => Some(VERY_LOW_THROUGHPUT_CHUNK_CAP),
            Some(mbps) if mbps < LOW_THROUGHPUT_MBPS => Some(LOW_THROUGHPUT_CHUNK_CAP),
            _ => None,
        };

        let candidate = by_throughput.map_or(by_size, |cap| cap.min(by_size));
        candidate.clamp(
            self.config.min_chunk_size_bytes,
            self.config.max_chunk_size_bytes,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::InProgress => "in_progress",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }
}

/// What the caller should do after a chunk failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    Retry { attempt: u32, backoff: Duration },
    /// Retry budget exhausted; the whole upload is failed
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Pending { failures: u32 },
    Confirmed,
}

/// Progress of one transfer against its plan
#[derive(Debug, Clone)]
pub struct UploadProgress {
    plan: UploadPlan,
    chunks: Vec<ChunkState>,
    failed: bool,
}

impl UploadProgress {
    pub fn new(plan: UploadPlan) -> Self {
        let count = usize::try_from(plan.chunk_count).unwrap_or(0);
        Self {
            chunks: vec![ChunkState::Pending { failures: 0 }; count],
            plan,
            failed: false,
        }
    }

    pub fn plan(&self) -> &UploadPlan {
        &self.plan
    }

    pub fn record_success(&mut self, index: u64) {
        if let Some(state) = self.state_mut(index) {
            *state = ChunkState::Confirmed;
        }
    }

    pub fn record_failure(&mut self, index: u64) -> ChunkOutcome {
        let retry_attempts = self.plan.retry_attempts;
        let Some(state) = self.state_mut(index) else {
            return ChunkOutcome::Failed;
        };

        let failures = match state {
            ChunkState::Confirmed => return ChunkOutcome::Failed,
            ChunkState::Pending { failures } => {
                *failures += 1;
                *failures
            }
        };

        if failures > retry_attempts {
            warn!(
                "Chunk {} failed after {} retries, upload marked failed",
                index, retry_attempts
            );
            self.failed = true;
            return ChunkOutcome::Failed;
        }

        ChunkOutcome::Retry {
            attempt: failures,
            backoff: self.plan.retry_backoff(failures),
        }
    }

    pub fn status(&self) -> UploadStatus {
        if self.failed {
            UploadStatus::Failed
        } else if self.chunks.iter().all(|c| *c == ChunkState::Confirmed) {
            UploadStatus::Completed
        } else if self
            .chunks
            .iter()
            .any(|c| *c != ChunkState::Pending { failures: 0 })
        {
            UploadStatus::InProgress
        } else {
            UploadStatus::Pending
        }
    }

    /// First chunk not yet confirmed; `None` once everything is confirmed
    pub fn resume_from(&self) -> Option<ChunkRange> {
        self.chunks
            .iter()
            .position(|c| *c != ChunkState::Confirmed)
            .and_then(|index| self.plan.chunk(index as u64))
    }

    pub fn pending_chunks(&self) -> Vec<ChunkRange> {
        self.chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| **c != ChunkState::Confirmed)
            .filter_map(|(index, _)| self.plan.chunk(index as u64))
            .collect()
    }

    pub fn bytes_confirmed(&self) -> u64 {
        self.chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == ChunkState::Confirmed)
            .filter_map(|(index, _)| self.plan.chunk(index as u64))
            .map(|range| range.len())
            .sum()
    }

    /// Start a fresh attempt over the unconfirmed chunks of a failed upload.
    pub fn resume(&mut self) {
        self.failed = false;
        for state in &mut self.chunks {
            if let ChunkState::Pending { failures } = state {
                *failures = 0;
            }
        }
    }

    fn state_mut(&mut self, index: u64) -> Option<&mut ChunkState> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.chunks.get_mut(i))
    }
}
