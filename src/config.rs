/*!
Configuration for the KEMTLS channel.
*/

use std::time::Duration;

use crate::constants::defaults;
use crate::crypto::kem::KemAlgorithm;

/// Tunable parameters shared by the handshake drivers and the session
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// KEM parameter set used for all keypairs and encapsulations
    pub algorithm: KemAlgorithm,

    /// Upper bound on a single frame's declared payload length
    pub max_frame_size: usize,

    /// Deadline for each handshake step's expected message
    pub step_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            algorithm: KemAlgorithm::default(),
            max_frame_size: defaults::MAX_FRAME_SIZE,
            step_timeout: defaults::STEP_TIMEOUT,
        }
    }
}

impl ChannelConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the KEM algorithm
    pub fn with_algorithm(mut self, algorithm: KemAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the maximum frame size
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Set the per-step handshake deadline
    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }
}
