//! Authentication module for kin-core.
//!
//! Provides the service token used by the web frontend to talk to this
//! backend. User identity itself arrives as opaque headers; validating the
//! session that produced them is the frontend's problem.

use crate::error::{Error, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::fs::{self, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::SystemTime;

/// Service token for frontend to backend communication
#[derive(Debug, Clone)]
pub struct ServiceToken {
    /// Random 256-bit token
    pub token: [u8; 32],
    /// Creation timestamp (for rotation)
    pub created_at: SystemTime,
    /// Token ID for logging
    pub token_id: uuid::Uuid,
}

impl ServiceToken {
    /// Generate a new service token
    pub fn generate() -> Self {
        let mut token = [0u8; 32];
        for byte in &mut token {
            *byte = rand::random();
        }

        Self {
            token,
            created_at: SystemTime::now(),
            token_id: uuid::Uuid::new_v4(),
        }
    }

    /// Write token to file with restricted permissions (0600)
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let encoded = STANDARD.encode(self.token);
        fs::write(path, &encoded)?;
        fs::set_permissions(path, Permissions::from_mode(0o600))?;
        Ok(())
    }

    /// Read token from file
    pub fn read_from_file(path: &Path) -> Result<Self> {
        let encoded = fs::read_to_string(path)?;
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Other(format!("Invalid token encoding: {}", e)))?;

        if decoded.len() != 32 {
            return Err(Error::InvalidToken);
        }

        let mut token = [0u8; 32];
        token.copy_from_slice(&decoded);

        Ok(Self {
            token,
            created_at: SystemTime::now(),
            token_id: uuid::Uuid::new_v4(),
        })
    }

    /// Read the token from file, generating and persisting one if absent
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::read_from_file(path);
        }
        let token = Self::generate();
        token.write_to_file(path)?;
        Ok(token)
    }

    /// Verify a token matches
    pub fn verify(&self, candidate: &[u8]) -> bool {
        candidate == self.token
    }
}
