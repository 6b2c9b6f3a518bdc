//! Vault configuration.

use medvault_perms::ConsentConfig;

/// Configuration for the Vault.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Consent engine configuration (ledger deadline, grant limits).
    pub consent: ConsentConfig,
    /// Largest plaintext accepted by upload.
    pub max_document_bytes: usize,
    /// Symbols in a generated emergency code.
    pub emergency_code_len: usize,
    /// Append a "ledger n/m confirmed" summary to audit details. The
    /// structured per-document results are recorded either way.
    pub audit_ledger_details: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            consent: ConsentConfig::default(),
            max_document_bytes: 25 * 1024 * 1024,
            emergency_code_len: 12,
            audit_ledger_details: true,
        }
    }
}

impl VaultConfig {
    /// Longest grant or request duration accepted.
    pub fn max_duration_hours(&self) -> u32 {
        self.consent.max_duration_hours
    }
}
