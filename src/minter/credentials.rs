//! Operator access-key credentials

use crate::error::ProvisionError;

/// Long-lived access-key credentials supplied by the operator
#[derive(Clone)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    AccessKeyId,
    SecretAccessKey,
    Region,
}

impl CredentialField {
    pub fn name(self) -> &'static str {
        match self {
            CredentialField::AccessKeyId => "AWS Access Key ID",
            CredentialField::SecretAccessKey => "AWS Secret Access Key",
            CredentialField::Region => "AWS Region",
        }
    }
}

impl StaticCredentials {
    /// Fill in whatever the flags left out by asking `ask`.
    ///
    /// Blank values count as missing, whether they came from a flag or an
    /// answer.
    pub fn complete<F>(
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        region: Option<String>,
        mut ask: F,
    ) -> Result<Self, ProvisionError>
    where
        F: FnMut(CredentialField) -> Option<String>,
    {
        let mut field = |given: Option<String>, which: CredentialField| {
            given
                .filter(|v| !v.trim().is_empty())
                .or_else(|| ask(which))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ProvisionError::MissingCredential(which.name()))
        };

        Ok(Self {
            access_key_id: field(access_key_id, CredentialField::AccessKeyId)?,
            secret_access_key: field(secret_access_key, CredentialField::SecretAccessKey)?,
            region: field(region, CredentialField::Region)?,
        })
    }
}

/// Interactive prompt for one credential; the secret key is masked
pub fn prompt_credential(field: CredentialField) -> Option<String> {
    let label = format!("{}:", field.name());
    let answer = match field {
        CredentialField::SecretAccessKey => inquire::Password::new(&label)
            .without_confirmation()
            .prompt(),
        _ => inquire::Text::new(&label).prompt(),
    };
    answer.map_err(|e| log::error!("Prompt cancelled: {e}")).ok()
}
