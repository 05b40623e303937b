use secrecy::{ExposeSecret, SecretString};

/// Store a request runs against, with its executor credential.
#[derive(Clone, Debug)]
pub struct StoreContext {
    pub domain: String,
    pub access_credential: SecretString,
}

impl StoreContext {
    pub fn new(domain: impl Into<String>, access_credential: impl Into<String>) -> Self {
        let credential: String = access_credential.into();
        Self { domain: domain.into(), access_credential: SecretString::from(credential) }
    }

    pub fn credential(&self) -> &str {
        self.access_credential.expose_secret()
    }
}

#[cfg(test)]
mod tests {
    use super::StoreContext;

    #[test]
    fn debug_output_redacts_credential() {
        let store = StoreContext::new("demo.myshop.test", "shpat-secret-value");
        let debug = format!("{store:?}");
        assert!(debug.contains("demo.myshop.test"));
        assert!(!debug.contains("shpat-secret-value"));
        assert_eq!(store.credential(), "shpat-secret-value");
    }
}
