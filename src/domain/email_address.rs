use validator::ValidateEmail;

/// Syntactically validated `local@domain` address. Equality and hashing are by
/// the normalized (lowercased) form, so `Alice@Foo.com` and `alice@foo.com`
/// collide deliberately.
#[derive(Debug, Clone, Eq)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(email: String) -> Result<Self, String> {
        ValidateEmail::validate_email(&email)
            .then(|| Self(email.trim().to_lowercase()))
            .ok_or(format!("Invalid email: {email:?}"))
    }
}

impl PartialEq for EmailAddress {
    fn eq(&self, other: &Self) -> bool { self.0 == other.0 }
}

impl std::hash::Hash for EmailAddress {
    fn hash<H: std::hash::Hasher>(
        &self,
        state: &mut H,
    ) {
        self.0.hash(state)
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str { &self.0 }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
