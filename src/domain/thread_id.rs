/// Opaque identifier the mail gateway assigns to a conversation thread. Stable
/// across follow-ups; the engine never parses or constructs one, only stores
/// and replays what the gateway returned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new(raw: impl Into<String>) -> Self { Self(raw.into()) }
}

impl AsRef<str> for ThreadId {
    fn as_ref(&self) -> &str { &self.0 }
}

impl std::fmt::Display for ThreadId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
