use url::Url;

/// Rotation over the configured Eth1 RPC URLs.
///
/// The first URL is the primary; the rest are fallbacks tried in order
/// when a request against the current one fails.
pub struct Endpoints {
    current: usize,
    urls: Vec<Url>,
}

impl Endpoints {
    pub fn new(urls: impl IntoIterator<Item = Url>) -> Self {
        Self {
            current: 0,
            urls: urls.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn current(&self) -> Option<&Url> {
        self.urls.get(self.current)
    }

    pub fn peek_next(&self) -> Option<&Url> {
        self.urls.get(self.next_index())
    }

    pub fn advance(&mut self) {
        self.current = self.next_index();
    }

    pub fn reset(&mut self) {
        self.current = 0;
    }

    const fn next_index(&self) -> usize {
        self.current.saturating_add(1)
    }
}
