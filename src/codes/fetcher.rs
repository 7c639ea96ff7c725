//! Fetching of the active codes of a game across its sources.

use std::{collections::HashSet, time::Duration};

use log::{debug, info, warn};
use tokio::time;

use crate::codes::{
    SourceError,
    requester::Requester,
    response_structs::parse_codes,
    structs::{GameCode, GameDefinition, Source, SourceKind},
    wiki::scrape_codes,
};

/// Bounded retry of transient request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure
    pub retries: u32,
    /// Delay before the first retry, doubled on every further retry
    pub backoff: Duration,
}

/// Fetches codes with multi-source fallback.
///
/// Sources of a game are tried in order:
/// - a source answering with at least one code wins
/// - a source answering with no code hands over to the next one
/// - failing sources are recorded and the next one is tried
///
/// When every source failed the reasons are returned in a
/// [`SourceError::Exhausted`]; when at least one answered, an empty list is
/// a valid result.
pub struct CodeFetcher<R: Requester> {
    requester: R,
    retry: RetryPolicy,
}

impl<R: Requester> CodeFetcher<R> {
    pub fn new(requester: R, retry: RetryPolicy) -> Self {
        CodeFetcher { requester, retry }
    }

    /// Returns the current active codes of `game`, deduplicated by code in
    /// source order.
    pub async fn fetch(&self, game: &GameDefinition) -> Result<Vec<GameCode>, SourceError> {
        let mut failures = vec![];
        let mut answered = false;

        for source in &game.sources {
            info!("{}: trying source {}", game.key, source.name);

            match self.fetch_source(source).await {
                Ok(codes) if !codes.is_empty() => {
                    info!(
                        "{}: {} codes from {}",
                        game.key,
                        codes.len(),
                        source.name
                    );
                    return Ok(dedupe(codes));
                }
                Ok(_) => {
                    debug!("{}: {} returned no code", game.key, source.name);
                    answered = true;
                }
                Err(e) => {
                    warn!("{}: {} failed: {}", game.key, source.name, e);
                    failures.push((source.name.clone(), e));
                }
            }
        }

        if answered || failures.is_empty() {
            return Ok(vec![]);
        }

        if game.sources.len() == 1 {
            if let Some((_, error)) = failures.pop() {
                return Err(error);
            }
        }

        Err(SourceError::Exhausted(failures))
    }

    async fn fetch_source(&self, source: &Source) -> Result<Vec<GameCode>, SourceError> {
        let body = self.download(source).await?;

        match source.kind {
            SourceKind::Json => parse_codes(&body, &source.name),
            SourceKind::Wiki => Ok(scrape_codes(&body, &source.name)),
        }
    }

    async fn download(&self, source: &Source) -> Result<String, SourceError> {
        let mut backoff = self.retry.backoff;
        let mut attempt = 0;

        loop {
            match self.requester.get_text(&source.url, source.kind).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.retry.retries => {
                    attempt += 1;
                    warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        source.name, e, attempt, self.retry.retries, backoff
                    );
                    time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(SourceError::Unavailable(e.to_string())),
            }
        }
    }
}

fn dedupe(codes: Vec<GameCode>) -> Vec<GameCode> {
    let mut seen = HashSet::new();
    codes
        .into_iter()
        .filter(|code| seen.insert(code.code.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::codes::{
        requester::{MockRequester, RequestError},
        structs::CursorMode,
    };

    const RETRY: RetryPolicy = RetryPolicy {
        retries: 2,
        backoff: Duration::from_millis(0),
    };

    fn game_with_sources(sources: Vec<Source>) -> GameDefinition {
        GameDefinition {
            key: "honkai3rd".to_string(),
            name: "Honkai Impact 3rd".to_string(),
            alias: "hi3".to_string(),
            redeem_url: None,
            sources,
            cursor: CursorMode::CodeSet,
            fallback_reward: "unknown".to_string(),
            enabled: true,
        }
    }

    fn source(name: &str, kind: SourceKind) -> Source {
        Source {
            name: name.to_string(),
            url: format!("http://{}.local/codes", name),
            kind,
        }
    }

    fn two_sources() -> GameDefinition {
        game_with_sources(vec![source("api", SourceKind::Json), source("wiki", SourceKind::Wiki)])
    }

    const WIKI_PAGE: &str =
        "<h2>Active</h2><table><tr><td></td><td><b>WIKICODE</b></td></tr></table>";

    #[tokio::test]
    async fn test_first_source_with_codes_wins() {
        let mut requester = MockRequester::new();
        requester
            .expect_get_text()
            .with(eq("http://api.local/codes"), eq(SourceKind::Json))
            .times(1)
            .returning(|_, _| Ok(r#"[{"code": "a1b2"}, {"code": "A1B2"}, {"code": "c3d4"}]"#.to_string()));

        let fetcher = CodeFetcher::new(requester, RETRY);
        let codes = fetcher.fetch(&two_sources()).await.unwrap();

        let names: Vec<&str> = codes.iter().map(|code| code.code.as_str()).collect();
        assert_eq!(names, vec!["A1B2", "C3D4"]);
    }

    #[tokio::test]
    async fn test_empty_source_falls_back_to_next() {
        let mut requester = MockRequester::new();
        requester
            .expect_get_text()
            .with(eq("http://api.local/codes"), eq(SourceKind::Json))
            .times(1)
            .returning(|_, _| Ok(r#"{"active": []}"#.to_string()));
        requester
            .expect_get_text()
            .with(eq("http://wiki.local/codes"), eq(SourceKind::Wiki))
            .times(1)
            .returning(|_, _| Ok(WIKI_PAGE.to_string()));

        let fetcher = CodeFetcher::new(requester, RETRY);
        let codes = fetcher.fetch(&two_sources()).await.unwrap();

        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].code, "WIKICODE");
        assert_eq!(codes[0].source_label.as_deref(), Some("wiki"));
    }

    #[tokio::test]
    async fn test_failed_source_falls_back_to_next() {
        let mut requester = MockRequester::new();
        requester
            .expect_get_text()
            .with(eq("http://api.local/codes"), eq(SourceKind::Json))
            .times(1)
            .returning(|_, _| Ok("<html>maintenance</html>".to_string()));
        requester
            .expect_get_text()
            .with(eq("http://wiki.local/codes"), eq(SourceKind::Wiki))
            .times(1)
            .returning(|_, _| Ok(WIKI_PAGE.to_string()));

        let fetcher = CodeFetcher::new(requester, RETRY);
        let codes = fetcher.fetch(&two_sources()).await.unwrap();
        assert_eq!(codes[0].code, "WIKICODE");
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_exhausted() {
        let mut requester = MockRequester::new();
        requester
            .expect_get_text()
            .with(eq("http://api.local/codes"), eq(SourceKind::Json))
            .times(1)
            .returning(|_, _| Err(RequestError::Status(404)));
        requester
            .expect_get_text()
            .with(eq("http://wiki.local/codes"), eq(SourceKind::Wiki))
            .times(1)
            .returning(|_, _| Err(RequestError::Status(403)));

        let fetcher = CodeFetcher::new(requester, RETRY);
        let error = fetcher.fetch(&two_sources()).await.unwrap_err();

        assert_eq!(
            error,
            SourceError::Exhausted(vec![
                (
                    "api".to_string(),
                    SourceError::Unavailable("HTTP 404".to_string())
                ),
                (
                    "wiki".to_string(),
                    SourceError::Unavailable("HTTP 403".to_string())
                ),
            ])
        );
    }

    #[tokio::test]
    async fn test_empty_and_failing_sources_give_empty_list() {
        let mut requester = MockRequester::new();
        requester
            .expect_get_text()
            .with(eq("http://api.local/codes"), eq(SourceKind::Json))
            .times(1)
            .returning(|_, _| Err(RequestError::Status(404)));
        requester
            .expect_get_text()
            .with(eq("http://wiki.local/codes"), eq(SourceKind::Wiki))
            .times(1)
            .returning(|_, _| Ok("<h2>Active</h2><p>none</p>".to_string()));

        let fetcher = CodeFetcher::new(requester, RETRY);
        assert!(fetcher.fetch(&two_sources()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let mut requester = MockRequester::new();
        let mut sequence = mockall::Sequence::new();
        requester
            .expect_get_text()
            .times(2)
            .in_sequence(&mut sequence)
            .returning(|_, _| Err(RequestError::Timeout));
        requester
            .expect_get_text()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(r#"[{"code": "RETRIED1", "id": 4}]"#.to_string()));

        let game = game_with_sources(vec![source("api", SourceKind::Json)]);
        let fetcher = CodeFetcher::new(requester, RETRY);
        let codes = fetcher.fetch(&game).await.unwrap();

        assert_eq!(codes[0].code, "RETRIED1");
        assert_eq!(codes[0].sort_key, 4);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let mut requester = MockRequester::new();
        requester
            .expect_get_text()
            .times(3)
            .returning(|_, _| Err(RequestError::Status(502)));

        let game = game_with_sources(vec![source("api", SourceKind::Json)]);
        let fetcher = CodeFetcher::new(requester, RETRY);

        assert_eq!(
            fetcher.fetch(&game).await.unwrap_err(),
            SourceError::Unavailable("HTTP 502".to_string())
        );
    }

    #[tokio::test]
    async fn test_single_source_format_error() {
        let mut requester = MockRequester::new();
        requester
            .expect_get_text()
            .times(1)
            .returning(|_, _| Ok(r#"{"error": "bad game"}"#.to_string()));

        let game = game_with_sources(vec![source("api", SourceKind::Json)]);
        let fetcher = CodeFetcher::new(requester, RETRY);
        let error = fetcher.fetch(&game).await.unwrap_err();

        assert!(matches!(error, SourceError::Format(_)));
        assert!(error.is_format());
    }
}
