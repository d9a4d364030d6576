use crate::http::FetchError;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// The flattened result of walking one paginated resource. A mid-walk
/// failure keeps whatever was accumulated; the error rides along so the
/// orchestrator can log it and note the partial coverage.
#[derive(Debug)]
pub struct PageWalk {
    pub records: Vec<Value>,
    pub pages: u32,
    pub error: Option<FetchError>,
}

impl PageWalk {
    pub fn partial_note(&self, resource: &str) -> Option<String> {
        self.error.as_ref().map(|err| {
            format!(
                "Coleta parcial de {resource}: interrompida após {} página(s) ({err}).",
                self.pages
            )
        })
    }
}

/// Offset/limit walker: requests `{limit, offset}` pages until the upstream
/// returns an empty or short page, advancing the offset by `limit` each time.
pub async fn collect_offset_pages<F>(limit: u64, delay: Duration, mut fetch: F) -> PageWalk
where
    F: AsyncFnMut(u64) -> Result<Vec<Value>, FetchError>,
{
    let mut records = Vec::new();
    let mut offset = 0u64;
    let mut pages = 0u32;
    loop {
        match fetch(offset).await {
            Ok(page) => {
                pages += 1;
                let len = page.len() as u64;
                records.extend(page);
                if len == 0 || len < limit {
                    break;
                }
                offset += limit;
            }
            Err(err) => {
                warn!(
                    target = "mercurio.paginate",
                    pages,
                    collected = records.len(),
                    error = %err,
                    "offset pagination stopped early"
                );
                return PageWalk {
                    records,
                    pages,
                    error: Some(err),
                };
            }
        }
        sleep(delay).await;
    }
    PageWalk {
        records,
        pages,
        error: None,
    }
}

/// One page from a cursor-style endpoint: the admissible records plus the
/// opaque token (next-token or scroll-id) for the next request, if any.
#[derive(Debug)]
pub struct CursorPage {
    pub records: Vec<Value>,
    pub next: Option<String>,
}

/// Opaque-cursor walker. Stops when the cursor is absent, or when a page
/// yields zero admissible records even though a cursor is present; noisy
/// trailing pages must not keep the walk alive.
pub async fn collect_cursor_pages<F>(delay: Duration, mut fetch: F) -> PageWalk
where
    F: AsyncFnMut(Option<String>) -> Result<CursorPage, FetchError>,
{
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0u32;
    loop {
        match fetch(cursor.take()).await {
            Ok(page) => {
                pages += 1;
                if page.records.is_empty() {
                    break;
                }
                records.extend(page.records);
                match page.next {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
            Err(err) => {
                warn!(
                    target = "mercurio.paginate",
                    pages,
                    collected = records.len(),
                    error = %err,
                    "cursor pagination stopped early"
                );
                return PageWalk {
                    records,
                    pages,
                    error: Some(err),
                };
            }
        }
        sleep(delay).await;
    }
    PageWalk {
        records,
        pages,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(count: usize, from: usize) -> Vec<Value> {
        (from..from + count).map(|n| json!({ "id": n })).collect()
    }

    #[tokio::test]
    async fn offset_walk_stops_on_short_page() {
        let mut calls = Vec::new();
        let walk = collect_offset_pages(100, Duration::ZERO, async |offset| {
            calls.push(offset);
            Ok(match offset {
                0 => items(100, 0),
                100 => items(40, 100),
                _ => panic!("requested past the end"),
            })
        })
        .await;
        assert_eq!(walk.records.len(), 140);
        assert_eq!(walk.pages, 2);
        assert_eq!(calls, vec![0, 100]);
        assert!(walk.error.is_none());
    }

    #[tokio::test]
    async fn offset_walk_stops_on_empty_first_page() {
        let walk = collect_offset_pages(100, Duration::ZERO, async |_offset| Ok(vec![])).await;
        assert!(walk.records.is_empty());
        assert_eq!(walk.pages, 1);
    }

    #[tokio::test]
    async fn offset_walk_keeps_partial_results_on_failure() {
        let walk = collect_offset_pages(50, Duration::ZERO, async |offset| {
            if offset == 0 {
                Ok(items(50, 0))
            } else {
                Err(FetchError::Status(500))
            }
        })
        .await;
        assert_eq!(walk.records.len(), 50);
        assert!(matches!(walk.error, Some(FetchError::Status(500))));
    }

    #[tokio::test]
    async fn cursor_walk_consumes_pages_in_order() {
        let walk = collect_cursor_pages(Duration::ZERO, async |cursor| {
            Ok(match cursor.as_deref() {
                None => CursorPage {
                    records: items(2, 0),
                    next: Some("p2".into()),
                },
                Some("p2") => CursorPage {
                    records: items(3, 2),
                    next: None,
                },
                Some(other) => panic!("unexpected cursor {other}"),
            })
        })
        .await;
        let ids: Vec<u64> = walk
            .records
            .iter()
            .map(|v| v["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(walk.pages, 2);
    }

    #[tokio::test]
    async fn cursor_walk_stops_on_empty_page_despite_token() {
        let walk = collect_cursor_pages(Duration::ZERO, async |cursor| {
            Ok(match cursor.as_deref() {
                None => CursorPage {
                    records: items(2, 0),
                    next: Some("noisy".into()),
                },
                Some(_) => CursorPage {
                    records: vec![],
                    next: Some("never-followed".into()),
                },
            })
        })
        .await;
        assert_eq!(walk.records.len(), 2);
        assert_eq!(walk.pages, 2);
        assert!(walk.error.is_none());
    }

    #[tokio::test]
    async fn cursor_walk_reports_partial_on_failure() {
        let walk = collect_cursor_pages(Duration::ZERO, async |cursor| match cursor {
            None => Ok(CursorPage {
                records: items(4, 0),
                next: Some("p2".into()),
            }),
            Some(_) => Err(FetchError::Transport("timed out".into())),
        })
        .await;
        assert_eq!(walk.records.len(), 4);
        let note = walk.partial_note("pedidos").expect("partial note");
        assert!(note.contains("pedidos"));
    }
}
