//! Reference job implementations.
//!
//! These demonstrate the job contract end to end: consume a paged search
//! from the document store, compute incrementally, and (for stateful jobs)
//! hand the state back as the opaque config for the next run.

pub mod mean;
pub mod moving;

pub use mean::{MeanFactory, MeanJob, MeanParams};
pub use moving::{MovingMean, MovingMeanFactory, MovingMeanJob, MovingMeanParams, MovingMeanState};

use serde_json::Value;

use crate::store::{DocumentStore, SearchQuery};

/// Scroll through every document of a collection, feeding the projected
/// field value of each hit to `f`. Returns the number of hits visited.
///
/// Hits without the field are fed as `Value::Null`; what to do with them is
/// the consumer's decision.
pub(crate) async fn scan_field<F>(
    store: &dyn DocumentStore,
    collection: &str,
    field: &str,
    page_size: usize,
    keep_alive_secs: u64,
    mut f: F,
) -> anyhow::Result<u64>
where
    F: FnMut(&Value),
{
    let mut visited = 0u64;
    let mut query = SearchQuery::match_all(page_size)
        .with_field(field)
        .with_keep_alive(keep_alive_secs);

    loop {
        let page = store.search(collection, query.clone()).await?;
        for hit in &page.hits {
            f(hit.document.get(field).unwrap_or(&Value::Null));
        }
        visited += page.hits.len() as u64;

        match page.cursor {
            Some(cursor) if !page.hits.is_empty() => {
                query.cursor = Some(cursor);
            }
            _ => break,
        }
    }

    Ok(visited)
}
