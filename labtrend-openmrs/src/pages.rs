use std::ops::Range;

use futures::future::try_join_all;
use labtrend_core::{LabConfig, RawObservation};

use crate::{FetchError, LabSource, ObservationPage};

/// Fetch every laboratory observation for `patient`, newest first.
///
/// The first `prefetch_pages` pages are requested together before the total is
/// known; any remaining pages follow in a second burst once the first page
/// reports the total. Pages past `ceil(total / page_size)` are discarded even if
/// the server returned data for them.
pub async fn fetch_all_pages(
    source: &dyn LabSource,
    patient: &str,
    config: &LabConfig,
) -> Result<Vec<RawObservation>, FetchError> {
    config.validate()?;

    let mut pages = fetch_burst(source, patient, 0..config.prefetch_pages, config).await?;
    let total = pages.first().map_or(0, |page| page.total);
    let page_count = config.pages_for(total);

    if page_count > config.prefetch_pages {
        tracing::debug!(
            patient,
            total,
            extra = page_count - config.prefetch_pages,
            "Fetching remaining observation pages"
        );
        let rest = fetch_burst(source, patient, config.prefetch_pages..page_count, config).await?;
        pages.extend(rest);
    }

    pages.truncate(page_count);
    let observations: Vec<RawObservation> =
        pages.into_iter().flat_map(|page| page.entries).collect();

    tracing::debug!(
        patient,
        total,
        pages = page_count,
        received = observations.len(),
        "Observation pages fetched"
    );
    Ok(observations)
}

async fn fetch_burst(
    source: &dyn LabSource,
    patient: &str,
    pages: Range<usize>,
    config: &LabConfig,
) -> Result<Vec<ObservationPage>, FetchError> {
    try_join_all(
        pages.map(|page| source.search_page(patient, page * config.page_size, config.page_size)),
    )
    .await
}
