use anyhow::{Context, Result};

use crate::config::RunOptions;
use crate::logger::SyncLogger;
use crate::readwise::ReadwiseClient;
use crate::store::SyncStore;
use crate::sync::{Normalizer, SyncStats};
use crate::unpack_error;
use crate::zotero::ZoteroClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub stats: SyncStats,
    pub uploaded: usize,
    pub library_version: u64,
}

/// One synchronisation pass: fetch, convert, upload, persist.
///
/// Failed items are written before the upload so they survive an aborted
/// run. A dry run only reports them. The watermark only moves after a
/// successful upload.
pub async fn run(
    options: &RunOptions,
    zotero: &ZoteroClient,
    readwise: &ReadwiseClient,
    store: &dyn SyncStore,
    logger: &dyn SyncLogger,
) -> Result<RunSummary> {
    let mut query = options.query.clone();
    if options.use_since {
        query.since = store
            .read_version()
            .context("failed to read library version")?;
        logger.info(&format!(
            "including Zotero items since library version {}",
            query.since
        ));
    }

    let batch = zotero
        .fetch_annotations(&query)
        .await
        .context("failed to fetch Zotero annotations")?;

    let report = Normalizer::new(logger).normalize(batch.annotations);
    logger.info(&report.summary());

    if !report.failed.is_empty() && !options.dry_run {
        match store.append_failed(&report.failed) {
            Ok(()) => logger.warn(&format!(
                "{} highlights failed to format, details saved to {}",
                report.failed.len(),
                store.failed_path().display()
            )),
            Err(e) => logger.error(&format!(
                "failed to save failed items: {}",
                unpack_error(&e)
            )),
        }
    }

    if options.dry_run {
        logger.info(&format!(
            "dry run, {} highlights not uploaded and {} failed items not saved",
            report.highlights.len(),
            report.failed.len()
        ));
        return Ok(RunSummary {
            stats: report.stats,
            uploaded: 0,
            library_version: batch.library_version,
        });
    }

    if let Err(e) = readwise.create_highlights(&report.highlights).await {
        logger.error(&unpack_error(&e));
        return Err(e).context("upload to Readwise failed");
    }
    logger.info(&format!(
        "{} highlights were successfully uploaded to Readwise",
        report.highlights.len()
    ));

    if options.use_since {
        store
            .write_version(batch.library_version)
            .context("failed to write library version")?;
    }

    Ok(RunSummary {
        stats: report.stats,
        uploaded: report.highlights.len(),
        library_version: batch.library_version,
    })
}
