use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use thiserror::Error;
use tokio::time::Instant;

use crate::context::{self, ContextError, FileContextStore, QueryContext};
use crate::gallery::{Gallery, GalleryError, GalleryOptions, RawRecord, SearchFilter};
use crate::navigation::{self, Direction, NavigationError, RunList, RunsClient};
use crate::output::{ContextSource, GalleryView, Navigation};

#[derive(Clone, Debug)]
pub enum RecordSource {
    FilePath(String),
    Inline(Vec<RawRecord>),
}

#[derive(Clone, Debug)]
pub struct Options {
    pub records: RecordSource,
    pub search: String,
    /// URL fragment seen on the first page load; wins over `search` there.
    pub fragment: Option<String>,
    pub gallery: GalleryOptions,
    pub context: Option<QueryContext>,
    pub state_file: Option<String>,
    pub backend: Option<String>,
    pub timeout_seconds: usize,
    pub proxy: Option<String>,
    pub inline_annotations: bool,
    /// Base directory for relative annotation paths.
    pub annotation_root: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            records: RecordSource::Inline(Vec::new()),
            search: String::new(),
            fragment: None,
            gallery: GalleryOptions::default(),
            context: None,
            state_file: None,
            backend: None,
            timeout_seconds: 10,
            proxy: None,
            inline_annotations: false,
            annotation_root: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Gallery(#[from] GalleryError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error("no query context (pass one or persist one first)")]
    MissingContext,

    #[error("invalid timeout {value}, expected positive integer")]
    InvalidTimeout { value: usize },
}

#[derive(Clone, Debug)]
pub struct RunResult {
    pub started_at: Instant,
    pub elapsed: Duration,
    pub view: GalleryView,
    /// Why navigation is unavailable, when a backend was configured but failed.
    pub navigation_error: Option<String>,
    /// Run names from the backend that carried no run number.
    pub skipped_runs: Vec<String>,
    /// Annotation files that could not be read.
    pub annotation_errors: Vec<(usize, String)>,
}

#[derive(Clone, Debug)]
pub struct Runner {
    options: Options,
}

impl Runner {
    pub fn new(options: Options) -> Result<Self, RunnerError> {
        options.gallery.validate()?;
        if options.timeout_seconds == 0 {
            return Err(RunnerError::InvalidTimeout {
                value: options.timeout_seconds,
            });
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    fn open_store(&self) -> Result<Option<FileContextStore>, RunnerError> {
        match self.options.state_file.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(path) => {
                let path = crate::config::expand_tilde(path);
                Ok(Some(FileContextStore::open(&path)?))
            }
            None => Ok(None),
        }
    }

    /// The explicit context wins, then a query submitted by a previous
    /// navigation. Either one is persisted; without both the stored context is
    /// restored.
    fn resolve_context(
        &self,
        mut store: Option<&mut FileContextStore>,
    ) -> Result<(Option<QueryContext>, ContextSource), RunnerError> {
        let mut explicit = self.options.context.clone().filter(|c| !c.is_empty());
        if explicit.is_none() {
            if let Some(store) = store.as_deref_mut() {
                explicit = context::take_submitted(store)?.map(|q| QueryContext::from(&q));
            }
        }
        match (explicit, store) {
            (Some(ctx), Some(store)) => {
                context::persist(store, &ctx)?;
                Ok((Some(ctx), ContextSource::Query))
            }
            (Some(ctx), None) => Ok((Some(ctx), ContextSource::Query)),
            (None, Some(store)) => match context::restore(store) {
                Some(ctx) => Ok((Some(ctx), ContextSource::Restored)),
                None => Ok((None, ContextSource::None)),
            },
            (None, None) => Ok((None, ContextSource::None)),
        }
    }

    async fn load_records(&self) -> Result<Vec<RawRecord>, RunnerError> {
        match &self.options.records {
            RecordSource::Inline(records) => Ok(records.clone()),
            RecordSource::FilePath(path) => {
                let path = crate::config::expand_tilde(path);
                Ok(crate::gallery::record::load_records(&path).await?)
            }
        }
    }

    fn annotation_root(&self) -> Option<PathBuf> {
        if let Some(root) = self.options.annotation_root.as_deref() {
            return Some(crate::config::expand_tilde(root));
        }
        match &self.options.records {
            RecordSource::FilePath(path) => crate::config::expand_tilde(path)
                .parent()
                .map(Path::to_path_buf),
            RecordSource::Inline(_) => None,
        }
    }

    async fn fetch_navigation(
        &self,
        ctx: &QueryContext,
    ) -> Result<Option<(Navigation, Vec<String>)>, NavigationError> {
        let Some(endpoint) = self.options.backend.as_deref().filter(|b| !b.trim().is_empty()) else {
            return Ok(None);
        };
        let client = RunsClient::new(
            endpoint,
            self.options.timeout_seconds,
            self.options.proxy.as_deref(),
        )?;
        let (runs, skipped) = client.fetch_runs(&ctx.series, &ctx.sample).await?;
        let nav = navigation_for(ctx, &runs, navigation::now_millis())?;
        Ok(Some((nav, skipped)))
    }

    pub async fn run(&self) -> Result<RunResult, RunnerError> {
        let started_at = Instant::now();

        let mut store = self.open_store()?;
        let (ctx, context_source) = self.resolve_context(store.as_mut())?;

        let records = self.load_records().await?;
        let mut gallery = Gallery::new(self.options.gallery)?;
        let (filter, _) = SearchFilter::resolve(
            1,
            self.options.fragment.as_deref(),
            &self.options.search,
        );
        gallery.set_filter(filter)?;
        gallery.load(records)?;

        let mut view = GalleryView::from_gallery(&gallery);
        view.context = ctx.clone();
        view.context_source = context_source;

        let mut annotation_errors = Vec::new();
        if self.options.inline_annotations {
            let (annotations, errors) = read_annotations(&gallery, self.annotation_root()).await;
            view.annotations = annotations;
            annotation_errors = errors;
        }

        let mut navigation_error = None;
        let mut skipped_runs = Vec::new();
        if let Some(ctx) = ctx.as_ref() {
            match self.fetch_navigation(ctx).await {
                Ok(Some((nav, skipped))) => {
                    view.navigation = Some(nav);
                    skipped_runs = skipped;
                }
                Ok(None) => {}
                Err(e) => navigation_error = Some(e.to_string()),
            }
        }

        Ok(RunResult {
            started_at,
            elapsed: started_at.elapsed(),
            view,
            navigation_error,
            skipped_runs,
            annotation_errors,
        })
    }

    /// Plans a jump to the neighboring run and hands the query over through
    /// the context store.
    pub async fn navigate(
        &self,
        direction: Direction,
    ) -> Result<navigation::NavigationQuery, RunnerError> {
        let mut store = self.open_store()?;
        let (ctx, _) = self.resolve_context(store.as_mut())?;
        let ctx = ctx.ok_or(RunnerError::MissingContext)?;

        let endpoint = self.options.backend.as_deref().unwrap_or_default();
        let client = RunsClient::new(
            endpoint,
            self.options.timeout_seconds,
            self.options.proxy.as_deref(),
        )?;
        let (runs, _) = client.fetch_runs(&ctx.series, &ctx.sample).await?;
        let query = navigation::plan(&ctx, &runs, direction, navigation::now_millis())?;
        if let Some(store) = store.as_mut() {
            context::submit(store, &query)?;
        }
        Ok(query)
    }
}

pub fn navigation_for(
    ctx: &QueryContext,
    runs: &RunList,
    user_id: u64,
) -> Result<Navigation, NavigationError> {
    let current = navigation::current_run(ctx)?;
    let neighbors = runs.neighbors(current);
    Ok(Navigation {
        runs: runs.runs().to_vec(),
        neighbors,
        next: neighbors
            .next
            .map(|run| navigation::NavigationQuery::for_run(ctx, run, user_id)),
        previous: neighbors
            .previous
            .map(|run| navigation::NavigationQuery::for_run(ctx, run, user_id)),
    })
}

async fn read_annotations(
    gallery: &Gallery,
    root: Option<PathBuf>,
) -> (BTreeMap<usize, String>, Vec<(usize, String)>) {
    let reads = FuturesUnordered::new();
    for item in gallery.items().iter().filter(|i| !i.hidden) {
        let Some(txt) = item.txt_path.as_deref() else {
            continue;
        };
        let path = match root.as_ref() {
            Some(root) if Path::new(txt).is_relative() => root.join(txt),
            _ => PathBuf::from(txt),
        };
        let index = item.index;
        reads.push(async move {
            let result = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| format!("{}: {e}", path.display()));
            (index, result)
        });
    }

    let results: Vec<_> = reads.collect().await;
    let mut annotations = BTreeMap::new();
    let mut errors = Vec::new();
    for (index, result) in results {
        match result {
            Ok(text) => {
                annotations.insert(index, text);
            }
            Err(e) => errors.push((index, e)),
        }
    }
    errors.sort();
    (annotations, errors)
}
