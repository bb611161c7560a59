use crate::analyzer::{PageAnalysis, PageAnalyzer};
use crate::error::{ConfigError, FetchError};
use crate::fetcher::Fetcher;
use crate::frontier::{Frontier, FrontierEntry};
use crate::registry::{EndpointRecord, EndpointRegistry};
use crate::result::{CrawlOutcome, CrawlResult, StopReason};
use crate::scope::{self, ScopeFilter};
use crate::script::ScriptExtractor;
use crate::target::TargetScope;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Called with the running page count and the URL about to be fetched.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;
/// Called once per visited URL after its outcome is known.
pub type ResultCallback = Arc<dyn Fn(&CrawlResult) + Send + Sync>;

/// Fetched and analyzed page, sent back from a worker task.
struct Visit {
    final_url: Url,
    status: u16,
    content_type: Option<String>,
    response_time: Duration,
    analysis: PageAnalysis,
}

type VisitOutput = (FrontierEntry, Result<Visit, FetchError>);

/// State owned by the scheduling loop. Worker tasks never touch it.
struct CrawlState {
    frontier: Frontier,
    filter: ScopeFilter,
    registry: EndpointRegistry,
    pages: Vec<CrawlResult>,
    dispatched: usize,
}

impl CrawlState {
    fn new(root: Url, filter: ScopeFilter) -> Self {
        Self {
            frontier: Frontier::with_root(root),
            filter,
            registry: EndpointRegistry::new(),
            pages: Vec::new(),
            dispatched: 0,
        }
    }

    fn page_cap_reached(&self, max_pages: Option<usize>) -> bool {
        max_pages.is_some_and(|max| self.dispatched >= max)
    }
}

/// Breadth-first crawler over a single [`TargetScope`].
///
/// Fetches run concurrently on up to `workers` tasks. The caller's task owns
/// the frontier and the registry and folds each finished page into them, so
/// the resulting registry does not depend on completion order.
pub struct Crawler {
    scope: TargetScope,
    fetcher: Fetcher,
    analyzer: PageAnalyzer,
    progress_callback: Option<ProgressCallback>,
    result_callback: Option<ResultCallback>,
    cancel: Option<watch::Receiver<bool>>,
}

impl Crawler {
    pub fn new(scope: TargetScope) -> Result<Self, ConfigError> {
        scope.validate()?;
        let fetcher = Fetcher::new(scope.timeout, &scope.user_agent)?;

        Ok(Self {
            scope,
            fetcher,
            analyzer: PageAnalyzer::default(),
            progress_callback: None,
            result_callback: None,
            cancel: None,
        })
    }

    /// Replace the inline-script heuristics.
    pub fn with_extractor(mut self, extractor: Arc<dyn ScriptExtractor>) -> Self {
        self.analyzer = PageAnalyzer::new(extractor);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_result_callback(mut self, callback: ResultCallback) -> Self {
        self.result_callback = Some(callback);
        self
    }

    /// Stop early once `true` is sent on the channel.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn scope(&self) -> &TargetScope {
        &self.scope
    }

    /// Crawl until the frontier is exhausted or a limit is hit.
    ///
    /// Never fails: unreachable pages are dead ends, and a deadline or
    /// cancellation returns whatever was merged so far.
    pub async fn crawl(&self) -> CrawlOutcome {
        let root = self.scope.root().clone();
        info!(
            "Starting crawl of {} with {} workers",
            root, self.scope.workers
        );

        let started = Instant::now();
        // A budget too large to represent is no deadline at all
        let deadline = self
            .scope
            .max_duration
            .and_then(|budget| started.checked_add(budget));
        let mut cancel = self.cancel.clone();

        let filter = ScopeFilter::new(&root, self.scope.same_origin_only);
        let mut state = CrawlState::new(root, filter);
        let mut in_flight: JoinSet<VisitOutput> = JoinSet::new();
        let mut interrupted = None;

        loop {
            if is_cancelled(&cancel) {
                interrupted = Some(StopReason::Cancelled);
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                interrupted = Some(StopReason::Deadline);
                break;
            }

            while in_flight.len() < self.scope.workers
                && !state.page_cap_reached(self.scope.max_pages)
            {
                let Some(entry) = state.frontier.pop() else {
                    break;
                };
                state.dispatched += 1;
                if let Some(ref callback) = self.progress_callback {
                    callback(state.dispatched, entry.url.to_string());
                }
                in_flight.spawn(Self::visit(
                    self.fetcher.clone(),
                    self.analyzer.clone(),
                    state.filter.clone(),
                    entry,
                ));
            }

            // Nothing running and nothing dispatchable
            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                joined = in_flight.join_next() => match joined {
                    Some(Ok((entry, outcome))) => self.record(&mut state, entry, outcome),
                    Some(Err(e)) => warn!("Worker task failed: {}", e),
                    None => {}
                },
                _ = wait_for_deadline(deadline) => {
                    interrupted = Some(StopReason::Deadline);
                    break;
                }
                _ = wait_for_cancel(&mut cancel) => {
                    interrupted = Some(StopReason::Cancelled);
                    break;
                }
            }
        }

        if !in_flight.is_empty() {
            debug!("Abandoning {} in-flight fetches", in_flight.len());
            in_flight.abort_all();
        }

        let stop_reason = interrupted.unwrap_or(
            if state.page_cap_reached(self.scope.max_pages) && !state.frontier.is_empty() {
                StopReason::PageCap
            } else {
                StopReason::Exhausted
            },
        );

        info!(
            "Crawl complete ({}). Visited {} pages, found {} endpoints in {:.2?}",
            stop_reason,
            state.pages.len(),
            state.registry.len(),
            started.elapsed()
        );

        CrawlOutcome {
            registry: state.registry,
            pages: state.pages,
            stop_reason,
        }
    }

    /// Worker task for one frontier entry: fetch, then analyze.
    async fn visit(
        fetcher: Fetcher,
        analyzer: PageAnalyzer,
        filter: ScopeFilter,
        entry: FrontierEntry,
    ) -> VisitOutput {
        let outcome = match fetcher.fetch(&entry.url).await {
            Ok(page) => {
                let final_url = scope::canonicalize(page.final_url);
                // The root may move to another origin on its own host
                let filter = match entry.depth {
                    0 => filter.rebased_on(&final_url).unwrap_or(filter),
                    _ => filter,
                };
                if final_url != entry.url && filter.check(&final_url).is_err() {
                    Err(FetchError::OutOfScope(final_url.to_string()))
                } else {
                    let analysis = analyzer.analyze(&page.body, &final_url);
                    Ok(Visit {
                        final_url,
                        status: page.status,
                        content_type: page.content_type,
                        response_time: page.response_time,
                        analysis,
                    })
                }
            }
            Err(e) => Err(e),
        };
        (entry, outcome)
    }

    fn record(
        &self,
        state: &mut CrawlState,
        entry: FrontierEntry,
        outcome: Result<Visit, FetchError>,
    ) {
        let result = match outcome {
            Ok(visit) => self.absorb(state, &entry, visit),
            Err(e) => {
                match e {
                    FetchError::NotHtml(_) => debug!("Skipping {}: {}", entry.url, e),
                    _ => warn!("Crawl error for {}: {}", entry.url, e),
                }
                let mut result =
                    CrawlResult::with_error(entry.url.to_string(), entry.depth, e.to_string());
                if let FetchError::Status(code) = e {
                    result.status_code = code;
                }
                result
            }
        };

        if let Some(ref callback) = self.result_callback {
            callback(&result);
        }
        state.pages.push(result);
    }

    /// Fold one analyzed page into the registry and frontier.
    fn absorb(&self, state: &mut CrawlState, entry: &FrontierEntry, visit: Visit) -> CrawlResult {
        let Visit {
            final_url,
            status,
            content_type,
            response_time,
            analysis,
        } = visit;

        if final_url != entry.url {
            state.frontier.mark_visited(&final_url);
        }
        if entry.depth == 0
            && let Some(rebased) = state.filter.rebased_on(&final_url)
        {
            info!("Root redirected to {}, scope follows it", final_url);
            state.filter = rebased;
        }

        let page_path = scope::canonical_path(&final_url);
        let child_depth = entry.depth + 1;
        let mut page_record = EndpointRecord::page(&page_path);

        let mut result = CrawlResult::new(final_url.to_string(), entry.depth);
        result.status_code = status;
        result.content_type = content_type;
        result.response_time = response_time;
        result.forms_found = analysis.forms.len();
        result.inline_scripts = analysis.inline_scripts;
        result.api_calls_found = analysis.api_calls.len();
        result.standalone_fields = analysis.standalone_fields.len();

        // A form posting to its own page lands in the page record
        for form in analysis.forms {
            if let Err(reason) = state.filter.check(&form.action) {
                debug!("Ignoring form action {} ({:?})", form.action, reason);
                continue;
            }
            let action_path = scope::canonical_path(&form.action);
            state
                .registry
                .merge(EndpointRecord::new(&action_path, &form.method).with_fields(form.fields));
        }

        for observation in analysis.api_calls {
            let api_url = Url::parse(&observation.url)
                .ok()
                .filter(|url| state.filter.check(url).is_ok());
            if let Some(api_url) = api_url {
                let api_path = scope::canonical_path(&api_url);
                if api_path != page_path {
                    let method = if observation.is_unknown() {
                        "GET"
                    } else {
                        observation.method.as_str()
                    };
                    state.registry.merge(EndpointRecord::new(&api_path, method));
                    self.enqueue(state, api_url, child_depth);
                }
            }
            page_record.add_api_call(observation);
        }

        for link in analysis.links {
            match state.filter.check(&link) {
                Ok(()) => {
                    result.links_found.push(link.to_string());
                    self.enqueue(state, link, child_depth);
                }
                Err(reason) => debug!("Skipping {} ({:?})", link, reason),
            }
        }

        state.registry.merge(page_record);
        result
    }

    fn enqueue(&self, state: &mut CrawlState, url: Url, depth: usize) {
        if self.scope.max_depth.is_some_and(|max| depth > max) {
            debug!("Not queuing {} beyond depth {}", url, depth - 1);
            return;
        }
        if state.frontier.push(url.clone(), depth) {
            debug!("Queued {} at depth {}", url, depth);
        }
    }
}

fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().is_some_and(|rx| *rx.borrow())
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn wait_for_cancel(cancel: &mut Option<watch::Receiver<bool>>) {
    match cancel {
        Some(rx) => {
            // A dropped sender means cancellation can no longer arrive
            if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending().await,
    }
}
