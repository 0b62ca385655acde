use crate::assets::AssetFilter;
use crate::crawler::FetchClient;
use crate::output::StatsRecorder;
use crate::recon::ReconObserver;
use crate::state::{AssetRegistry, IncrementalStore};
use crate::url::UrlResolver;
use std::sync::Arc;

/// Run-wide state shared by the page loop and every asset worker
pub struct CrawlContext {
    pub client: Arc<FetchClient>,
    pub resolver: UrlResolver,
    pub registry: AssetRegistry,
    pub store: IncrementalStore,
    pub filter: AssetFilter,
    pub observer: Arc<dyn ReconObserver>,
    pub stats: StatsRecorder,
}
