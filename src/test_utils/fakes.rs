//! Collaborator fakes with call counters and failure injection.

use anyhow::{Context, Result, anyhow};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::hash::Hash;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::blobstore::{BlobId, BlobRef, BlobStore, Fingerprint, LocalBlobStore};
use crate::core::TplError;
use crate::models::{Instance, JobDescription};
use crate::reader::{JobReader, ReaderFactory};
use crate::repo::{MemoryRepository, Repository};
use crate::templating::ArchiveCompiler;

/// [`LocalBlobStore`] that counts uploads and can be told to fail them.
pub struct CountingBlobStore {
    inner: LocalBlobStore,
    creates: AtomicUsize,
    fail_after: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl CountingBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: LocalBlobStore::new(dir),
            creates: AtomicUsize::new(0),
            fail_after: AtomicUsize::new(usize::MAX),
            delay: Mutex::new(None),
        }
    }

    /// Successful plus failed `create` calls so far.
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Let `n` more uploads succeed, then fail every one after.
    pub fn fail_after(&self, n: usize) {
        self.fail_after.store(self.creates() + n, Ordering::SeqCst);
    }

    /// Sleep inside every upload, widening race windows.
    pub fn set_delay(&self, delay: Duration) {
        if let Ok(mut slot) = self.delay.lock() {
            *slot = Some(delay);
        }
    }
}

impl BlobStore for CountingBlobStore {
    fn create<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<(BlobId, Fingerprint)>> {
        async move {
            let call = self.creates.fetch_add(1, Ordering::SeqCst);
            let delay = self.delay.lock().ok().and_then(|d| *d);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if call >= self.fail_after.load(Ordering::SeqCst) {
                return Err(anyhow!("injected upload failure for {}", path.display()));
            }
            self.inner.create(path).await
        }
        .boxed()
    }

    fn get<'a>(
        &'a self,
        blob_id: &'a BlobId,
        fingerprint: &'a Fingerprint,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        self.inner.get(blob_id, fingerprint)
    }
}

#[derive(Default)]
struct ReaderCounters {
    opened: AtomicUsize,
    reads: AtomicUsize,
    closes: AtomicUsize,
    fail_reads: AtomicBool,
}

/// Readers that parse a job description stored as YAML in the blob store.
///
/// Every reader handed out and every `close` call that actually releases one is
/// counted, so tests can check that each reader is closed exactly once.
#[derive(Clone)]
pub struct FakeReaderFactory {
    blobstore: Arc<dyn BlobStore>,
    counters: Arc<ReaderCounters>,
}

impl FakeReaderFactory {
    pub fn new(blobstore: Arc<dyn BlobStore>) -> Self {
        Self {
            blobstore,
            counters: Arc::new(ReaderCounters::default()),
        }
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.counters.reads.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.counters.fail_reads.store(fail, Ordering::SeqCst);
    }
}

impl ReaderFactory for FakeReaderFactory {
    fn new_reader(&self, url: &str) -> Box<dyn JobReader> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeReader {
            url: url.to_string(),
            blobstore: Arc::clone(&self.blobstore),
            counters: Arc::clone(&self.counters),
            consumed: false,
            closed: false,
        })
    }
}

struct FakeReader {
    url: String,
    blobstore: Arc<dyn BlobStore>,
    counters: Arc<ReaderCounters>,
    consumed: bool,
    closed: bool,
}

impl JobReader for FakeReader {
    fn url(&self) -> &str {
        &self.url
    }

    fn read(&mut self) -> BoxFuture<'_, Result<JobDescription>> {
        async move {
            if self.consumed {
                return Err(TplError::ReaderAlreadyConsumed {
                    url: self.url.clone(),
                }
                .into());
            }
            self.consumed = true;
            self.counters.reads.fetch_add(1, Ordering::SeqCst);

            if self.counters.fail_reads.load(Ordering::SeqCst) {
                return Err(anyhow!("injected read failure for {}", self.url));
            }

            let blob_ref = BlobRef::parse(&self.url)?;
            let path = self.blobstore.get(&blob_ref.blob_id, &blob_ref.fingerprint).await?;
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Reading fake job source {}", path.display()))?;
            Ok(serde_yaml::from_str(&content)?)
        }
        .boxed()
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[derive(Default)]
struct CompilerCounters {
    compiles: AtomicUsize,
    cleanups: Mutex<Vec<PathBuf>>,
    rendered_jobs: Mutex<Vec<String>>,
    fail_compile: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

/// Archive compiler that writes a small text file listing the jobs it was given.
#[derive(Clone)]
pub struct FakeArchiveCompiler {
    work_dir: PathBuf,
    counters: Arc<CompilerCounters>,
}

impl FakeArchiveCompiler {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            counters: Arc::new(CompilerCounters::default()),
        }
    }

    pub fn compiles(&self) -> usize {
        self.counters.compiles.load(Ordering::SeqCst)
    }

    /// Every path passed to `clean_up`, in call order.
    pub fn cleanups(&self) -> Vec<PathBuf> {
        self.counters.cleanups.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Names of the jobs passed to the latest `compile`.
    pub fn rendered_jobs(&self) -> Vec<String> {
        self.counters.rendered_jobs.lock().map(|j| j.clone()).unwrap_or_default()
    }

    pub fn fail_compile(&self, fail: bool) {
        self.counters.fail_compile.store(fail, Ordering::SeqCst);
    }

    /// Sleep inside every `compile`, keeping renders in flight longer.
    pub fn set_delay(&self, delay: Duration) {
        if let Ok(mut slot) = self.counters.delay.lock() {
            *slot = Some(delay);
        }
    }

    /// Highest number of `compile` calls observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    async fn render(
        &self,
        call: usize,
        jobs: &[JobDescription],
        instance: &Instance,
    ) -> Result<PathBuf> {
        let delay = self.counters.delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.counters.fail_compile.load(Ordering::SeqCst) {
            return Err(anyhow!("injected render failure"));
        }

        let names: Vec<String> = jobs.iter().map(|j| j.name.clone()).collect();
        if let Ok(mut rendered) = self.counters.rendered_jobs.lock() {
            *rendered = names.clone();
        }

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let path = self.work_dir.join(format!("rendered-{call}.txt"));
        tokio::fs::write(&path, format!("{} for {}", names.join(","), instance)).await?;
        Ok(path)
    }
}

impl ArchiveCompiler for FakeArchiveCompiler {
    fn compile<'a>(
        &'a self,
        jobs: &'a [JobDescription],
        instance: &'a Instance,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        async move {
            let call = self.counters.compiles.fetch_add(1, Ordering::SeqCst);
            let active = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.max_in_flight.fetch_max(active, Ordering::SeqCst);
            let result = self.render(call, jobs, instance).await;
            self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
        .boxed()
    }

    fn clean_up(&self, path: &Path) -> Result<()> {
        if let Ok(mut cleanups) = self.counters.cleanups.lock() {
            cleanups.push(path.to_path_buf());
        }
        crate::utils::remove_file_if_exists(path)
    }
}

/// Repository whose every call fails with an access error.
pub struct FailingRepository<K, V> {
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> FailingRepository<K, V> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K, V> Default for FailingRepository<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Repository<K, V> for FailingRepository<K, V>
where
    K: Send + Sync,
    V: Send + Sync,
{
    fn find<'a>(&'a self, _key: &'a K) -> BoxFuture<'a, Result<Option<V>>> {
        async { Err(anyhow!("injected repository access failure")) }.boxed()
    }

    fn save<'a>(&'a self, _key: K, _value: V) -> BoxFuture<'a, Result<()>> {
        async { Err(anyhow!("injected repository access failure")) }.boxed()
    }
}

/// In-memory repository that records every saved key.
pub struct CountingRepository<K, V>
where
    K: Eq + Hash,
{
    inner: MemoryRepository<K, V>,
    saves: Mutex<Vec<K>>,
    delay: Mutex<Option<Duration>>,
}

impl<K, V> CountingRepository<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            inner: MemoryRepository::new(),
            saves: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
        }
    }

    /// Keys passed to `save`, in call order.
    pub fn saved_keys(&self) -> Vec<K> {
        self.saves.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Sleep inside every `find`, widening find-then-save races.
    pub fn set_delay(&self, delay: Duration) {
        if let Ok(mut slot) = self.delay.lock() {
            *slot = Some(delay);
        }
    }
}

impl<K, V> Default for CountingRepository<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Repository<K, V> for CountingRepository<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn find<'a>(&'a self, key: &'a K) -> BoxFuture<'a, Result<Option<V>>> {
        async move {
            let delay = self.delay.lock().ok().and_then(|d| *d);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.inner.find(key).await
        }
        .boxed()
    }

    fn save<'a>(&'a self, key: K, value: V) -> BoxFuture<'a, Result<()>> {
        if let Ok(mut saves) = self.saves.lock() {
            saves.push(key.clone());
        }
        self.inner.save(key, value)
    }
}
