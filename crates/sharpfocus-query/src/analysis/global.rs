//! The process-wide analysis cache and the per-request context.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ecow::EcoString;
use lsp_types::{Position as LspPosition, Range as LspRange, Url};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use crate::error::AnalysisResult;
use crate::ir::{Member, Place, ProgramLocation, Span};
use crate::semantics::{member_at, resolve_place_at, PlaceResolution, SemanticModel};
use crate::source::{DocumentSnapshot, PositionEncoding};

use super::alias::AliasMap;
use super::control_flow::ControlDependenceAnalysis;
use super::engine::{run_to_fixpoint, FlowAnalysisResults};
use super::flow::FlowContext;
use super::mutation::Mutation;
use super::slice::{
    CrossMethodComposer, NoopCrossMethodComposer, SliceComposer, SliceDirection, SliceOutcome,
};

/// The cache key: one entry per member of one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// The document URI.
    pub uri: Url,
    /// The member identifier within the document.
    pub member: EcoString,
}

/// A memoised analysis of one member.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The engine's out-state snapshot.
    pub results: Arc<FlowAnalysisResults>,
    /// Places read, by location.
    pub reads: FxHashMap<ProgramLocation, Vec<Place>>,
    /// The may-alias classes.
    pub aliases: AliasMap,
    /// Write events, by location.
    pub mutations: FxHashMap<ProgramLocation, Vec<Mutation>>,
    /// The fingerprint of the document content the entry was computed from.
    pub fingerprint: u128,
}

impl CacheEntry {
    /// The places read at a location.
    pub fn reads_at(&self, loc: ProgramLocation) -> &[Place] {
        self.reads.get(&loc).map_or(&[], Vec::as_slice)
    }

    /// The mutations recorded at a location.
    pub fn mutations_at(&self, loc: ProgramLocation) -> &[Mutation] {
        self.mutations.get(&loc).map_or(&[], Vec::as_slice)
    }
}

/// Cache hit and miss counters, exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups answered from a stored entry.
    pub hits: u64,
    /// Lookups that required a fresh analysis.
    pub misses: u64,
    /// Entries currently stored.
    pub entries: usize,
}

/// The process-wide memo of per-member analyses.
///
/// Single-writer, multiple-reader: readers share immutable `Arc` snapshots,
/// writers briefly take the write lock on store and invalidation. Entries
/// are validated against the document fingerprint on lookup and dropped
/// wholesale when a document changes.
#[derive(Default)]
pub struct AnalysisCache {
    entries: RwLock<FxHashMap<CacheKey, Arc<CacheEntry>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AnalysisCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored entry if it matches the document fingerprint.
    pub fn lookup(&self, key: &CacheKey, fingerprint: u128) -> Option<Arc<CacheEntry>> {
        let entries = self.entries.read();
        match entries.get(key) {
            Some(entry) if entry.fingerprint == fingerprint => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Stores a freshly computed entry, replacing any stale one.
    pub fn store(&self, key: CacheKey, entry: CacheEntry) -> Arc<CacheEntry> {
        let entry = Arc::new(entry);
        self.entries.write().insert(key, entry.clone());
        entry
    }

    /// Drops every entry of a document; called on any version bump.
    pub fn invalidate_document(&self, uri: &Url) {
        self.entries.write().retain(|key, _| &key.uri != uri);
    }

    /// Drops everything; called on shutdown.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.read().len(),
        }
    }
}

/// A cursor resolved against one member, ready for composition.
pub struct FocusTarget {
    /// The member under the cursor.
    pub member: Arc<Member>,
    /// The resolved place and its occurrence.
    pub resolution: PlaceResolution,
}

/// Everything one request needs: the document snapshot, the semantic model,
/// the shared cache, the negotiated encoding and the request's cancellation
/// token.
pub struct AnalysisContext {
    doc: DocumentSnapshot,
    model: Arc<dyn SemanticModel>,
    cache: Arc<AnalysisCache>,
    encoding: PositionEncoding,
    token: CancellationToken,
    cross_method: Arc<dyn CrossMethodComposer>,
}

impl AnalysisContext {
    /// Binds a context to one document snapshot.
    pub fn new(
        doc: DocumentSnapshot,
        model: Arc<dyn SemanticModel>,
        cache: Arc<AnalysisCache>,
        encoding: PositionEncoding,
        token: CancellationToken,
    ) -> Self {
        Self {
            doc,
            model,
            cache,
            encoding,
            token,
            cross_method: Arc::new(NoopCrossMethodComposer),
        }
    }

    /// Swaps the cross-method composition hook.
    pub fn with_cross_method(mut self, composer: Arc<dyn CrossMethodComposer>) -> Self {
        self.cross_method = composer;
        self
    }

    /// The document under analysis.
    pub fn doc(&self) -> &DocumentSnapshot {
        &self.doc
    }

    /// The request's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Converts a byte span of the document to a client range.
    pub fn range(&self, span: &Span) -> LspRange {
        self.doc.range_at(span, self.encoding)
    }

    /// Resolves a client position to (member, place) under the cursor.
    pub fn resolve_focus(&self, position: LspPosition) -> Option<FocusTarget> {
        let offset = self.doc.offset_at(position, self.encoding)?;
        let members = self.model.members(&self.doc);
        let member = member_at(&members, offset)?;
        let resolution = resolve_place_at(&member, offset)?;
        Some(FocusTarget { member, resolution })
    }

    /// Analyzes a member, serving repeated requests from the cache.
    ///
    /// Control dependence is recomputed per request: it is cheap relative to
    /// the fixpoint and the cache entry stays CFG-free.
    pub fn analyze_member(
        &self,
        member: &Member,
    ) -> AnalysisResult<(Arc<CacheEntry>, ControlDependenceAnalysis)> {
        let key = CacheKey {
            uri: self.doc.uri().clone(),
            member: member.id.clone(),
        };

        if let Some(entry) = self.cache.lookup(&key, self.doc.fingerprint()) {
            let mut control = ControlDependenceAnalysis::new();
            control.analyze(&member.cfg);
            return Ok((entry, control));
        }

        let ctx = FlowContext::prepare(&member.cfg, self.token.clone());
        let results = run_to_fixpoint(&ctx)?;
        let (mutations, reads, aliases, control) = ctx.into_parts();
        let entry = self.cache.store(
            key,
            CacheEntry {
                results: Arc::new(results),
                reads,
                aliases,
                mutations,
                fingerprint: self.doc.fingerprint(),
            },
        );
        Ok((entry, control))
    }

    /// Runs the full pipeline for one direction: analysis (cached or fresh)
    /// plus slice composition, with the cross-method hook applied last.
    pub fn slice(
        &self,
        target: &FocusTarget,
        direction: SliceDirection,
    ) -> AnalysisResult<SliceOutcome> {
        let (entry, control) = self.analyze_member(&target.member)?;
        let composer = SliceComposer::new(&target.member.cfg, &entry, &control, &self.token);
        let mut outcome = match direction {
            SliceDirection::Backward => {
                composer.backward(target.resolution.location, &target.resolution.place)?
            }
            SliceDirection::Forward => {
                composer.forward(target.resolution.location, &target.resolution.place)?
            }
        };
        self.cross_method.extend(&mut outcome, &target.resolution.place);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::error::AnalysisError;
    use crate::testing::linear_dependence;

    #[test]
    fn repeated_analyses_hit_the_cache() {
        let cache = Arc::new(AnalysisCache::new());
        let first_fixture = linear_dependence();
        let member = first_fixture.members()[0].clone();

        let ctx = first_fixture.into_context_with(cache.clone(), CancellationToken::new());
        let (first, _) = ctx.analyze_member(&member).unwrap();

        let second_fixture = linear_dependence();
        let ctx = second_fixture.into_context_with(cache.clone(), CancellationToken::new());
        let (second, _) = ctx.analyze_member(&member).unwrap();

        assert_eq!(first.results, second.results);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn document_changes_invalidate() {
        let cache = Arc::new(AnalysisCache::new());
        let fixture = linear_dependence();
        let member = fixture.members()[0].clone();
        let uri = fixture.doc().uri().clone();

        let ctx = fixture.into_context_with(cache.clone(), CancellationToken::new());
        ctx.analyze_member(&member).unwrap();
        assert_eq!(cache.stats().entries, 1);

        cache.invalidate_document(&uri);
        assert_eq!(cache.stats().entries, 0);

        ctx.analyze_member(&member).unwrap();
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn stale_fingerprints_miss() {
        let cache = AnalysisCache::new();
        let key = CacheKey {
            uri: Url::parse("file:///doc.cs").unwrap(),
            member: "T.M".into(),
        };
        let entry = CacheEntry {
            results: Arc::new(Default::default()),
            reads: FxHashMap::default(),
            aliases: AliasMap::default(),
            mutations: FxHashMap::default(),
            fingerprint: 1,
        };
        cache.store(key.clone(), entry);

        assert!(cache.lookup(&key, 1).is_some());
        assert!(cache.lookup(&key, 2).is_none());
    }

    #[test]
    fn cancelled_runs_are_never_cached() {
        let cache = Arc::new(AnalysisCache::new());
        let fixture = linear_dependence();
        let member = fixture.members()[0].clone();

        let token = CancellationToken::new();
        token.cancel();
        let ctx = fixture.into_context_with(cache.clone(), token);
        assert_eq!(
            ctx.analyze_member(&member).err(),
            Some(AnalysisError::Cancelled)
        );
        assert_eq!(cache.stats().entries, 0);
    }
}
