//! Control-flow graphs over lowered operations.

use std::fmt;

use ecow::EcoString;

use super::{Operation, Span};

/// A dense block ordinal within one [`Cfg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);

impl BlockId {
    /// The block's index into [`Cfg::blocks`].
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A point in a [`Cfg`]: a block plus an operation index.
///
/// `index` ranges over `[0, #ops]`; `index == #ops` designates the branch
/// value slot at the end of the block. Locations are totally ordered in
/// program order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgramLocation {
    /// The containing block.
    pub block: BlockId,
    /// The operation index within the block.
    pub index: u32,
}

impl ProgramLocation {
    /// Creates a location.
    pub fn new(block: BlockId, index: u32) -> Self {
        Self { block, index }
    }
}

impl fmt::Display for ProgramLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.block, self.index)
    }
}

/// One node of a [`Cfg`].
#[derive(Debug, Clone)]
pub struct BasicBlock {
    id: BlockId,
    operations: Vec<Operation>,
    branch_value: Option<Operation>,
    syntax_span: Option<Span>,
    fallthrough: Option<BlockId>,
    conditional: Option<BlockId>,
    predecessors: Vec<BlockId>,
}

impl BasicBlock {
    /// The block's ordinal.
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// The block's operations, in program order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// The operation deciding the conditional successor, if the block
    /// branches.
    pub fn branch_value(&self) -> Option<&Operation> {
        self.branch_value.as_ref()
    }

    /// The span of the syntactic construct (`if`/loop/`switch` head) whose
    /// branch this block carries.
    pub fn syntax_span(&self) -> Option<&Span> {
        self.syntax_span.as_ref()
    }

    /// The unconditional successor.
    pub fn fallthrough(&self) -> Option<BlockId> {
        self.fallthrough
    }

    /// The successor taken when the branch value decides so.
    pub fn conditional(&self) -> Option<BlockId> {
        self.conditional
    }

    /// The block's predecessors.
    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    /// The location of the branch value slot at the end of this block.
    pub fn branch_location(&self) -> ProgramLocation {
        ProgramLocation::new(self.id, self.operations.len() as u32)
    }

    /// All locations of this block, the branch slot included.
    pub fn locations(&self) -> impl Iterator<Item = ProgramLocation> + '_ {
        (0..=self.operations.len() as u32).map(move |index| ProgramLocation::new(self.id, index))
    }

    fn successors(&self) -> impl Iterator<Item = BlockId> {
        self.fallthrough.into_iter().chain(self.conditional)
    }
}

/// A per-member control-flow graph with dense block ordinals.
#[derive(Debug, Clone)]
pub struct Cfg {
    blocks: Vec<BasicBlock>,
    entry: BlockId,
    exit: BlockId,
}

impl Cfg {
    /// The entry block.
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    /// The exit block.
    pub fn exit(&self) -> BlockId {
        self.exit
    }

    /// All blocks, ordered by ordinal.
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// The block with the given ordinal.
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    /// The successors of a block.
    pub fn successors(&self, id: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.block(id).successors()
    }

    /// All locations of the graph, in program order.
    pub fn locations(&self) -> impl Iterator<Item = ProgramLocation> + '_ {
        self.blocks.iter().flat_map(BasicBlock::locations)
    }

    /// The operation at a location. The branch slot yields the branch value,
    /// which may be absent.
    pub fn operation_at(&self, loc: ProgramLocation) -> Option<&Operation> {
        let block = self.block(loc.block);
        match block.operations.get(loc.index as usize) {
            Some(op) => Some(op),
            None => block.branch_value(),
        }
    }

    /// Whether the location exists in this graph.
    pub fn contains(&self, loc: ProgramLocation) -> bool {
        loc.block.index() < self.blocks.len()
            && loc.index as usize <= self.block(loc.block).operations.len()
    }

    /// The first location of the graph.
    pub fn entry_location(&self) -> ProgramLocation {
        ProgramLocation::new(self.entry, 0)
    }

    /// Control-flow predecessors of a location, crossing block boundaries at
    /// block heads.
    pub fn flow_predecessors(&self, loc: ProgramLocation) -> Vec<ProgramLocation> {
        if loc.index > 0 {
            return vec![ProgramLocation::new(loc.block, loc.index - 1)];
        }
        self.block(loc.block)
            .predecessors
            .iter()
            .map(|&pred| self.block(pred).branch_location())
            .collect()
    }

    /// Control-flow successors of a location, crossing block boundaries at
    /// branch slots.
    pub fn flow_successors(&self, loc: ProgramLocation) -> Vec<ProgramLocation> {
        let block = self.block(loc.block);
        if loc.index < block.operations.len() as u32 {
            return vec![ProgramLocation::new(loc.block, loc.index + 1)];
        }
        block
            .successors()
            .map(|succ| ProgramLocation::new(succ, 0))
            .collect()
    }
}

/// Builds a [`Cfg`], wiring predecessor lists from the successor edges.
pub struct CfgBuilder {
    blocks: Vec<BasicBlock>,
}

impl CfgBuilder {
    /// Starts an empty graph.
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Appends a block and returns its ordinal.
    pub fn add_block(&mut self, operations: Vec<Operation>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock {
            id,
            operations,
            branch_value: None,
            syntax_span: None,
            fallthrough: None,
            conditional: None,
            predecessors: Vec::new(),
        });
        id
    }

    /// Sets the branch value of a block, optionally with the span of the
    /// syntactic construct it heads.
    pub fn set_branch(&mut self, id: BlockId, value: Operation, syntax_span: Option<Span>) {
        let block = &mut self.blocks[id.index()];
        block.branch_value = Some(value);
        block.syntax_span = syntax_span;
    }

    /// Sets the unconditional successor edge.
    pub fn set_fallthrough(&mut self, from: BlockId, to: BlockId) {
        self.blocks[from.index()].fallthrough = Some(to);
    }

    /// Sets the conditional successor edge.
    pub fn set_conditional(&mut self, from: BlockId, to: BlockId) {
        self.blocks[from.index()].conditional = Some(to);
    }

    /// Finishes the graph. Predecessors are derived from the successor
    /// edges; consistency is asserted in debug builds.
    pub fn finish(mut self, entry: BlockId, exit: BlockId) -> Cfg {
        let edges: Vec<(BlockId, BlockId)> = self
            .blocks
            .iter()
            .flat_map(|block| block.successors().map(move |succ| (block.id, succ)))
            .collect();
        for (from, to) in edges {
            self.blocks[to.index()].predecessors.push(from);
        }

        let cfg = Cfg {
            blocks: self.blocks,
            entry,
            exit,
        };
        debug_assert!(cfg.check_consistency(), "inconsistent control-flow graph");
        cfg
    }
}

impl Default for CfgBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Cfg {
    fn check_consistency(&self) -> bool {
        let in_range = |id: BlockId| id.index() < self.blocks.len();
        if !in_range(self.entry) || !in_range(self.exit) {
            return false;
        }
        self.blocks.iter().enumerate().all(|(ordinal, block)| {
            block.id.index() == ordinal
                && block.successors().all(in_range)
                && block.predecessors.iter().copied().all(in_range)
        })
    }
}

/// A member body handed over by the semantic layer: the unit of analysis.
#[derive(Debug, Clone)]
pub struct Member {
    /// A member identifier stable across edits of other members.
    pub id: EcoString,
    /// The member's display name.
    pub name: EcoString,
    /// The span of the member's body in its document.
    pub span: Span,
    /// The lowered body.
    pub cfg: Cfg,
}
