//! Ordered extraction strategies
//!
//! Heuristic cascades (try one selector, fall back to the next) are modelled
//! as a [`StrategyChain`]: strategies run in order and the first non-empty
//! result wins.

use std::fmt;
use tracing::debug;

/// One way of pulling items out of an input
pub trait ExtractStrategy<I: ?Sized, O>: Send + Sync {
    /// Name reported when this strategy wins
    fn name(&self) -> &str;

    /// Extract items, empty when the strategy does not apply
    fn extract(&self, input: &I) -> Vec<O>;
}

/// Strategy backed by a closure
pub struct FnStrategy<F> {
    name: String,
    f: F,
}

impl<F> FnStrategy<F> {
    /// Create a named closure strategy
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<I: ?Sized, O, F> ExtractStrategy<I, O> for FnStrategy<F>
where
    F: Fn(&I) -> Vec<O> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, input: &I) -> Vec<O> {
        (self.f)(input)
    }
}

/// Result of a successful chain run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction<O> {
    /// Name of the strategy that produced the items
    pub strategy: String,
    /// Extracted items
    pub items: Vec<O>,
}

/// Strategies tried in order until one yields something
pub struct StrategyChain<I: ?Sized, O> {
    strategies: Vec<Box<dyn ExtractStrategy<I, O>>>,
}

impl<I: ?Sized, O> Default for StrategyChain<I, O> {
    fn default() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }
}

impl<I: ?Sized, O> StrategyChain<I, O> {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy
    #[must_use]
    pub fn with(mut self, strategy: impl ExtractStrategy<I, O> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Append a closure strategy
    #[must_use]
    pub fn with_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&I) -> Vec<O> + Send + Sync + 'static,
        I: 'static,
        O: 'static,
    {
        self.with(FnStrategy::new(name, f))
    }

    /// Number of strategies
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Check if the chain has no strategies
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Run the strategies in order, returning the first non-empty result
    pub fn run(&self, input: &I) -> Option<Extraction<O>> {
        for strategy in &self.strategies {
            let items = strategy.extract(input);
            debug!("Strategy {} found {} items", strategy.name(), items.len());
            if !items.is_empty() {
                return Some(Extraction {
                    strategy: strategy.name().to_string(),
                    items,
                });
            }
        }
        None
    }
}

impl<I: ?Sized, O> fmt::Debug for StrategyChain<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}
