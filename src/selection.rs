//! The component-exclusion decision.
//!
//! Choosing which components are artifacts is a human judgement made while
//! looking at component time courses and overlays.  The workflow asks a
//! [`ComponentSelector`] for the final list; a fixed configuration value
//! ([`FixedSelection`]) and any function or closure over a
//! [`SelectionContext`] both qualify.
//!
//! ```
//! use artica::selection::{ComponentSelector, FixedSelection, SelectionContext};
//!
//! fn by_hand(ctx: &SelectionContext<'_>) -> anyhow::Result<Vec<usize>> {
//!     let sources = ctx.ica.get_sources(ctx.filtered)?;
//!     println!("{} components over {} samples", sources.nrows(), sources.ncols());
//!     Ok(vec![0])
//! }
//!
//! let selectors: [&dyn ComponentSelector; 2] = [&FixedSelection(vec![0, 1]), &by_hand];
//! # let _ = selectors;
//! ```
use anyhow::Result;

use crate::ica::Ica;
use crate::recording::Raw;

/// Everything a selector may look at.
pub struct SelectionContext<'a> {
    pub ica:      &'a Ica,
    /// The high-passed recording the model was fitted on.
    pub filtered: &'a Raw,
    /// The unfiltered recording that will be cleaned.
    pub original: &'a Raw,
    /// Components the workflow suggests looking at first.
    pub inspect:  &'a [usize],
}

pub trait ComponentSelector {
    /// Indices of the components to remove.
    fn select(&self, ctx: &SelectionContext<'_>) -> Result<Vec<usize>>;
}

/// A list decided ahead of time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FixedSelection(pub Vec<usize>);

impl ComponentSelector for FixedSelection {
    fn select(&self, _ctx: &SelectionContext<'_>) -> Result<Vec<usize>> {
        Ok(self.0.clone())
    }
}

impl<F> ComponentSelector for F
where
    F: Fn(&SelectionContext<'_>) -> Result<Vec<usize>>,
{
    fn select(&self, ctx: &SelectionContext<'_>) -> Result<Vec<usize>> {
        self(ctx)
    }
}
