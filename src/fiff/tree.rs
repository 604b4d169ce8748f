//! Block tree of a FIF file.
//!
//! The flat tag directory is folded into nested [`Node`]s at every
//! `FIFF_BLOCK_START` / `FIFF_BLOCK_END` pair, the way
//! `mne._fiff.tree.make_dir_tree` does.
use std::io::{Read, Seek};
use anyhow::{bail, Result};

use super::constants::*;
use super::tag::{TagHeader, TagReader};

/// One block of the tree.  The root has `block == 0`.
#[derive(Debug, Default, Clone)]
pub struct Node {
    pub block:    i32,
    /// Non-structural tags directly inside this block.
    pub entries:  Vec<TagHeader>,
    pub children: Vec<Node>,
}

impl Node {
    /// Depth-first search for the first block of the given kind (self included).
    pub fn find_block(&self, kind: i32) -> Option<&Node> {
        if self.block == kind {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_block(kind))
    }

    /// Tags of the given kind in this block only.
    pub fn tags(&self, kind: i32) -> impl Iterator<Item = &TagHeader> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }
}

/// Fold `directory` into a tree, reading each block-start payload for its kind.
pub fn read_tree<R: Read + Seek>(reader: &mut TagReader<R>, directory: &[TagHeader]) -> Result<Node> {
    let mut stack = vec![Node::default()];

    for tag in directory {
        match tag.kind {
            FIFF_BLOCK_START => {
                let block = reader.int(tag)?;
                stack.push(Node { block, ..Node::default() });
            }
            FIFF_BLOCK_END => {
                if stack.len() == 1 {
                    bail!("unbalanced FIFF_BLOCK_END @ {:#x}", tag.pos);
                }
                let done = stack.pop().unwrap_or_default();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(done);
                }
            }
            _ => {
                if let Some(node) = stack.last_mut() {
                    node.entries.push(*tag);
                }
            }
        }
    }

    // Truncated files: attach still-open blocks to their parents.
    while stack.len() > 1 {
        let open = stack.pop().unwrap_or_default();
        if let Some(parent) = stack.last_mut() {
            parent.children.push(open);
        }
    }
    Ok(stack.pop().unwrap_or_default())
}
