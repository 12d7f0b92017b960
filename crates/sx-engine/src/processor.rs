//! Processor chains: ordered in-place sample transforms.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

/// An in-place transform over a block of interleaved f32 samples.
pub trait Processor: Send {
    /// Transform `frames` frames stored in `samples`.
    fn process(&mut self, samples: &mut [f32], frames: usize);
}

impl<F> Processor for F
where
    F: FnMut(&mut [f32], usize) + Send,
{
    fn process(&mut self, samples: &mut [f32], frames: usize) {
        self(samples, frames)
    }
}

/// Identifier returned when a processor is attached to a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProcessorId(u32);

/// Processors applied in insertion order.
#[derive(Default)]
pub struct ProcessorChain {
    nodes: Vec<(ProcessorId, Box<dyn Processor>)>,
    next_id: u32,
}

impl ProcessorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a processor at the end of the chain.
    pub fn attach(&mut self, processor: Box<dyn Processor>) -> ProcessorId {
        let id = ProcessorId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.nodes.push((id, processor));
        id
    }

    /// Remove a processor, handing it back so the caller decides where it drops.
    pub fn detach(&mut self, id: ProcessorId) -> Option<Box<dyn Processor>> {
        let index = self.nodes.iter().position(|(node_id, _)| *node_id == id)?;
        Some(self.nodes.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Run every processor over the block, in order.
    pub fn process(&mut self, samples: &mut [f32], frames: usize) {
        for (_, node) in &mut self.nodes {
            node.process(samples, frames);
        }
    }
}

impl fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorChain")
            .field("len", &self.nodes.len())
            .finish()
    }
}
