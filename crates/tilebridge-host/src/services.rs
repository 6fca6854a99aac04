//! The concrete capability implementations handed to a session.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tilebridge_types::{BridgeResult, Color};

use crate::capability::HostCapabilities;
use crate::dom::Document;
use crate::surface::{Canvas2d, RenderSurface};

/// Lines of guest output retained by [`Console`].
pub const CONSOLE_CAPACITY: usize = 256;

/// Source of uniformly distributed values in `[0, 1)`.
pub trait RandomSource {
    fn next_f64(&mut self) -> f64;
}

/// The thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&mut self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// A reproducible generator.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Text the guest logged, most recent last.
#[derive(Debug, Clone, Default)]
pub struct Console {
    lines: VecDeque<String>,
}

impl Console {
    pub fn push(&mut self, line: &str) {
        log::info!(target: "guest", "{line}");
        if self.lines.len() == CONSOLE_CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.lines.back().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Capabilities backed by a render surface, a document, a random source
/// and a console.
pub struct HostServices<C, D> {
    pub surface: RenderSurface<C>,
    pub document: D,
    pub console: Console,
    random: Box<dyn RandomSource>,
}

impl<C: Canvas2d, D: Document> HostServices<C, D> {
    pub fn new(surface: RenderSurface<C>, document: D, random: Box<dyn RandomSource>) -> Self {
        Self {
            surface,
            document,
            console: Console::default(),
            random,
        }
    }
}

impl<C, D> HostCapabilities for HostServices<C, D>
where
    C: Canvas2d + 'static,
    D: Document + 'static,
{
    fn log(&mut self, text: &str) {
        self.console.push(text);
    }

    fn draw_block(&mut self, x: u32, y: u32, color: Color) {
        self.surface.draw_block(x, y, color);
    }

    fn random(&mut self) -> f64 {
        self.random.next_f64()
    }

    fn set_html(&mut self, element_id: &str, html: &str) -> BridgeResult<()> {
        self.document.set_inner_html(element_id, html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_is_bounded() {
        let mut console = Console::default();
        for i in 0..CONSOLE_CAPACITY + 10 {
            console.push(&format!("line {i}"));
        }
        assert_eq!(console.len(), CONSOLE_CAPACITY);
        assert_eq!(console.lines().next(), Some("line 10"));
        assert_eq!(console.last(), Some("line 265"));
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let mut a = SeededRandom::new(7);
        let mut b = SeededRandom::new(7);
        for _ in 0..100 {
            assert_eq!(a.next_f64(), b.next_f64());
        }
    }
}
