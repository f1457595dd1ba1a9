//! Collaborator interface for everything outside the core
//!
//! The engines never draw, type text, or show popups. They emit events; the
//! `Site` turns those into calls on a `SiteObserver` supplied by whoever owns
//! the page (DOM adapter, test recorder, headless logger).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::progress::{Progress, SectionKey};
use crate::puzzles::{CircuitPuzzle, MemoryPuzzle, RoutePuzzle};
use crate::sim::ArcadeState;

/// Common shape of engine events
pub trait EngineEvent: fmt::Display {
    /// Section this event asks the ledger to unlock
    fn unlock_request(&self) -> Option<SectionKey> {
        None
    }

    /// Render the terminal line in the error colour
    fn is_error(&self) -> bool {
        false
    }
}

/// Full current state of one engine, handed to the renderer
#[derive(Debug, Clone, Copy)]
pub enum View<'a> {
    Circuit(&'a CircuitPuzzle),
    Routing(&'a RoutePuzzle),
    Memory(&'a MemoryPuzzle),
    Arcade(&'a ArcadeState),
}

/// Page-side hooks. Every method is optional.
pub trait SiteObserver {
    /// An engine changed; redraw it
    fn render(&mut self, _view: View<'_>) {}

    /// Append a line to the fake terminal
    fn terminal(&mut self, _line: &str, _is_error: bool) {}

    /// A section lock should disappear and the roadmap update
    fn section_unlocked(&mut self, _key: SectionKey, _progress: &Progress) {}

    /// Everything unlocked; show the reward popup. Called at most once per session.
    fn reward(&mut self) {}

    /// The claimable utility key appeared in the terminal
    fn utility_key_dropped(&mut self) {}
}

/// Shared observer: the page keeps a handle, the site holds the other
impl<T: SiteObserver + ?Sized> SiteObserver for Rc<RefCell<T>> {
    fn render(&mut self, view: View<'_>) {
        self.borrow_mut().render(view);
    }

    fn terminal(&mut self, line: &str, is_error: bool) {
        self.borrow_mut().terminal(line, is_error);
    }

    fn section_unlocked(&mut self, key: SectionKey, progress: &Progress) {
        self.borrow_mut().section_unlocked(key, progress);
    }

    fn reward(&mut self) {
        self.borrow_mut().reward();
    }

    fn utility_key_dropped(&mut self) {
        self.borrow_mut().utility_key_dropped();
    }
}

/// Observer that forwards terminal lines to the `log` facade
#[derive(Debug, Default)]
pub struct LogObserver;

impl SiteObserver for LogObserver {
    fn terminal(&mut self, line: &str, is_error: bool) {
        if is_error {
            log::warn!("{}", line);
        } else {
            log::info!("{}", line);
        }
    }

    fn section_unlocked(&mut self, key: SectionKey, progress: &Progress) {
        log::info!("Roadmap: {} unlocked ({}/3)", key, progress.unlocked_count());
    }

    fn reward(&mut self) {
        log::info!("Reward unlocked: {}", crate::progress::REWARD_BADGE_FILENAME);
    }
}
