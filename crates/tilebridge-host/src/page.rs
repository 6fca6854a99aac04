//! The page: one session, one scheduler, and the input queue between
//! frames.

use std::collections::VecDeque;

use tilebridge_types::{BridgeConfig, BridgeResult, InputEvent};

use crate::dispatch::DispatchOutcome;
use crate::dom::Document;
use crate::loader::{self, LoadedGuest, ModuleFetcher};
use crate::scheduler::{AnimationScheduler, FrameSource, VsyncClock};
use crate::services::{HostServices, RandomSource};
use crate::session::BridgeSession;
use crate::surface::{Canvas2d, RenderSurface, TileImage};

/// Whether the guest loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Loading failed; frames and input are ignored.
    Inert,
    Running,
}

struct Live<C: Canvas2d + 'static, D: Document + 'static> {
    session: BridgeSession<HostServices<C, D>>,
    guest: LoadedGuest,
}

pub struct Page<C: Canvas2d + 'static, D: Document + 'static> {
    config: BridgeConfig,
    live: Option<Live<C, D>>,
    scheduler: AnimationScheduler,
    pending: VecDeque<InputEvent>,
}

impl<C: Canvas2d + 'static, D: Document + 'static> Page<C, D> {
    /// Size the surface, fetch the tile image and the guest, and load the
    /// guest. Clearing and the grid are left to the first frame. A load
    /// failure is logged and leaves the page inert.
    pub async fn open<F: ModuleFetcher>(
        config: BridgeConfig,
        fetcher: &F,
        canvas: C,
        document: D,
        random: Box<dyn RandomSource>,
    ) -> Self {
        let mut surface = RenderSurface::new(canvas, config.geometry, config.grid);
        surface.size_canvas();
        match TileImage::load(fetcher, &config.tile_image_url).await {
            Ok(tile) => surface.set_tile(tile),
            Err(err) => log::warn!(
                "tile image {} unavailable, drawing color only: {err}",
                config.tile_image_url
            ),
        }
        let services = HostServices::new(surface, document, random);

        let live = match Self::start(&config, fetcher, services).await {
            Ok(live) => Some(live),
            Err(err) => {
                log::error!(
                    "failed to load guest {}: [{}] {err}",
                    config.module_url,
                    err.code()
                );
                None
            }
        };

        Self {
            config,
            live,
            scheduler: AnimationScheduler::new(),
            pending: VecDeque::new(),
        }
    }

    async fn start<F: ModuleFetcher>(
        config: &BridgeConfig,
        fetcher: &F,
        services: HostServices<C, D>,
    ) -> BridgeResult<Live<C, D>> {
        let mut session = BridgeSession::new(config.abi.clone())?;
        let guest = loader::load(&mut session, fetcher, &config.module_url, services).await?;
        Ok(Live { session, guest })
    }

    pub fn state(&self) -> PageState {
        match self.live {
            Some(_) => PageState::Running,
            None => PageState::Inert,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn guest(&self) -> Option<&LoadedGuest> {
        self.live.as_ref().map(|live| &live.guest)
    }

    pub fn session(&self) -> Option<&BridgeSession<HostServices<C, D>>> {
        self.live.as_ref().map(|live| &live.session)
    }

    pub fn services(&self) -> Option<&HostServices<C, D>> {
        self.session().and_then(BridgeSession::services)
    }

    pub fn scheduler(&self) -> &AnimationScheduler {
        &self.scheduler
    }

    /// Queue an input event for delivery before the next frame.
    pub fn queue_input(&mut self, event: InputEvent) {
        self.pending.push_back(event);
    }

    /// Deliver one event now, outside the queue.
    pub fn dispatch(&mut self, event: &mut InputEvent) -> BridgeResult<DispatchOutcome> {
        match self.live.as_mut() {
            Some(live) => self.scheduler.dispatcher().deliver(&mut live.session, event),
            None => Ok(DispatchOutcome::default()),
        }
    }

    /// A real-time clock at the configured refresh interval.
    pub fn frame_clock(&self) -> VsyncClock {
        VsyncClock::new(self.config.frame_interval_ms)
    }

    /// Run against [`Page::frame_clock`], for at most `limit` frames when
    /// given one. Without a limit this only returns on an inert page.
    pub fn run_realtime(&mut self, limit: Option<usize>) -> usize {
        let clock = self.frame_clock();
        let mut clock = match limit {
            Some(frames) => clock.with_limit(frames),
            None => clock,
        };
        self.run(&mut clock)
    }

    /// Run frames until `frames` is exhausted, delivering queued input in
    /// arrival order ahead of each frame. Returns the number of frames
    /// run; an inert page runs none.
    pub fn run(&mut self, frames: &mut impl FrameSource) -> usize {
        let Some(live) = self.live.as_mut() else {
            log::debug!("page is inert; not running frames");
            return 0;
        };
        let mut count = 0;
        while let Some(timestamp) = frames.next_frame() {
            while let Some(mut event) = self.pending.pop_front() {
                if let Err(err) = self
                    .scheduler
                    .dispatcher()
                    .deliver(&mut live.session, &mut event)
                {
                    log::warn!("{:?} handler failed: [{}] {err}", event.kind(), err.code());
                }
            }
            if let Err(err) = self.scheduler.on_frame(&mut live.session, timestamp) {
                log::warn!("frame at {timestamp:.3}ms failed: [{}] {err}", err.code());
            }
            count += 1;
        }
        count
    }
}
