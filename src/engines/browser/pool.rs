// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::sync::{Mutex, OwnedSemaphorePermit, RwLock, Semaphore};

use crate::engines::traits::EngineError;

/// Holds the singleton browser plus the generation it was launched
/// under. A disconnect clears the cell only if its generation still
/// matches, so a caller racing a relaunch never clobbers a fresher
/// instance with a stale disconnect.
struct PoolState {
    browser: Option<Arc<Browser>>,
    generation: u64,
}

/// Singleton automated browser with bounded, FIFO-fair page concurrency.
/// The browser is lazily launched on first use under a one-shot guard;
/// concurrent first-callers share one launch. Page admission is a
/// counting semaphore sized to `max_concurrent_pages` — its built-in
/// FIFO wake order and non-decrementing hand-off give the exact
/// invariant described in the design notes without a hand-rolled queue.
pub struct BrowserPool {
    state: RwLock<PoolState>,
    launch_guard: Mutex<()>,
    semaphore: Arc<Semaphore>,
    max_concurrent_pages: usize,
    headless: bool,
}

/// An acquired page slot. Dropping it releases the permit — exactly one
/// release per successful acquire, on every exit path.
pub struct PageSlot {
    _permit: OwnedSemaphorePermit,
}

/// A handle to the shared browser plus the generation it was obtained
/// under, used to scope a `disconnect` call to the instance that is
/// actually failing.
pub struct BrowserHandle {
    pub browser: Arc<Browser>,
    pub generation: u64,
}

impl BrowserPool {
    pub fn new(max_concurrent_pages: usize, headless: bool) -> Self {
        let max_concurrent_pages = max_concurrent_pages.max(1);
        Self {
            state: RwLock::new(PoolState { browser: None, generation: 0 }),
            launch_guard: Mutex::new(()),
            semaphore: Arc::new(Semaphore::new(max_concurrent_pages)),
            max_concurrent_pages,
            headless,
        }
    }

    /// Acquire a page slot, waiting FIFO if the pool is saturated.
    pub async fn acquire_slot(&self) -> PageSlot {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("browser pool semaphore is never closed");
        PageSlot { _permit: permit }
    }

    pub fn active_pages(&self) -> usize {
        self.max_concurrent_pages - self.semaphore.available_permits()
    }

    pub fn max_concurrent_pages(&self) -> usize {
        self.max_concurrent_pages
    }

    /// Obtain the shared browser, launching it if this is the first call
    /// since startup or since the last disconnect.
    pub async fn get_browser(&self) -> Result<BrowserHandle, EngineError> {
        if let Some(handle) = self.current_browser().await {
            return Ok(handle);
        }

        let _guard = self.launch_guard.lock().await;
        if let Some(handle) = self.current_browser().await {
            return Ok(handle);
        }

        let browser = self.launch().await?;
        let mut state = self.state.write().await;
        state.generation += 1;
        state.browser = Some(Arc::new(browser));
        Ok(BrowserHandle {
            browser: state.browser.clone().expect("just inserted"),
            generation: state.generation,
        })
    }

    async fn current_browser(&self) -> Option<BrowserHandle> {
        let state = self.state.read().await;
        state.browser.as_ref().map(|b| BrowserHandle {
            browser: b.clone(),
            generation: state.generation,
        })
    }

    /// Clear the browser instance if `generation` still matches the
    /// live one, so the next `get_browser` call relaunches.
    pub async fn disconnect(&self, generation: u64) {
        let mut state = self.state.write().await;
        if state.generation == generation {
            tracing::warn!(generation, "browser disconnected, clearing instance");
            state.browser = None;
        }
    }

    /// Close the shared browser instance, if one was launched. Called
    /// once during graceful shutdown.
    pub async fn close(&self) {
        let mut state = self.state.write().await;
        if let Some(browser) = state.browser.take() {
            if let Ok(mut browser) = Arc::try_unwrap(browser).map_err(|_| ()) {
                if let Err(e) = browser.close().await {
                    tracing::warn!(error = %e, "failed to close browser cleanly");
                }
            }
        }
    }

    async fn launch(&self) -> Result<Browser, EngineError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(Duration::from_secs(30))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled");

        if !self.headless {
            builder = builder.with_head();
        }

        let config = builder
            .build()
            .map_err(|e| EngineError::BrowserLaunch(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| EngineError::BrowserLaunch(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        tracing::info!("launched browser instance");
        Ok(browser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Exercises the concurrency bound from the FIFO-waiter scenario
    // (11 requests, MAX_CONCURRENT_PAGES=10) against the semaphore
    // directly — no real browser is launched.
    #[tokio::test]
    async fn eleventh_waiter_is_delayed_until_a_slot_frees() {
        let pool = Arc::new(BrowserPool::new(10, true));
        let started = Arc::new(AtomicUsize::new(0));
        let (release_tx, _release_rx) = tokio::sync::broadcast::channel::<()>(1);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let pool = pool.clone();
            let started = started.clone();
            let mut rx = release_tx.subscribe();
            handles.push(tokio::spawn(async move {
                let _slot = pool.acquire_slot().await;
                started.fetch_add(1, Ordering::SeqCst);
                let _ = rx.recv().await;
            }));
        }

        // Give the first ten tasks a chance to acquire their slots.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(started.load(Ordering::SeqCst), 10);

        let eleventh_pool = pool.clone();
        let eleventh_started = started.clone();
        let eleventh = tokio::spawn(async move {
            let _slot = eleventh_pool.acquire_slot().await;
            eleventh_started.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            started.load(Ordering::SeqCst),
            10,
            "11th acquire must not complete while all 10 slots are held"
        );

        release_tx.send(()).unwrap();
        eleventh.await.unwrap();
        assert_eq!(started.load(Ordering::SeqCst), 11);

        for h in handles {
            let _ = h.await;
        }
    }

    #[tokio::test]
    async fn disconnect_with_stale_generation_is_a_no_op() {
        let pool = BrowserPool::new(1, true);
        {
            let mut state = pool.state.write().await;
            state.browser = None;
            state.generation = 5;
        }
        pool.disconnect(4).await;
        let state = pool.state.read().await;
        assert_eq!(state.generation, 5);
    }
}
