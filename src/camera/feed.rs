use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{sync::watch, task::JoinHandle};

use super::{Camera, CameraError};
use crate::web::Preview;

/// Background task owning the camera
///
/// Every captured frame is published to the subscribers and to the optional preview.
/// The task stops when the feed is dropped.
#[derive(Debug)]
pub struct CameraFeed {
    rx: watch::Receiver<Option<Bytes>>,
    handle: JoinHandle<()>,
}

impl CameraFeed {
    pub const RETRY_DELAY: Duration = Duration::from_secs(1);

    pub fn spawn<C: Camera + 'static>(
        camera: C,
        preview: Option<Arc<dyn Preview>>,
        retry_delay: Duration,
    ) -> Self {
        let (tx, rx) = watch::channel(None);
        let handle = tokio::spawn(Self::run(camera, tx, preview, retry_delay));

        Self { rx, handle }
    }

    async fn run<C: Camera>(
        mut camera: C,
        tx: watch::Sender<Option<Bytes>>,
        preview: Option<Arc<dyn Preview>>,
        retry_delay: Duration,
    ) {
        loop {
            match camera.get_frame().await {
                Ok(frame) => {
                    if let Some(preview) = &preview {
                        preview.publish(frame.clone());
                    }

                    tx.send_replace(Some(frame));
                }
                Err(error) => {
                    warn!(error = %error, "failed to capture frame");
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }

    pub fn subscribe(&self) -> FeedReceiver {
        FeedReceiver {
            rx: self.rx.clone(),
        }
    }
}

impl Drop for CameraFeed {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Camera returning the frames captured by a [CameraFeed]
#[derive(Debug, Clone)]
pub struct FeedReceiver {
    rx: watch::Receiver<Option<Bytes>>,
}

#[async_trait]
impl Camera for FeedReceiver {
    /// Wait for a frame captured after this call
    async fn get_frame(&mut self) -> Result<Bytes, CameraError> {
        self.rx.borrow_and_update();

        loop {
            self.rx.changed().await.map_err(|_| CameraError::Closed)?;

            if let Some(frame) = self.rx.borrow_and_update().clone() {
                return Ok(frame);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Counter {
        next: u8,
        fail_every: u8,
    }

    #[async_trait]
    impl Camera for Counter {
        async fn get_frame(&mut self) -> Result<Bytes, CameraError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.next = self.next.wrapping_add(1);

            if self.fail_every > 0 && self.next % self.fail_every == 0 {
                Err(CameraError::NoData)
            } else {
                Ok(Bytes::from(vec![self.next]))
            }
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Bytes>>);

    impl Preview for Recorder {
        fn publish(&self, frame: Bytes) {
            self.0.lock().unwrap().push(frame);
        }
    }

    #[tokio::test]
    async fn receivers_get_fresh_frames() {
        let preview = Arc::new(Recorder::default());
        let feed = CameraFeed::spawn(
            Counter {
                next: 0,
                fail_every: 0,
            },
            Some(preview.clone() as Arc<dyn Preview>),
            Duration::from_millis(1),
        );

        let mut rx = feed.subscribe();
        let first = rx.get_frame().await.unwrap();
        let second = rx.get_frame().await.unwrap();
        assert!(second[0] > first[0]);

        assert!(!preview.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn capture_failures_are_retried() {
        let feed = CameraFeed::spawn(
            Counter {
                next: 0,
                fail_every: 2,
            },
            None,
            Duration::from_millis(1),
        );

        let mut rx = feed.subscribe();
        for _ in 0..3 {
            assert_eq!(rx.get_frame().await.unwrap()[0] % 2, 1);
        }
    }

    #[tokio::test]
    async fn dropped_feed_closes_receivers() {
        let feed = CameraFeed::spawn(
            Counter {
                next: 0,
                fail_every: 0,
            },
            None,
            Duration::from_millis(1),
        );

        let mut rx = feed.subscribe();
        drop(feed);

        // The task is aborted asynchronously, the sender goes away with it
        let result = loop {
            match rx.get_frame().await {
                Ok(_) => continue,
                Err(error) => break error,
            }
        };

        assert!(matches!(result, CameraError::Closed));
    }
}
