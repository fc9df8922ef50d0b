#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use device_frame_core::catalog::RawListing;
use device_frame_core::service::{ApplyFrameRequest, FrameService};
use device_frame_core::{CatalogLoadError, Config, FrameApplyError, SourceImage};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Value, json};
use tokio::sync::oneshot;

pub type Reply = Result<Vec<u8>, FrameApplyError>;

/// One apply call waiting for the test to answer it.
pub struct PendingCall {
    pub request: ApplyFrameRequest,
    reply: oneshot::Sender<Reply>,
}

impl PendingCall {
    pub fn respond(self, reply: Reply) {
        let _ = self.reply.send(reply);
    }
}

/// Fake frame service whose apply calls settle only when the test says so.
pub struct GatedService {
    listing: Mutex<Result<Value, CatalogLoadError>>,
    calls: Mutex<Vec<PendingCall>>,
    apply_count: AtomicUsize,
    list_count: AtomicUsize,
}

impl GatedService {
    pub fn new(listing: Value) -> Self {
        Self {
            listing: Mutex::new(Ok(listing)),
            calls: Mutex::new(Vec::new()),
            apply_count: AtomicUsize::new(0),
            list_count: AtomicUsize::new(0),
        }
    }

    pub fn set_listing(&self, listing: Result<Value, CatalogLoadError>) {
        *self.listing.lock().unwrap() = listing;
    }

    pub fn apply_count(&self) -> usize {
        self.apply_count.load(Ordering::SeqCst)
    }

    pub fn list_count(&self) -> usize {
        self.list_count.load(Ordering::SeqCst)
    }

    /// Yields to the runtime until `n` apply calls are waiting, then takes them
    /// in submission order.
    pub async fn take_calls(&self, n: usize) -> Vec<PendingCall> {
        for _ in 0..1000 {
            {
                let mut calls = self.calls.lock().unwrap();
                if calls.len() >= n {
                    return calls.drain(..n).collect();
                }
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {n} pending apply calls");
    }
}

impl FrameService for GatedService {
    fn list_catalog(&self) -> BoxFuture<'_, Result<RawListing, CatalogLoadError>> {
        self.list_count.fetch_add(1, Ordering::SeqCst);
        let listing = self.listing.lock().unwrap().clone();
        async move { RawListing::from_value(listing?) }.boxed()
    }

    fn apply_frame(&self, request: ApplyFrameRequest) -> BoxFuture<'_, Reply> {
        self.apply_count.fetch_add(1, Ordering::SeqCst);
        let (reply, rx) = oneshot::channel();
        self.calls.lock().unwrap().push(PendingCall { request, reply });
        async move {
            rx.await
                .unwrap_or_else(|_| Err(FrameApplyError::Transport("call dropped".into())))
        }
        .boxed()
    }
}

pub fn leaf(x: u32, y: u32, w: u32, h: u32, fw: u32, fh: u32) -> Value {
    json!({
        "frame_png": "/frames/x/frame.png",
        "template": { "screen": { "x": x, "y": y, "width": w, "height": h } },
        "frame_size": { "width": fw, "height": fh }
    })
}

pub fn listing() -> Value {
    json!({
        "iOS": {
            "16": { "Black": leaf(60, 90, 1080, 2350, 1200, 2600), "White": leaf(60, 90, 1080, 2350, 1200, 2600) },
            "iPhone 17 Pro": { "Cosmic Orange": leaf(50, 50, 1100, 2400, 1200, 2500) }
        },
        "iPad": {
            "iPad Air": { "Blue": leaf(100, 100, 1800, 2500, 2000, 2700) }
        }
    })
}

pub fn config() -> Config {
    Config::from_lookup(|_| None).unwrap()
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([0, 0, 0, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

pub fn screenshot(name: &str) -> SourceImage {
    SourceImage::from_bytes(name, png(4, 8)).unwrap()
}
